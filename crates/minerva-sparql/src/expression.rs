//! Expression evaluation
//!
//! Evaluates filter / bind / order expressions against a single solution
//! mapping. Evaluation errors are per-solution values, never engine errors:
//! a filter drops the solution, a BIND leaves its variable unbound.

use crate::algebra::{Expr, Expression};
use crate::evaluator::Executor;
use crate::solution::Solution;
use chrono::{Datelike, Timelike};
use minerva_core::{xsd, Literal, Numeric, Term};
use regex::RegexBuilder;
use std::cmp::Ordering;

/// A per-solution evaluation error (type error, unbound variable, unknown
/// function). Deliberately not convertible into `SparqlError`: it must not
/// cross the stream boundary.
#[derive(Debug, Clone)]
pub struct EvalError(pub String);

impl EvalError {
    fn new<S: Into<String>>(message: S) -> Self {
        EvalError(message.into())
    }
}

pub(crate) type EvalResult = Result<Term, EvalError>;

/// Evaluate an expression to a term.
pub(crate) fn evaluate(exec: &Executor<'_>, expr: &Expr, solution: &Solution) -> EvalResult {
    match expr {
        Expression::Variable(var) => solution
            .get(var)
            .cloned()
            .ok_or_else(|| EvalError::new(format!("unbound variable ?{}", var.as_str()))),
        Expression::Literal(lit) => Ok(Term::Literal(lit.clone())),
        Expression::Iri(iri) => Ok(Term::Iri(iri.clone())),

        Expression::Or(a, b) => {
            // Three-valued: true || error = true.
            let left = effective_boolean(exec, a, solution);
            let right = effective_boolean(exec, b, solution);
            match (left, right) {
                (Ok(true), _) | (_, Ok(true)) => Ok(boolean(true)),
                (Ok(false), Ok(false)) => Ok(boolean(false)),
                (Err(e), _) | (_, Err(e)) => Err(e),
            }
        }
        Expression::And(a, b) => {
            // Three-valued: false && error = false.
            let left = effective_boolean(exec, a, solution);
            let right = effective_boolean(exec, b, solution);
            match (left, right) {
                (Ok(false), _) | (_, Ok(false)) => Ok(boolean(false)),
                (Ok(true), Ok(true)) => Ok(boolean(true)),
                (Err(e), _) | (_, Err(e)) => Err(e),
            }
        }
        Expression::Not(inner) => {
            let value = effective_boolean(exec, inner, solution)?;
            Ok(boolean(!value))
        }

        Expression::Equal(a, b) => {
            let (a, b) = eval_pair(exec, a, b, solution)?;
            Ok(boolean(equal_terms(&a, &b)?))
        }
        Expression::NotEqual(a, b) => {
            let (a, b) = eval_pair(exec, a, b, solution)?;
            Ok(boolean(!equal_terms(&a, &b)?))
        }
        Expression::Less(a, b) => {
            let (a, b) = eval_pair(exec, a, b, solution)?;
            Ok(boolean(order_terms(&a, &b)? == Ordering::Less))
        }
        Expression::LessOrEqual(a, b) => {
            let (a, b) = eval_pair(exec, a, b, solution)?;
            Ok(boolean(order_terms(&a, &b)? != Ordering::Greater))
        }
        Expression::Greater(a, b) => {
            let (a, b) = eval_pair(exec, a, b, solution)?;
            Ok(boolean(order_terms(&a, &b)? == Ordering::Greater))
        }
        Expression::GreaterOrEqual(a, b) => {
            let (a, b) = eval_pair(exec, a, b, solution)?;
            Ok(boolean(order_terms(&a, &b)? != Ordering::Less))
        }

        Expression::Add(a, b) => arithmetic(exec, a, b, solution, ArithOp::Add),
        Expression::Subtract(a, b) => arithmetic(exec, a, b, solution, ArithOp::Subtract),
        Expression::Multiply(a, b) => arithmetic(exec, a, b, solution, ArithOp::Multiply),
        Expression::Divide(a, b) => arithmetic(exec, a, b, solution, ArithOp::Divide),
        Expression::UnaryMinus(inner) => {
            let value = evaluate(exec, inner, solution)?;
            match numeric_of(&value)? {
                Numeric::Integer(i) => i
                    .checked_neg()
                    .map(|n| Term::Literal(Literal::integer(n)))
                    .ok_or_else(|| EvalError::new("integer overflow")),
                Numeric::Decimal(d) => Ok(Term::Literal(Literal::decimal(-d))),
                Numeric::Double(d) => Ok(Term::Literal(Literal::double(-d))),
            }
        }

        Expression::FunctionCall(name, args) => call_function(exec, name, args, solution),

        Expression::In(test, list) => in_list(exec, test, list, solution, false),
        Expression::NotIn(test, list) => in_list(exec, test, list, solution, true),

        Expression::Exists(pattern) => {
            let found = exec
                .any_solution(pattern, solution)
                .map_err(|e| EvalError::new(e.to_string()))?;
            Ok(boolean(found))
        }
        Expression::NotExists(pattern) => {
            let found = exec
                .any_solution(pattern, solution)
                .map_err(|e| EvalError::new(e.to_string()))?;
            Ok(boolean(!found))
        }

        Expression::Aggregate { .. } => Err(EvalError::new(
            "aggregate evaluated outside a GROUP context",
        )),
    }
}

/// Evaluate an expression to its effective boolean value.
pub(crate) fn effective_boolean(
    exec: &Executor<'_>,
    expr: &Expr,
    solution: &Solution,
) -> Result<bool, EvalError> {
    let term = evaluate(exec, expr, solution)?;
    ebv(&term)
}

/// SPARQL effective boolean value of a term.
pub(crate) fn ebv(term: &Term) -> Result<bool, EvalError> {
    let literal = term
        .as_literal()
        .ok_or_else(|| EvalError::new("EBV of a non-literal"))?;
    if literal.datatype_iri().as_str() == xsd::BOOLEAN {
        // Invalid boolean lexical forms have EBV false.
        return Ok(literal.boolean_value().unwrap_or(false));
    }
    if let Some(number) = literal.numeric_value() {
        let value = number.as_f64();
        return Ok(value != 0.0 && !value.is_nan());
    }
    if literal.datatype.is_none() && literal.language.is_none() {
        return Ok(!literal.value.is_empty());
    }
    Err(EvalError::new(format!("no EBV for {}", literal)))
}

fn eval_pair(
    exec: &Executor<'_>,
    a: &Expr,
    b: &Expr,
    solution: &Solution,
) -> Result<(Term, Term), EvalError> {
    Ok((evaluate(exec, a, solution)?, evaluate(exec, b, solution)?))
}

fn boolean(value: bool) -> Term {
    Term::Literal(Literal::boolean(value))
}

/// RDF term equality as `=` sees it: identical terms are equal, numeric and
/// dateTime literals compare by value, and distinct literals of an unknown
/// datatype are an error rather than unequal.
pub(crate) fn equal_terms(a: &Term, b: &Term) -> Result<bool, EvalError> {
    if a == b {
        return Ok(true);
    }
    match (a, b) {
        (Term::Literal(la), Term::Literal(lb)) => {
            if let (Some(x), Some(y)) = (la.numeric_value(), lb.numeric_value()) {
                return Ok(x.compare(y) == Some(Ordering::Equal));
            }
            if let (Some(x), Some(y)) = (la.datetime_value(), lb.datetime_value()) {
                return Ok(x == y);
            }
            // String-ish literals (plain or language-tagged): unequal value
            // or tag means unequal, not an error.
            if la.datatype.is_none() && lb.datatype.is_none() {
                return Ok(false);
            }
            if la.datatype == lb.datatype {
                // Same unrecognized datatype, different lexical form.
                return Err(EvalError::new(format!("cannot compare {} and {}", la, lb)));
            }
            if la.datatype.is_some() && lb.datatype.is_some() {
                return Err(EvalError::new(format!("cannot compare {} and {}", la, lb)));
            }
            Ok(false)
        }
        _ => Ok(false),
    }
}

/// Ordering for `<`, `>`, `<=`, `>=`; defined for numeric, dateTime, string
/// and boolean pairs only.
fn order_terms(a: &Term, b: &Term) -> Result<Ordering, EvalError> {
    let (la, lb) = match (a, b) {
        (Term::Literal(la), Term::Literal(lb)) => (la, lb),
        _ => return Err(EvalError::new("ordering is only defined on literals")),
    };
    if let (Some(x), Some(y)) = (la.numeric_value(), lb.numeric_value()) {
        return x
            .compare(y)
            .ok_or_else(|| EvalError::new("incomparable numbers"));
    }
    if let (Some(x), Some(y)) = (la.datetime_value(), lb.datetime_value()) {
        return Ok(x.cmp(&y));
    }
    if let (Some(x), Some(y)) = (la.boolean_value(), lb.boolean_value()) {
        return Ok(x.cmp(&y));
    }
    if la.datatype.is_none() && la.language.is_none() && lb.datatype.is_none()
        && lb.language.is_none()
    {
        return Ok(la.value.cmp(&lb.value));
    }
    Err(EvalError::new(format!("cannot order {} and {}", la, lb)))
}

#[derive(Clone, Copy)]
enum ArithOp {
    Add,
    Subtract,
    Multiply,
    Divide,
}

fn arithmetic(
    exec: &Executor<'_>,
    a: &Expr,
    b: &Expr,
    solution: &Solution,
    op: ArithOp,
) -> EvalResult {
    let (a, b) = eval_pair(exec, a, b, solution)?;
    let (x, y) = (numeric_of(&a)?, numeric_of(&b)?);
    apply_numeric(op, x, y).map(|n| Term::Literal(numeric_literal(n)))
}

fn numeric_of(term: &Term) -> Result<Numeric, EvalError> {
    term.as_literal()
        .and_then(|lit| lit.numeric_value())
        .ok_or_else(|| EvalError::new(format!("not a number: {}", term)))
}

/// XPath numeric promotion: integer -> decimal -> double.
fn apply_numeric(op: ArithOp, a: Numeric, b: Numeric) -> Result<Numeric, EvalError> {
    use Numeric::*;
    match (a, b) {
        (Double(_), _) | (_, Double(_)) => {
            Ok(Double(apply_f64(op, a.as_f64(), b.as_f64())))
        }
        (Decimal(_), _) | (_, Decimal(_)) => {
            if matches!(op, ArithOp::Divide) && b.as_f64() == 0.0 {
                return Err(EvalError::new("division by zero"));
            }
            Ok(Decimal(apply_f64(op, a.as_f64(), b.as_f64())))
        }
        (Integer(x), Integer(y)) => match op {
            ArithOp::Add => x
                .checked_add(y)
                .map(Integer)
                .ok_or_else(|| EvalError::new("integer overflow")),
            ArithOp::Subtract => x
                .checked_sub(y)
                .map(Integer)
                .ok_or_else(|| EvalError::new("integer overflow")),
            ArithOp::Multiply => x
                .checked_mul(y)
                .map(Integer)
                .ok_or_else(|| EvalError::new("integer overflow")),
            ArithOp::Divide => {
                // Integer division yields a decimal in SPARQL.
                if y == 0 {
                    Err(EvalError::new("division by zero"))
                } else {
                    Ok(Decimal(x as f64 / y as f64))
                }
            }
        },
    }
}

fn apply_f64(op: ArithOp, x: f64, y: f64) -> f64 {
    match op {
        ArithOp::Add => x + y,
        ArithOp::Subtract => x - y,
        ArithOp::Multiply => x * y,
        ArithOp::Divide => x / y,
    }
}

pub(crate) fn numeric_literal(value: Numeric) -> Literal {
    match value {
        Numeric::Integer(i) => Literal::integer(i),
        Numeric::Decimal(d) => Literal::decimal(d),
        Numeric::Double(d) => Literal::double(d),
    }
}

pub(crate) fn add_numerics(a: Numeric, b: Numeric) -> Result<Numeric, EvalError> {
    apply_numeric(ArithOp::Add, a, b)
}

fn in_list(
    exec: &Executor<'_>,
    test: &Expr,
    list: &[Expr],
    solution: &Solution,
    negated: bool,
) -> EvalResult {
    let needle = evaluate(exec, test, solution)?;
    let mut first_error = None;
    for item in list {
        match evaluate(exec, item, solution).and_then(|term| equal_terms(&needle, &term)) {
            Ok(true) => return Ok(boolean(!negated)),
            Ok(false) => {}
            Err(e) => first_error = first_error.or(Some(e)),
        }
    }
    match first_error {
        Some(e) => Err(e),
        None => Ok(boolean(negated)),
    }
}

/// A string-valued literal: plain or language-tagged, never typed.
fn string_literal(term: &Term) -> Result<&Literal, EvalError> {
    match term {
        Term::Literal(lit) if lit.datatype.is_none() => Ok(lit),
        other => Err(EvalError::new(format!("not a string literal: {}", other))),
    }
}

fn call_function(
    exec: &Executor<'_>,
    name: &str,
    args: &[Expr],
    solution: &Solution,
) -> EvalResult {
    // Lazily-evaluated builtins first.
    match name {
        "BOUND" => {
            return match args {
                [Expression::Variable(var)] => Ok(boolean(solution.is_bound(var))),
                _ => Err(EvalError::new("BOUND requires a single variable")),
            }
        }
        "IF" => {
            if args.len() != 3 {
                return Err(EvalError::new("IF requires three arguments"));
            }
            let condition = effective_boolean(exec, &args[0], solution)?;
            let branch = if condition { &args[1] } else { &args[2] };
            return evaluate(exec, branch, solution);
        }
        "COALESCE" => {
            for arg in args {
                if let Ok(term) = evaluate(exec, arg, solution) {
                    return Ok(term);
                }
            }
            return Err(EvalError::new("COALESCE: no argument evaluated"));
        }
        _ => {}
    }

    let mut values = Vec::with_capacity(args.len());
    for arg in args {
        values.push(evaluate(exec, arg, solution)?);
    }

    match (name, values.as_slice()) {
        ("STR", [term]) => match term {
            Term::Iri(iri) => Ok(Term::Literal(Literal::simple(iri.as_str()))),
            Term::Literal(lit) => Ok(Term::Literal(Literal::simple(lit.value.clone()))),
            Term::BlankNode(_) => Err(EvalError::new("STR of a blank node")),
        },
        ("LANG", [term]) => match term {
            Term::Literal(lit) => Ok(Term::Literal(Literal::simple(
                lit.language.clone().unwrap_or_default(),
            ))),
            _ => Err(EvalError::new("LANG of a non-literal")),
        },
        ("DATATYPE", [term]) => match term {
            Term::Literal(lit) => Ok(Term::Iri(lit.datatype_iri())),
            _ => Err(EvalError::new("DATATYPE of a non-literal")),
        },
        ("ISIRI" | "ISURI", [term]) => Ok(boolean(term.is_iri())),
        ("ISLITERAL", [term]) => Ok(boolean(term.is_literal())),
        ("ISBLANK", [term]) => Ok(boolean(term.is_blank())),

        ("REGEX", [text, pattern]) => regex_match(text, pattern, None),
        ("REGEX", [text, pattern, flags]) => regex_match(text, pattern, Some(flags)),
        ("CONTAINS", [haystack, needle]) => {
            let (h, n) = (string_literal(haystack)?, string_literal(needle)?);
            Ok(boolean(h.value.contains(&n.value)))
        }
        ("STRSTARTS", [haystack, needle]) => {
            let (h, n) = (string_literal(haystack)?, string_literal(needle)?);
            Ok(boolean(h.value.starts_with(&n.value)))
        }
        ("STRENDS", [haystack, needle]) => {
            let (h, n) = (string_literal(haystack)?, string_literal(needle)?);
            Ok(boolean(h.value.ends_with(&n.value)))
        }
        ("STRLEN", [term]) => {
            let lit = string_literal(term)?;
            Ok(Term::Literal(Literal::integer(
                lit.value.chars().count() as i64
            )))
        }
        ("UCASE", [term]) => {
            let lit = string_literal(term)?;
            Ok(Term::Literal(with_same_tag(lit, lit.value.to_uppercase())))
        }
        ("LCASE", [term]) => {
            let lit = string_literal(term)?;
            Ok(Term::Literal(with_same_tag(lit, lit.value.to_lowercase())))
        }
        ("SUBSTR", [term, start]) => substr(term, start, None),
        ("SUBSTR", [term, start, length]) => substr(term, start, Some(length)),
        ("REPLACE", [text, pattern, replacement]) => replace(text, pattern, replacement, None),
        ("REPLACE", [text, pattern, replacement, flags]) => {
            replace(text, pattern, replacement, Some(flags))
        }
        ("CONCAT", parts) => {
            let mut out = String::new();
            for part in parts {
                out.push_str(&string_literal(part)?.value);
            }
            Ok(Term::Literal(Literal::simple(out)))
        }

        ("NOW", []) => Ok(Term::Literal(Literal::date_time(exec.now()))),
        ("YEAR", [term]) => date_component(term, |dt| dt.year() as i64),
        ("MONTH", [term]) => date_component(term, |dt| dt.month() as i64),
        ("DAY", [term]) => date_component(term, |dt| dt.day() as i64),
        ("HOURS", [term]) => date_component(term, |dt| dt.hour() as i64),
        ("MINUTES", [term]) => date_component(term, |dt| dt.minute() as i64),
        ("SECONDS", [term]) => {
            let datetime = datetime_of(term)?;
            let seconds =
                datetime.second() as f64 + datetime.nanosecond() as f64 / 1_000_000_000.0;
            Ok(Term::Literal(Literal::decimal(seconds)))
        }

        ("ABS", [term]) => match numeric_of(term)? {
            Numeric::Integer(i) => Ok(Term::Literal(Literal::integer(i.abs()))),
            Numeric::Decimal(d) => Ok(Term::Literal(Literal::decimal(d.abs()))),
            Numeric::Double(d) => Ok(Term::Literal(Literal::double(d.abs()))),
        },
        ("CEIL", [term]) => rounded(term, f64::ceil),
        ("FLOOR", [term]) => rounded(term, f64::floor),
        ("ROUND", [term]) => rounded(term, f64::round),

        _ => Err(EvalError::new(format!(
            "unknown function {}/{}",
            name,
            values.len()
        ))),
    }
}

fn with_same_tag(original: &Literal, value: String) -> Literal {
    match &original.language {
        Some(lang) => Literal::lang_tagged(value, lang.clone()),
        None => Literal::simple(value),
    }
}

fn regex_match(text: &Term, pattern: &Term, flags: Option<&Term>) -> EvalResult {
    let text = string_literal(text)?;
    let pattern = string_literal(pattern)?;
    let regex = build_regex(&pattern.value, flags)?;
    Ok(boolean(regex.is_match(&text.value)))
}

fn replace(
    text: &Term,
    pattern: &Term,
    replacement: &Term,
    flags: Option<&Term>,
) -> EvalResult {
    let text = string_literal(text)?;
    let pattern = string_literal(pattern)?;
    let replacement = string_literal(replacement)?;
    let regex = build_regex(&pattern.value, flags)?;
    let replaced = regex.replace_all(&text.value, replacement.value.as_str());
    Ok(Term::Literal(with_same_tag(text, replaced.into_owned())))
}

fn build_regex(pattern: &str, flags: Option<&Term>) -> Result<regex::Regex, EvalError> {
    let mut builder = RegexBuilder::new(pattern);
    if let Some(flags) = flags {
        for flag in string_literal(flags)?.value.chars() {
            match flag {
                'i' => {
                    builder.case_insensitive(true);
                }
                's' => {
                    builder.dot_matches_new_line(true);
                }
                'm' => {
                    builder.multi_line(true);
                }
                'x' => {
                    builder.ignore_whitespace(true);
                }
                other => return Err(EvalError::new(format!("unknown regex flag {}", other))),
            }
        }
    }
    builder
        .build()
        .map_err(|e| EvalError::new(format!("invalid regex: {}", e)))
}

fn substr(term: &Term, start: &Term, length: Option<&Term>) -> EvalResult {
    let lit = string_literal(term)?;
    let start = match numeric_of(start)? {
        Numeric::Integer(i) => i,
        _ => return Err(EvalError::new("SUBSTR start must be an integer")),
    };
    // XPath substring is 1-based.
    let skip = (start - 1).max(0) as usize;
    let taken: String = match length {
        None => lit.value.chars().skip(skip).collect(),
        Some(length) => {
            let length = match numeric_of(length)? {
                Numeric::Integer(i) => i.max(0) as usize,
                _ => return Err(EvalError::new("SUBSTR length must be an integer")),
            };
            lit.value.chars().skip(skip).take(length).collect()
        }
    };
    Ok(Term::Literal(with_same_tag(lit, taken)))
}

fn datetime_of(term: &Term) -> Result<chrono::DateTime<chrono::FixedOffset>, EvalError> {
    term.as_literal()
        .and_then(|lit| lit.datetime_value())
        .ok_or_else(|| EvalError::new(format!("not an xsd:dateTime: {}", term)))
}

fn date_component(term: &Term, component: fn(&chrono::DateTime<chrono::FixedOffset>) -> i64) -> EvalResult {
    let datetime = datetime_of(term)?;
    Ok(Term::Literal(Literal::integer(component(&datetime))))
}

fn rounded(term: &Term, f: fn(f64) -> f64) -> EvalResult {
    match numeric_of(term)? {
        Numeric::Integer(i) => Ok(Term::Literal(Literal::integer(i))),
        Numeric::Decimal(d) => Ok(Term::Literal(Literal::decimal(f(d)))),
        Numeric::Double(d) => Ok(Term::Literal(Literal::double(f(d)))),
    }
}

/// STR-like rendering used by GROUP_CONCAT.
pub(crate) fn string_form(term: &Term) -> String {
    match term {
        Term::Iri(iri) => iri.as_str().to_owned(),
        Term::Literal(lit) => lit.value.clone(),
        Term::BlankNode(label) => label.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use minerva_core::Iri;

    #[test]
    fn test_ebv_rules() {
        assert_eq!(ebv(&boolean(true)).unwrap(), true);
        assert_eq!(ebv(&boolean(false)).unwrap(), false);
        assert_eq!(ebv(&Term::Literal(Literal::integer(0))).unwrap(), false);
        assert_eq!(ebv(&Term::Literal(Literal::integer(7))).unwrap(), true);
        assert_eq!(ebv(&Term::literal("")).unwrap(), false);
        assert_eq!(ebv(&Term::literal("x")).unwrap(), true);
        assert!(ebv(&Term::iri("http://example.org/")).is_err());
    }

    #[test]
    fn test_equal_terms_plain_vs_typed_string() {
        let plain = Term::literal("x");
        let typed = Term::Literal(Literal::typed("x", Iri::new(xsd::STRING)));
        assert!(equal_terms(&plain, &typed).unwrap());
    }

    #[test]
    fn test_equal_terms_numeric_across_datatypes() {
        let int = Term::Literal(Literal::integer(2));
        let dec = Term::Literal(Literal::typed("2.0", Iri::new(xsd::DECIMAL)));
        assert!(equal_terms(&int, &dec).unwrap());
    }

    #[test]
    fn test_equal_terms_lang_tags_must_match() {
        let en = Term::Literal(Literal::lang_tagged("chat", "en"));
        let fr = Term::Literal(Literal::lang_tagged("chat", "fr"));
        assert!(!equal_terms(&en, &fr).unwrap());
    }

    #[test]
    fn test_equal_terms_unknown_datatype_errors() {
        let a = Term::Literal(Literal::typed("a", Iri::new("http://example.org/dt")));
        let b = Term::Literal(Literal::typed("b", Iri::new("http://example.org/dt")));
        assert!(equal_terms(&a, &b).is_err());
    }

    #[test]
    fn test_numeric_promotion() {
        let sum = apply_numeric(
            ArithOp::Add,
            Numeric::Integer(1),
            Numeric::Decimal(0.5),
        )
        .unwrap();
        assert!(matches!(sum, Numeric::Decimal(d) if d == 1.5));

        let div = apply_numeric(ArithOp::Divide, Numeric::Integer(1), Numeric::Integer(2)).unwrap();
        assert!(matches!(div, Numeric::Decimal(d) if d == 0.5));
    }

    #[test]
    fn test_division_by_zero_is_error() {
        assert!(apply_numeric(ArithOp::Divide, Numeric::Integer(1), Numeric::Integer(0)).is_err());
        // Doubles follow IEEE semantics instead.
        assert!(matches!(
            apply_numeric(ArithOp::Divide, Numeric::Double(1.0), Numeric::Double(0.0)),
            Ok(Numeric::Double(d)) if d.is_infinite()
        ));
    }

    #[test]
    fn test_build_regex_flags() {
        let regex = build_regex("abc", Some(&Term::literal("i"))).unwrap();
        assert!(regex.is_match("ABC"));
        assert!(build_regex("abc", Some(&Term::literal("q"))).is_err());
        assert!(build_regex("(", None).is_err());
    }

    #[test]
    fn test_substr_is_one_based() {
        let result = substr(
            &Term::literal("minerva"),
            &Term::Literal(Literal::integer(2)),
            Some(&Term::Literal(Literal::integer(3))),
        )
        .unwrap();
        assert_eq!(result, Term::literal("ine"));
    }

    #[test]
    fn test_order_terms_numeric_and_string() {
        let two = Term::Literal(Literal::integer(2));
        let ten = Term::Literal(Literal::integer(10));
        assert_eq!(order_terms(&two, &ten).unwrap(), Ordering::Less);

        let a = Term::literal("a");
        let b = Term::literal("b");
        assert_eq!(order_terms(&a, &b).unwrap(), Ordering::Less);

        assert!(order_terms(&two, &a).is_err());
    }
}
