//! RDF term and triple model
//!
//! Terms are immutable values with structural equality. A literal carrying no
//! datatype is the same term as one typed `xsd:string` (RDF 1.1), which the
//! constructors enforce by normalizing the datatype away.

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Well-known XSD / RDF datatype IRIs
pub mod xsd {
    pub const STRING: &str = "http://www.w3.org/2001/XMLSchema#string";
    pub const INTEGER: &str = "http://www.w3.org/2001/XMLSchema#integer";
    pub const DECIMAL: &str = "http://www.w3.org/2001/XMLSchema#decimal";
    pub const DOUBLE: &str = "http://www.w3.org/2001/XMLSchema#double";
    pub const FLOAT: &str = "http://www.w3.org/2001/XMLSchema#float";
    pub const BOOLEAN: &str = "http://www.w3.org/2001/XMLSchema#boolean";
    pub const DATE_TIME: &str = "http://www.w3.org/2001/XMLSchema#dateTime";
    pub const LANG_STRING: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#langString";
}

/// The `rdf:type` predicate, written `a` in SPARQL and Turtle.
pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";

/// A normalized absolute IRI.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Iri(pub String);

impl Iri {
    pub fn new<S: Into<String>>(iri: S) -> Self {
        Iri(iri.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Iri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An RDF literal: lexical form plus optional datatype or language tag.
///
/// Invariant: `datatype` is never `xsd:string` (normalized to `None`), and a
/// language-tagged literal carries no explicit datatype.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Literal {
    pub value: String,
    pub datatype: Option<Iri>,
    pub language: Option<String>,
}

impl Literal {
    /// A plain literal, equal to the same lexical form typed `xsd:string`.
    pub fn simple<S: Into<String>>(value: S) -> Self {
        Literal {
            value: value.into(),
            datatype: None,
            language: None,
        }
    }

    /// A typed literal. `xsd:string` is dropped so that `"x"` and
    /// `"x"^^xsd:string` are structurally equal.
    pub fn typed<S: Into<String>>(value: S, datatype: Iri) -> Self {
        let datatype = if datatype.as_str() == xsd::STRING {
            None
        } else {
            Some(datatype)
        };
        Literal {
            value: value.into(),
            datatype,
            language: None,
        }
    }

    /// A language-tagged string. Tags compare case-insensitively per BCP 47,
    /// so the tag is lowercased here.
    pub fn lang_tagged<S: Into<String>, L: Into<String>>(value: S, language: L) -> Self {
        Literal {
            value: value.into(),
            datatype: None,
            language: Some(language.into().to_ascii_lowercase()),
        }
    }

    pub fn integer(value: i64) -> Self {
        Literal::typed(value.to_string(), Iri::new(xsd::INTEGER))
    }

    pub fn decimal(value: f64) -> Self {
        Literal::typed(value.to_string(), Iri::new(xsd::DECIMAL))
    }

    pub fn double(value: f64) -> Self {
        Literal::typed(value.to_string(), Iri::new(xsd::DOUBLE))
    }

    pub fn boolean(value: bool) -> Self {
        Literal::typed(value.to_string(), Iri::new(xsd::BOOLEAN))
    }

    pub fn date_time(value: DateTime<Utc>) -> Self {
        Literal::typed(value.to_rfc3339(), Iri::new(xsd::DATE_TIME))
    }

    /// The datatype as SPARQL `DATATYPE()` reports it: `rdf:langString` for
    /// language-tagged strings, `xsd:string` for plain literals.
    pub fn datatype_iri(&self) -> Iri {
        if self.language.is_some() {
            Iri::new(xsd::LANG_STRING)
        } else {
            self.datatype
                .clone()
                .unwrap_or_else(|| Iri::new(xsd::STRING))
        }
    }

    pub fn is_numeric(&self) -> bool {
        self.numeric_value().is_some()
    }

    /// Parse the lexical form according to the numeric datatype, if any.
    pub fn numeric_value(&self) -> Option<Numeric> {
        let datatype = self.datatype.as_ref()?;
        match datatype.as_str() {
            xsd::INTEGER => self.value.trim().parse::<i64>().ok().map(Numeric::Integer),
            xsd::DECIMAL => self.value.trim().parse::<f64>().ok().map(Numeric::Decimal),
            xsd::DOUBLE | xsd::FLOAT => self.value.trim().parse::<f64>().ok().map(Numeric::Double),
            _ => None,
        }
    }

    /// Parse the lexical form as `xsd:dateTime`. Accepts RFC 3339 and the
    /// zone-less profile, which is taken as UTC.
    pub fn datetime_value(&self) -> Option<DateTime<FixedOffset>> {
        if self.datatype.as_ref()?.as_str() != xsd::DATE_TIME {
            return None;
        }
        let lexical = self.value.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(lexical) {
            return Some(dt);
        }
        NaiveDateTime::parse_from_str(lexical, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|naive| Utc.from_utc_datetime(&naive).fixed_offset())
    }

    pub fn boolean_value(&self) -> Option<bool> {
        if self.datatype.as_ref()?.as_str() != xsd::BOOLEAN {
            return None;
        }
        match self.value.trim() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\"", escape_literal(&self.value))?;
        if let Some(lang) = &self.language {
            write!(f, "@{}", lang)?;
        } else if let Some(datatype) = &self.datatype {
            write!(f, "^^<{}>", datatype)?;
        }
        Ok(())
    }
}

/// A numeric value extracted from a literal, tagged with its promotion rung
/// (integer → decimal → double per the XPath promotion ladder).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Numeric {
    Integer(i64),
    Decimal(f64),
    Double(f64),
}

impl Numeric {
    pub fn as_f64(self) -> f64 {
        match self {
            Numeric::Integer(i) => i as f64,
            Numeric::Decimal(d) | Numeric::Double(d) => d,
        }
    }

    pub fn compare(self, other: Numeric) -> Option<Ordering> {
        if let (Numeric::Integer(a), Numeric::Integer(b)) = (self, other) {
            return Some(a.cmp(&b));
        }
        self.as_f64().partial_cmp(&other.as_f64())
    }
}

/// A query variable, written without its `?` sigil.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Variable(pub String);

impl Variable {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Variable(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "?{}", self.0)
    }
}

/// A ground RDF term. Variables never appear in the store or in solutions;
/// they live in patterns only (see `minerva-sparql`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Term {
    Iri(Iri),
    Literal(Literal),
    BlankNode(String),
}

impl Term {
    pub fn iri<S: Into<String>>(iri: S) -> Self {
        Term::Iri(Iri::new(iri))
    }

    pub fn literal<S: Into<String>>(value: S) -> Self {
        Term::Literal(Literal::simple(value))
    }

    pub fn is_iri(&self) -> bool {
        matches!(self, Term::Iri(_))
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Term::Literal(_))
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, Term::BlankNode(_))
    }

    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            Term::Literal(lit) => Some(lit),
            _ => None,
        }
    }

    /// Total SPARQL order: BlankNode < IRI < Literal, then a type-specific
    /// order within each kind. Numeric literals compare numerically and
    /// `xsd:dateTime` chronologically; everything else falls back to the
    /// lexical form with datatype and language as tie-breakers.
    pub fn sparql_cmp(&self, other: &Term) -> Ordering {
        fn rank(term: &Term) -> u8 {
            match term {
                Term::BlankNode(_) => 0,
                Term::Iri(_) => 1,
                Term::Literal(_) => 2,
            }
        }

        match (self, other) {
            (Term::BlankNode(a), Term::BlankNode(b)) => a.cmp(b),
            (Term::Iri(a), Term::Iri(b)) => a.cmp(b),
            (Term::Literal(a), Term::Literal(b)) => {
                if let (Some(x), Some(y)) = (a.numeric_value(), b.numeric_value()) {
                    if let Some(ordering) = x.compare(y) {
                        if ordering != Ordering::Equal {
                            return ordering;
                        }
                    }
                }
                if let (Some(x), Some(y)) = (a.datetime_value(), b.datetime_value()) {
                    let ordering = x.cmp(&y);
                    if ordering != Ordering::Equal {
                        return ordering;
                    }
                }
                a.value
                    .cmp(&b.value)
                    .then_with(|| a.datatype.cmp(&b.datatype))
                    .then_with(|| a.language.cmp(&b.language))
            }
            _ => rank(self).cmp(&rank(other)),
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Iri(iri) => write!(f, "<{}>", iri),
            Term::Literal(lit) => write!(f, "{}", lit),
            Term::BlankNode(label) => write!(f, "_:{}", label),
        }
    }
}

/// An RDF triple. Subjects are IRIs or blank nodes and objects are any ground
/// term; the store does not police the subject kind, patterns that put a
/// literal there simply never match anything.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Triple {
    pub subject: Term,
    pub predicate: Iri,
    pub object: Term,
}

impl Triple {
    pub fn new(subject: Term, predicate: Iri, object: Term) -> Self {
        Triple {
            subject,
            predicate,
            object,
        }
    }
}

impl fmt::Display for Triple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} <{}> {} .",
            self.subject, self.predicate, self.object
        )
    }
}

/// Escape a lexical form for N-Triples / SPARQL serialization.
pub fn escape_literal(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '"' => escaped.push_str("\\\""),
            '\\' => escaped.push_str("\\\\"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
