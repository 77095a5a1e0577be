//! SPARQL algebra
//!
//! The closed operator tree the executor walks, the expression sum shared
//! with the surface AST, and the AST -> algebra translator.
//!
//! Expressions are generic over the payload of EXISTS: the parser produces
//! `Expression<GraphPattern>`, the translator rewrites that into
//! `Expression<Algebra>` so the executor never sees surface syntax.

use crate::parser::{
    GraphPattern, PatternPredicate, PatternTerm, Query, QueryForm, SelectItem, TriplePattern,
    ValuesBlock,
};
use crate::SparqlError;
use minerva_core::{Iri, Literal, Term, Variable};
use std::collections::BTreeSet;

/// Expression over solution mappings. `P` is the payload of EXISTS /
/// NOT EXISTS: a graph pattern before translation, an algebra tree after.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression<P> {
    Variable(Variable),
    Literal(Literal),
    Iri(Iri),
    // Logical (three-valued, see the expression evaluator)
    Or(Box<Expression<P>>, Box<Expression<P>>),
    And(Box<Expression<P>>, Box<Expression<P>>),
    Not(Box<Expression<P>>),
    // Comparison
    Equal(Box<Expression<P>>, Box<Expression<P>>),
    NotEqual(Box<Expression<P>>, Box<Expression<P>>),
    Less(Box<Expression<P>>, Box<Expression<P>>),
    LessOrEqual(Box<Expression<P>>, Box<Expression<P>>),
    Greater(Box<Expression<P>>, Box<Expression<P>>),
    GreaterOrEqual(Box<Expression<P>>, Box<Expression<P>>),
    // Arithmetic
    Add(Box<Expression<P>>, Box<Expression<P>>),
    Subtract(Box<Expression<P>>, Box<Expression<P>>),
    Multiply(Box<Expression<P>>, Box<Expression<P>>),
    Divide(Box<Expression<P>>, Box<Expression<P>>),
    UnaryMinus(Box<Expression<P>>),
    /// Built-in call (upper-cased name) or extension function named by IRI.
    FunctionCall(String, Vec<Expression<P>>),
    In(Box<Expression<P>>, Vec<Expression<P>>),
    NotIn(Box<Expression<P>>, Vec<Expression<P>>),
    Exists(Box<P>),
    NotExists(Box<P>),
    Aggregate {
        function: AggregateFunction,
        distinct: bool,
        expr: Option<Box<Expression<P>>>,
        separator: Option<String>,
    },
}

/// Expression as the parser emits it.
pub type AstExpr = Expression<GraphPattern>;
/// Expression as the optimizer and executor consume it.
pub type Expr = Expression<Algebra>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunction {
    Count,
    Sum,
    Avg,
    Min,
    Max,
    GroupConcat,
    Sample,
}

/// A declared aggregate inside a `Group` node.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregate {
    pub function: AggregateFunction,
    /// `None` only for `COUNT(*)`.
    pub expr: Option<Expr>,
    pub distinct: bool,
    pub separator: Option<String>,
}

/// One ORDER BY key.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderComparator {
    pub expr: Expr,
    pub descending: bool,
}

/// The algebra operator tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Algebra {
    /// Basic graph pattern; predicates may be property paths.
    Bgp(Vec<TriplePattern>),
    /// Inline data. A `None` cell is UNDEF: the variable stays unbound in
    /// that row.
    Values {
        variables: Vec<Variable>,
        rows: Vec<Vec<Option<Term>>>,
    },
    Join(Box<Algebra>, Box<Algebra>),
    LeftJoin {
        left: Box<Algebra>,
        right: Box<Algebra>,
        expr: Option<Expr>,
    },
    Union(Box<Algebra>, Box<Algebra>),
    Minus(Box<Algebra>, Box<Algebra>),
    Filter(Expr, Box<Algebra>),
    Extend {
        input: Box<Algebra>,
        variable: Variable,
        expr: Expr,
    },
    Project(Vec<Variable>, Box<Algebra>),
    Distinct(Box<Algebra>),
    Reduced(Box<Algebra>),
    OrderBy(Vec<OrderComparator>, Box<Algebra>),
    Slice {
        input: Box<Algebra>,
        offset: Option<u64>,
        limit: Option<u64>,
    },
    Group {
        input: Box<Algebra>,
        keys: Vec<Variable>,
        aggregates: Vec<(Variable, Aggregate)>,
    },
    SubQuery(Box<Algebra>),
    Service {
        endpoint: Iri,
        pattern: Box<Algebra>,
        silent: bool,
    },
    // Roots, top-level only
    Ask(Box<Algebra>),
    Construct {
        template: Vec<TriplePattern>,
        input: Box<Algebra>,
    },
}

impl Algebra {
    pub fn empty_bgp() -> Algebra {
        Algebra::Bgp(Vec::new())
    }

    fn is_empty_bgp(&self) -> bool {
        matches!(self, Algebra::Bgp(patterns) if patterns.is_empty())
    }
}

/// Variables a triple pattern can bind.
pub fn pattern_variables(pattern: &TriplePattern, out: &mut BTreeSet<Variable>) {
    for term in [&pattern.subject, &pattern.object] {
        if let PatternTerm::Variable(var) = term {
            out.insert(var.clone());
        }
    }
    if let PatternPredicate::Variable(var) = &pattern.predicate {
        out.insert(var.clone());
    }
}

/// Variables an expression references, including those of nested EXISTS
/// algebra (used by filter push-down).
pub fn expression_variables(expr: &Expr, out: &mut BTreeSet<Variable>) {
    match expr {
        Expression::Variable(var) => {
            out.insert(var.clone());
        }
        Expression::Literal(_) | Expression::Iri(_) => {}
        Expression::Or(a, b)
        | Expression::And(a, b)
        | Expression::Equal(a, b)
        | Expression::NotEqual(a, b)
        | Expression::Less(a, b)
        | Expression::LessOrEqual(a, b)
        | Expression::Greater(a, b)
        | Expression::GreaterOrEqual(a, b)
        | Expression::Add(a, b)
        | Expression::Subtract(a, b)
        | Expression::Multiply(a, b)
        | Expression::Divide(a, b) => {
            expression_variables(a, out);
            expression_variables(b, out);
        }
        Expression::Not(inner) | Expression::UnaryMinus(inner) => {
            expression_variables(inner, out);
        }
        Expression::FunctionCall(_, args) => {
            for arg in args {
                expression_variables(arg, out);
            }
        }
        Expression::In(test, list) | Expression::NotIn(test, list) => {
            expression_variables(test, out);
            for item in list {
                expression_variables(item, out);
            }
        }
        Expression::Exists(pattern) | Expression::NotExists(pattern) => {
            out.extend(visible_variables(pattern));
        }
        Expression::Aggregate { expr, .. } => {
            if let Some(inner) = expr {
                expression_variables(inner, out);
            }
        }
    }
}

/// The variables an algebra tree can bind in its output mappings.
pub fn visible_variables(algebra: &Algebra) -> BTreeSet<Variable> {
    let mut out = BTreeSet::new();
    collect_visible(algebra, &mut out);
    out
}

fn collect_visible(algebra: &Algebra, out: &mut BTreeSet<Variable>) {
    match algebra {
        Algebra::Bgp(patterns) => {
            for pattern in patterns {
                pattern_variables(pattern, out);
            }
        }
        Algebra::Values { variables, .. } => out.extend(variables.iter().cloned()),
        Algebra::Join(left, right) | Algebra::Union(left, right) => {
            collect_visible(left, out);
            collect_visible(right, out);
        }
        Algebra::LeftJoin { left, right, .. } => {
            collect_visible(left, out);
            collect_visible(right, out);
        }
        // MINUS yields (a subset of) its left side unchanged.
        Algebra::Minus(left, _) => collect_visible(left, out),
        Algebra::Filter(_, input)
        | Algebra::Distinct(input)
        | Algebra::Reduced(input)
        | Algebra::OrderBy(_, input)
        | Algebra::Slice { input, .. } => collect_visible(input, out),
        Algebra::Extend {
            input, variable, ..
        } => {
            collect_visible(input, out);
            out.insert(variable.clone());
        }
        Algebra::Project(variables, _) => out.extend(variables.iter().cloned()),
        Algebra::Group {
            keys, aggregates, ..
        } => {
            out.extend(keys.iter().cloned());
            out.extend(aggregates.iter().map(|(var, _)| var.clone()));
        }
        Algebra::SubQuery(inner) => collect_visible(inner, out),
        Algebra::Service { pattern, .. } => collect_visible(pattern, out),
        Algebra::Ask(_) | Algebra::Construct { .. } => {}
    }
}

/// Plan builder trait: AST -> algebra.
pub trait PlanBuilder {
    fn to_algebra(&self, query: &Query) -> Result<Algebra, SparqlError>;
}

/// Default algebra builder.
pub struct DefaultPlanBuilder;

/// Aggregates hoisted out of projection / HAVING expressions.
#[derive(Default)]
struct AggregateHoist {
    aggregates: Vec<(Variable, Aggregate)>,
    counter: usize,
}

impl AggregateHoist {
    fn fresh(&mut self, aggregate: Aggregate) -> Variable {
        let var = Variable::new(format!("__agg{}", self.counter));
        self.counter += 1;
        self.aggregates.push((var.clone(), aggregate));
        var
    }
}

impl PlanBuilder for DefaultPlanBuilder {
    fn to_algebra(&self, query: &Query) -> Result<Algebra, SparqlError> {
        match &query.form {
            QueryForm::Select => self.translate_select(query),
            QueryForm::Ask => Ok(Algebra::Ask(Box::new(
                self.translate_pattern(&query.where_clause)?,
            ))),
            QueryForm::Construct(template) => self.translate_construct(query, template),
        }
    }
}

impl DefaultPlanBuilder {
    /// SELECT structure, outer to inner:
    /// slice -> orderby -> distinct/reduced -> project -> extend* -> group -> where.
    fn translate_select(&self, query: &Query) -> Result<Algebra, SparqlError> {
        let mut algebra = self.translate_pattern(&query.where_clause)?;

        // Hoist aggregates out of the projection and HAVING clauses.
        let mut hoist = AggregateHoist::default();
        let mut extends: Vec<(Variable, Expr)> = Vec::new();
        let mut projected: Vec<Variable> = Vec::new();

        for item in &query.select.items {
            match item {
                SelectItem::Variable(var) => projected.push(var.clone()),
                SelectItem::Expression(expr, alias) => {
                    if projected.contains(alias) {
                        return Err(SparqlError::TranslationError(format!(
                            "duplicate projection alias ?{}",
                            alias.as_str()
                        )));
                    }
                    match expr {
                        // `(COUNT(?x) AS ?c)`: the alias is the aggregate's
                        // output variable, no extend needed.
                        Expression::Aggregate {
                            function,
                            distinct,
                            expr: agg_expr,
                            separator,
                        } => {
                            let aggregate = self.translate_aggregate(
                                *function,
                                *distinct,
                                agg_expr.as_deref(),
                                separator.clone(),
                            )?;
                            hoist.aggregates.push((alias.clone(), aggregate));
                        }
                        other => {
                            let translated = self.translate_projection_expr(other, &mut hoist)?;
                            extends.push((alias.clone(), translated));
                        }
                    }
                    projected.push(alias.clone());
                }
            }
        }

        let mut having: Vec<Expr> = Vec::new();
        for condition in &query.having {
            having.push(self.translate_projection_expr(condition, &mut hoist)?);
        }

        let grouped = !query.group_by.is_empty() || !hoist.aggregates.is_empty();
        if grouped {
            algebra = Algebra::Group {
                input: Box::new(algebra),
                keys: query.group_by.clone(),
                aggregates: hoist.aggregates,
            };
        } else if !query.having.is_empty() {
            return Err(SparqlError::TranslationError(
                "HAVING requires GROUP BY or aggregates".to_string(),
            ));
        }
        for condition in having {
            algebra = Algebra::Filter(condition, Box::new(algebra));
        }

        for (variable, expr) in extends {
            algebra = Algebra::Extend {
                input: Box::new(algebra),
                variable,
                expr,
            };
        }

        let projection = if query.select.star {
            visible_variables(&algebra).into_iter().collect()
        } else {
            projected
        };
        algebra = Algebra::Project(projection, Box::new(algebra));

        if query.select.distinct {
            algebra = Algebra::Distinct(Box::new(algebra));
        } else if query.select.reduced {
            algebra = Algebra::Reduced(Box::new(algebra));
        }

        algebra = self.apply_order_and_slice(algebra, query)?;
        Ok(algebra)
    }

    fn translate_construct(
        &self,
        query: &Query,
        template: &[TriplePattern],
    ) -> Result<Algebra, SparqlError> {
        for triple in template {
            if matches!(triple.predicate, PatternPredicate::Path(_)) {
                return Err(SparqlError::TranslationError(
                    "property path in CONSTRUCT template".to_string(),
                ));
            }
        }
        let mut input = self.translate_pattern(&query.where_clause)?;
        input = self.apply_order_and_slice(input, query)?;
        Ok(Algebra::Construct {
            template: template.to_vec(),
            input: Box::new(input),
        })
    }

    fn apply_order_and_slice(
        &self,
        mut algebra: Algebra,
        query: &Query,
    ) -> Result<Algebra, SparqlError> {
        if !query.order_by.is_empty() {
            let mut comparators = Vec::with_capacity(query.order_by.len());
            for condition in &query.order_by {
                comparators.push(OrderComparator {
                    expr: self.translate_expression(&condition.expr)?,
                    descending: condition.descending,
                });
            }
            algebra = Algebra::OrderBy(comparators, Box::new(algebra));
        }
        if query.limit.is_some() || query.offset.is_some() {
            algebra = Algebra::Slice {
                input: Box::new(algebra),
                offset: query.offset,
                limit: query.limit,
            };
        }
        Ok(algebra)
    }

    /// Translate one graph pattern node.
    pub fn translate_pattern(&self, pattern: &GraphPattern) -> Result<Algebra, SparqlError> {
        match pattern {
            GraphPattern::Bgp(triples) => Ok(Algebra::Bgp(triples.clone())),
            GraphPattern::Group(elements) => self.translate_group(elements),
            GraphPattern::Union(branches) => {
                if branches.is_empty() {
                    return Ok(Algebra::empty_bgp());
                }
                let mut result = self.translate_pattern(&branches[0])?;
                for branch in &branches[1..] {
                    let right = self.translate_pattern(branch)?;
                    result = Algebra::Union(Box::new(result), Box::new(right));
                }
                Ok(result)
            }
            GraphPattern::Optional(inner) => {
                let (right, expr) = self.split_optional(inner)?;
                Ok(Algebra::LeftJoin {
                    left: Box::new(Algebra::empty_bgp()),
                    right: Box::new(right),
                    expr,
                })
            }
            GraphPattern::Minus(inner) => {
                // A bare MINUS subtracts from nothing.
                let right = self.translate_pattern(inner)?;
                Ok(Algebra::Minus(Box::new(Algebra::empty_bgp()), Box::new(right)))
            }
            GraphPattern::Values(block) => Ok(self.translate_values(block)),
            GraphPattern::SubSelect(inner) => {
                Ok(Algebra::SubQuery(Box::new(self.translate_select(inner)?)))
            }
            GraphPattern::Service {
                endpoint,
                pattern,
                silent,
            } => {
                let inner = self.translate_pattern(pattern)?;
                if contains_service(&inner) {
                    return Err(SparqlError::UnsupportedFeature(
                        "nested SERVICE pattern".to_string(),
                    ));
                }
                Ok(Algebra::Service {
                    endpoint: endpoint.clone(),
                    pattern: Box::new(inner),
                    silent: *silent,
                })
            }
            GraphPattern::Filter(expr) => {
                // Only reachable for a group consisting solely of a FILTER.
                let translated = self.translate_expression(expr)?;
                Ok(Algebra::Filter(translated, Box::new(Algebra::empty_bgp())))
            }
            GraphPattern::Bind(expr, variable) => {
                let translated = self.translate_expression(expr)?;
                Ok(Algebra::Extend {
                    input: Box::new(Algebra::empty_bgp()),
                    variable: variable.clone(),
                    expr: translated,
                })
            }
        }
    }

    /// Group translation: partition the elements into FILTERs, BINDs and
    /// everything else; join the others left-to-right, then wrap one extend
    /// per BIND and one filter per FILTER, each class in source order.
    fn translate_group(&self, elements: &[GraphPattern]) -> Result<Algebra, SparqlError> {
        let mut filters: Vec<&AstExpr> = Vec::new();
        let mut binds: Vec<(&AstExpr, &Variable)> = Vec::new();
        let mut joined: Option<Algebra> = None;

        for element in elements {
            match element {
                GraphPattern::Filter(expr) => filters.push(expr),
                GraphPattern::Bind(expr, variable) => binds.push((expr, variable)),
                GraphPattern::Optional(inner) => {
                    let (right, expr) = self.split_optional(inner)?;
                    let left = joined.take().unwrap_or_else(Algebra::empty_bgp);
                    joined = Some(Algebra::LeftJoin {
                        left: Box::new(left),
                        right: Box::new(right),
                        expr,
                    });
                }
                GraphPattern::Minus(inner) => {
                    let left = joined.take().unwrap_or_else(Algebra::empty_bgp);
                    let right = self.translate_pattern(inner)?;
                    joined = Some(Algebra::Minus(Box::new(left), Box::new(right)));
                }
                other => {
                    let translated = self.translate_pattern(other)?;
                    joined = Some(match joined.take() {
                        None => translated,
                        Some(left) if left.is_empty_bgp() => translated,
                        Some(left) => Algebra::Join(Box::new(left), Box::new(translated)),
                    });
                }
            }
        }

        let mut algebra = joined.unwrap_or_else(Algebra::empty_bgp);
        for (expr, variable) in binds {
            let translated = self.translate_expression(expr)?;
            algebra = Algebra::Extend {
                input: Box::new(algebra),
                variable: variable.clone(),
                expr: translated,
            };
        }
        for expr in filters {
            let translated = self.translate_expression(expr)?;
            algebra = Algebra::Filter(translated, Box::new(algebra));
        }
        Ok(algebra)
    }

    /// OPTIONAL inner pattern: a top-level filter becomes the left join
    /// condition.
    fn split_optional(
        &self,
        inner: &GraphPattern,
    ) -> Result<(Algebra, Option<Expr>), SparqlError> {
        let translated = self.translate_pattern(inner)?;
        match translated {
            Algebra::Filter(expr, input) => Ok((*input, Some(expr))),
            other => Ok((other, None)),
        }
    }

    fn translate_values(&self, block: &ValuesBlock) -> Algebra {
        Algebra::Values {
            variables: block.variables.clone(),
            rows: block.rows.clone(),
        }
    }

    /// Translate an expression appearing inside a pattern (FILTER / BIND /
    /// ORDER BY); aggregates are not allowed there.
    pub fn translate_expression(&self, expr: &AstExpr) -> Result<Expr, SparqlError> {
        self.walk_expression(expr, &mut None)
    }

    /// Translate a projection or HAVING expression, hoisting each aggregate
    /// subtree into a fresh `__aggN` variable.
    fn translate_projection_expr(
        &self,
        expr: &AstExpr,
        hoist: &mut AggregateHoist,
    ) -> Result<Expr, SparqlError> {
        let mut ctx = Some(std::mem::take(hoist));
        let result = self.walk_expression(expr, &mut ctx);
        *hoist = ctx.take().unwrap_or_default();
        result
    }

    fn walk_expression(
        &self,
        expr: &AstExpr,
        hoist: &mut Option<AggregateHoist>,
    ) -> Result<Expr, SparqlError> {
        let walk_pair = |a: &AstExpr,
                             b: &AstExpr,
                             hoist: &mut Option<AggregateHoist>|
         -> Result<(Box<Expr>, Box<Expr>), SparqlError> {
            Ok((
                Box::new(self.walk_expression(a, hoist)?),
                Box::new(self.walk_expression(b, hoist)?),
            ))
        };

        Ok(match expr {
            Expression::Variable(var) => Expression::Variable(var.clone()),
            Expression::Literal(lit) => Expression::Literal(lit.clone()),
            Expression::Iri(iri) => Expression::Iri(iri.clone()),
            Expression::Or(a, b) => {
                let (a, b) = walk_pair(a, b, hoist)?;
                Expression::Or(a, b)
            }
            Expression::And(a, b) => {
                let (a, b) = walk_pair(a, b, hoist)?;
                Expression::And(a, b)
            }
            Expression::Not(inner) => {
                Expression::Not(Box::new(self.walk_expression(inner, hoist)?))
            }
            Expression::Equal(a, b) => {
                let (a, b) = walk_pair(a, b, hoist)?;
                Expression::Equal(a, b)
            }
            Expression::NotEqual(a, b) => {
                let (a, b) = walk_pair(a, b, hoist)?;
                Expression::NotEqual(a, b)
            }
            Expression::Less(a, b) => {
                let (a, b) = walk_pair(a, b, hoist)?;
                Expression::Less(a, b)
            }
            Expression::LessOrEqual(a, b) => {
                let (a, b) = walk_pair(a, b, hoist)?;
                Expression::LessOrEqual(a, b)
            }
            Expression::Greater(a, b) => {
                let (a, b) = walk_pair(a, b, hoist)?;
                Expression::Greater(a, b)
            }
            Expression::GreaterOrEqual(a, b) => {
                let (a, b) = walk_pair(a, b, hoist)?;
                Expression::GreaterOrEqual(a, b)
            }
            Expression::Add(a, b) => {
                let (a, b) = walk_pair(a, b, hoist)?;
                Expression::Add(a, b)
            }
            Expression::Subtract(a, b) => {
                let (a, b) = walk_pair(a, b, hoist)?;
                Expression::Subtract(a, b)
            }
            Expression::Multiply(a, b) => {
                let (a, b) = walk_pair(a, b, hoist)?;
                Expression::Multiply(a, b)
            }
            Expression::Divide(a, b) => {
                let (a, b) = walk_pair(a, b, hoist)?;
                Expression::Divide(a, b)
            }
            Expression::UnaryMinus(inner) => {
                Expression::UnaryMinus(Box::new(self.walk_expression(inner, hoist)?))
            }
            Expression::FunctionCall(name, args) => {
                let mut translated = Vec::with_capacity(args.len());
                for arg in args {
                    translated.push(self.walk_expression(arg, hoist)?);
                }
                Expression::FunctionCall(name.clone(), translated)
            }
            Expression::In(test, list) => {
                let test = Box::new(self.walk_expression(test, hoist)?);
                let mut translated = Vec::with_capacity(list.len());
                for item in list {
                    translated.push(self.walk_expression(item, hoist)?);
                }
                Expression::In(test, translated)
            }
            Expression::NotIn(test, list) => {
                let test = Box::new(self.walk_expression(test, hoist)?);
                let mut translated = Vec::with_capacity(list.len());
                for item in list {
                    translated.push(self.walk_expression(item, hoist)?);
                }
                Expression::NotIn(test, translated)
            }
            Expression::Exists(pattern) => {
                Expression::Exists(Box::new(self.translate_pattern(pattern)?))
            }
            Expression::NotExists(pattern) => {
                Expression::NotExists(Box::new(self.translate_pattern(pattern)?))
            }
            Expression::Aggregate {
                function,
                distinct,
                expr: agg_expr,
                separator,
            } => {
                let aggregate = self.translate_aggregate(
                    *function,
                    *distinct,
                    agg_expr.as_deref(),
                    separator.clone(),
                )?;
                match hoist {
                    Some(ctx) => Expression::Variable(ctx.fresh(aggregate)),
                    None => {
                        return Err(SparqlError::TranslationError(
                            "aggregate outside SELECT or HAVING".to_string(),
                        ))
                    }
                }
            }
        })
    }

    fn translate_aggregate(
        &self,
        function: AggregateFunction,
        distinct: bool,
        expr: Option<&AstExpr>,
        separator: Option<String>,
    ) -> Result<Aggregate, SparqlError> {
        if expr.is_none() && function != AggregateFunction::Count {
            return Err(SparqlError::TranslationError(
                "only COUNT may aggregate over *".to_string(),
            ));
        }
        let expr = match expr {
            Some(inner) => Some(self.walk_expression(inner, &mut None)?),
            None => None,
        };
        Ok(Aggregate {
            function,
            expr,
            distinct,
            separator,
        })
    }
}

fn contains_service(algebra: &Algebra) -> bool {
    match algebra {
        Algebra::Service { .. } => true,
        Algebra::Bgp(_) | Algebra::Values { .. } => false,
        Algebra::Join(left, right)
        | Algebra::Union(left, right)
        | Algebra::Minus(left, right) => contains_service(left) || contains_service(right),
        Algebra::LeftJoin { left, right, .. } => contains_service(left) || contains_service(right),
        Algebra::Filter(_, input)
        | Algebra::Distinct(input)
        | Algebra::Reduced(input)
        | Algebra::OrderBy(_, input)
        | Algebra::Project(_, input)
        | Algebra::Slice { input, .. }
        | Algebra::Extend { input, .. }
        | Algebra::Group { input, .. }
        | Algebra::SubQuery(input)
        | Algebra::Ask(input)
        | Algebra::Construct { input, .. } => contains_service(input),
    }
}
