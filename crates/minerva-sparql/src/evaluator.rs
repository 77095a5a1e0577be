//! Lazy query execution
//!
//! Every operator produces a pull-based stream of solutions wrapping its
//! child streams; nothing runs until the consumer asks for the next mapping,
//! so LIMIT and caller aborts simply stop pulling. Per-solution expression
//! errors drop or unbind locally; infrastructure errors travel through the
//! stream as `Err` items and terminate it at the consumer.

use crate::algebra::{Aggregate, AggregateFunction, Algebra, OrderComparator};
use crate::bgp;
use crate::expression;
use crate::parser::{PatternPredicate, PatternTerm, TriplePattern};
use crate::service::{self, ServiceClient};
use crate::solution::Solution;
use crate::SparqlError;
use chrono::{DateTime, Utc};
use minerva_core::{Iri, Literal, Numeric, Term, Triple, Variable};
use minerva_store::TripleStore;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::iter::once;
use tracing::warn;

/// A lazy stream of solutions. `Err` items are infrastructure errors; the
/// consumer should stop at the first one.
pub type SolutionIter<'a> = Box<dyn Iterator<Item = Result<Solution, SparqlError>> + 'a>;

/// Result of running a query through the full pipeline.
#[derive(Debug, Clone)]
pub enum QueryResult {
    Select {
        variables: Vec<Variable>,
        solutions: Vec<Solution>,
    },
    Ask(bool),
    Construct(Vec<Triple>),
}

/// Algebra executor over a read-only store. Single-threaded and
/// cooperatively lazy; SERVICE is the only operator that performs I/O.
pub struct Executor<'a> {
    store: &'a TripleStore,
    service: Option<&'a ServiceClient>,
    /// NOW() is constant for the whole query.
    now: DateTime<Utc>,
}

impl<'a> Executor<'a> {
    pub fn new(store: &'a TripleStore) -> Self {
        Self {
            store,
            service: None,
            now: Utc::now(),
        }
    }

    pub fn with_service(store: &'a TripleStore, service: &'a ServiceClient) -> Self {
        Self {
            store,
            service: Some(service),
            now: Utc::now(),
        }
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// Evaluate an algebra tree from the singleton empty mapping.
    pub fn execute<'q>(&'q self, algebra: &'q Algebra) -> SolutionIter<'q> {
        self.execute_with(algebra, Solution::new())
    }

    /// Drain the stream into a vector, stopping at the first error.
    pub fn execute_all(&self, algebra: &Algebra) -> Result<Vec<Solution>, SparqlError> {
        self.execute(algebra).collect()
    }

    /// ASK: true iff the pattern yields at least one solution; short-circuits.
    pub fn execute_ask(&self, algebra: &Algebra) -> Result<bool, SparqlError> {
        let inner = match algebra {
            Algebra::Ask(inner) => inner.as_ref(),
            other => other,
        };
        match self.execute(inner).next() {
            None => Ok(false),
            Some(Ok(_)) => Ok(true),
            Some(Err(e)) => Err(e),
        }
    }

    /// CONSTRUCT: instantiate the template once per solution. Output triples
    /// are not deduplicated here.
    pub fn execute_construct(&self, algebra: &Algebra) -> Result<Vec<Triple>, SparqlError> {
        let (template, input) = match algebra {
            Algebra::Construct { template, input } => (template, input.as_ref()),
            _ => {
                return Err(SparqlError::ExecutionError(
                    "not a CONSTRUCT query".to_string(),
                ))
            }
        };
        let mut triples = Vec::new();
        for (index, result) in self.execute(input).enumerate() {
            let solution = result?;
            for pattern in template {
                if let Some(triple) = instantiate_template(pattern, &solution, index) {
                    triples.push(triple);
                }
            }
        }
        Ok(triples)
    }

    /// EXISTS support: does the pattern produce anything when seeded with the
    /// current solution?
    pub(crate) fn any_solution(
        &self,
        algebra: &Algebra,
        seed: &Solution,
    ) -> Result<bool, SparqlError> {
        match self.execute_with(algebra, seed.clone()).next() {
            None => Ok(false),
            Some(Ok(_)) => Ok(true),
            Some(Err(e)) => Err(e),
        }
    }

    /// Evaluate with an explicit input mapping seeding the leaves.
    pub fn execute_with<'q>(&'q self, algebra: &'q Algebra, input: Solution) -> SolutionIter<'q> {
        match algebra {
            Algebra::Bgp(patterns) => {
                bgp::evaluate_bgp(self.store, patterns, Box::new(once(Ok(input))))
            }

            Algebra::Values { variables, rows } => {
                Box::new(rows.iter().filter_map(move |row| {
                    let mut solution = Solution::new();
                    for (variable, cell) in variables.iter().zip(row) {
                        if let Some(term) = cell {
                            solution.bind(variable.clone(), term.clone());
                        }
                    }
                    input.merge(&solution).map(Ok)
                }))
            }

            Algebra::Join(left, right) => {
                // Nested loop preserving left-side order; the right side is
                // materialized once.
                let rights = match self
                    .execute_with(right, input.clone())
                    .collect::<Result<Vec<_>, _>>()
                {
                    Ok(rights) => rights,
                    Err(e) => return Box::new(once(Err(e))),
                };
                Box::new(
                    self.execute_with(left, input)
                        .flat_map(move |result| match result {
                            Err(e) => vec![Err(e)].into_iter(),
                            Ok(left_solution) => {
                                let merged: Vec<_> = rights
                                    .iter()
                                    .filter_map(|right_solution| {
                                        left_solution.merge(right_solution)
                                    })
                                    .map(Ok)
                                    .collect();
                                merged.into_iter()
                            }
                        }),
                )
            }

            Algebra::LeftJoin { left, right, expr } => {
                let rights = match self
                    .execute_with(right, input.clone())
                    .collect::<Result<Vec<_>, _>>()
                {
                    Ok(rights) => rights,
                    Err(e) => return Box::new(once(Err(e))),
                };
                let exec = self;
                Box::new(
                    self.execute_with(left, input)
                        .flat_map(move |result| match result {
                            Err(e) => vec![Err(e)].into_iter(),
                            Ok(left_solution) => {
                                let mut out = Vec::new();
                                for right_solution in &rights {
                                    if let Some(merged) = left_solution.merge(right_solution) {
                                        let keep = match expr {
                                            None => true,
                                            // A condition error is "not true".
                                            Some(condition) => expression::effective_boolean(
                                                exec, condition, &merged,
                                            )
                                            .unwrap_or(false),
                                        };
                                        if keep {
                                            out.push(Ok(merged));
                                        }
                                    }
                                }
                                if out.is_empty() {
                                    out.push(Ok(left_solution));
                                }
                                out.into_iter()
                            }
                        }),
                )
            }

            Algebra::Union(left, right) => {
                let left_stream = self.execute_with(left, input.clone());
                let right_stream = self.execute_with(right, input);
                Box::new(left_stream.chain(right_stream))
            }

            Algebra::Minus(left, right) => {
                let rights = match self
                    .execute_with(right, input.clone())
                    .collect::<Result<Vec<_>, _>>()
                {
                    Ok(rights) => rights,
                    Err(e) => return Box::new(once(Err(e))),
                };
                Box::new(self.execute_with(left, input).filter(move |result| {
                    match result {
                        Err(_) => true,
                        // Disjoint-domain MINUS removes nothing.
                        Ok(solution) => !rights.iter().any(|right_solution| {
                            solution.is_compatible(right_solution)
                                && solution.shares_binding_with(right_solution)
                        }),
                    }
                }))
            }

            Algebra::Filter(condition, inner) => {
                let exec = self;
                Box::new(self.execute_with(inner, input).filter(move |result| {
                    match result {
                        Err(_) => true,
                        // Evaluation errors drop the solution.
                        Ok(solution) => {
                            expression::effective_boolean(exec, condition, solution)
                                .unwrap_or(false)
                        }
                    }
                }))
            }

            Algebra::Extend {
                input: inner,
                variable,
                expr,
            } => {
                let exec = self;
                Box::new(self.execute_with(inner, input).map(move |result| {
                    result.map(|solution| {
                        match expression::evaluate(exec, expr, &solution) {
                            Ok(term) if !solution.is_bound(variable) => {
                                let mut extended = solution;
                                extended.bind(variable.clone(), term);
                                extended
                            }
                            // BIND error: the variable stays unbound.
                            _ => solution,
                        }
                    })
                }))
            }

            Algebra::Project(variables, inner) => {
                Box::new(self.execute_with(inner, input).map(move |result| {
                    result.map(|solution| solution.restrict(variables))
                }))
            }

            Algebra::Distinct(inner) | Algebra::Reduced(inner) => {
                let mut seen = HashSet::new();
                Box::new(self.execute_with(inner, input).filter(move |result| {
                    match result {
                        Err(_) => true,
                        Ok(solution) => seen.insert(solution.clone()),
                    }
                }))
            }

            Algebra::OrderBy(comparators, inner) => {
                let solutions = match self
                    .execute_with(inner, input)
                    .collect::<Result<Vec<_>, _>>()
                {
                    Ok(solutions) => solutions,
                    Err(e) => return Box::new(once(Err(e))),
                };
                let exec = self;
                let mut keyed: Vec<(Vec<Option<Term>>, Solution)> = solutions
                    .into_iter()
                    .map(|solution| {
                        let keys = comparators
                            .iter()
                            .map(|comparator| {
                                expression::evaluate(exec, &comparator.expr, &solution).ok()
                            })
                            .collect();
                        (keys, solution)
                    })
                    .collect();
                // Stable sort; unbound (or erroring) keys order first.
                keyed.sort_by(|a, b| compare_order_keys(comparators, &a.0, &b.0));
                Box::new(keyed.into_iter().map(|(_, solution)| Ok(solution)))
            }

            Algebra::Slice {
                input: inner,
                offset,
                limit,
            } => {
                let skipped = self
                    .execute_with(inner, input)
                    .skip(offset.unwrap_or(0) as usize);
                match limit {
                    Some(limit) => Box::new(skipped.take(*limit as usize)),
                    None => Box::new(skipped),
                }
            }

            Algebra::Group {
                input: inner,
                keys,
                aggregates,
            } => {
                let rows = match self
                    .execute_with(inner, input)
                    .collect::<Result<Vec<_>, _>>()
                {
                    Ok(rows) => rows,
                    Err(e) => return Box::new(once(Err(e))),
                };
                let mut bucket_order: Vec<Vec<Option<Term>>> = Vec::new();
                let mut buckets: HashMap<Vec<Option<Term>>, Vec<Solution>> = HashMap::new();
                for row in rows {
                    let key: Vec<Option<Term>> =
                        keys.iter().map(|k| row.get(k).cloned()).collect();
                    if !buckets.contains_key(&key) {
                        bucket_order.push(key.clone());
                    }
                    buckets.entry(key).or_default().push(row);
                }
                // Aggregates over an empty key-less input still yield one row
                // (COUNT = 0).
                if buckets.is_empty() && keys.is_empty() && !aggregates.is_empty() {
                    bucket_order.push(Vec::new());
                    buckets.insert(Vec::new(), Vec::new());
                }
                let mut output = Vec::new();
                for key in bucket_order {
                    let rows = &buckets[&key];
                    let mut solution = Solution::new();
                    for (variable, value) in keys.iter().zip(&key) {
                        if let Some(term) = value {
                            solution.bind(variable.clone(), term.clone());
                        }
                    }
                    for (variable, aggregate) in aggregates {
                        if let Some(term) = self.fold_aggregate(aggregate, rows) {
                            solution.bind(variable.clone(), term);
                        }
                    }
                    output.push(Ok(solution));
                }
                Box::new(output.into_iter())
            }

            Algebra::SubQuery(inner) => {
                // A subquery evaluates bottom-up over its own scope and joins
                // with the outer mapping on its projected variables.
                let results = self.execute_with(inner, Solution::new());
                Box::new(results.filter_map(move |result| match result {
                    Err(e) => Some(Err(e)),
                    Ok(solution) => input.merge(&solution).map(Ok),
                }))
            }

            Algebra::Service {
                endpoint,
                pattern,
                silent,
            } => match self.evaluate_service(endpoint, pattern, *silent) {
                Ok(solutions) => Box::new(
                    solutions
                        .into_iter()
                        .filter_map(move |solution| input.merge(&solution).map(Ok)),
                ),
                Err(e) => Box::new(once(Err(e))),
            },

            Algebra::Ask(_) | Algebra::Construct { .. } => Box::new(once(Err(
                SparqlError::ExecutionError("query root evaluated as a pattern".to_string()),
            ))),
        }
    }

    fn evaluate_service(
        &self,
        endpoint: &Iri,
        pattern: &Algebra,
        silent: bool,
    ) -> Result<Vec<Solution>, SparqlError> {
        match self.try_service(endpoint, pattern) {
            Ok(solutions) => Ok(solutions),
            Err(error) if silent => {
                warn!(endpoint = endpoint.as_str(), error = %error, "SILENT SERVICE failure suppressed");
                Ok(Vec::new())
            }
            Err(error) => Err(error),
        }
    }

    fn try_service(&self, endpoint: &Iri, pattern: &Algebra) -> Result<Vec<Solution>, SparqlError> {
        let client = self.service.ok_or_else(|| {
            SparqlError::ServiceError("no SERVICE client configured".to_string())
        })?;
        let query = service::serialize_service_query(pattern)?;
        client.fetch_bindings(endpoint.as_str(), &query)
    }

    /// Fold one aggregate over a bucket. `None` leaves the output variable
    /// unbound (MIN/MAX/SAMPLE of nothing). Rows whose argument errors or is
    /// unbound are skipped.
    fn fold_aggregate(&self, aggregate: &Aggregate, rows: &[Solution]) -> Option<Term> {
        let values: Vec<Term> = match &aggregate.expr {
            Some(expr) => {
                let mut values: Vec<Term> = rows
                    .iter()
                    .filter_map(|row| expression::evaluate(self, expr, row).ok())
                    .collect();
                if aggregate.distinct {
                    let mut seen = HashSet::new();
                    values.retain(|value| seen.insert(value.clone()));
                }
                values
            }
            None => Vec::new(),
        };

        match aggregate.function {
            AggregateFunction::Count => {
                let count = match &aggregate.expr {
                    Some(_) => values.len(),
                    None if aggregate.distinct => {
                        rows.iter().collect::<HashSet<_>>().len()
                    }
                    None => rows.len(),
                };
                Some(Term::Literal(Literal::integer(count as i64)))
            }
            AggregateFunction::Sum => {
                let total = sum_numeric(&values)?;
                Some(Term::Literal(expression::numeric_literal(total)))
            }
            AggregateFunction::Avg => {
                let numbers: Vec<Numeric> = values
                    .iter()
                    .filter_map(|value| value.as_literal().and_then(|lit| lit.numeric_value()))
                    .collect();
                if numbers.is_empty() {
                    return Some(Term::Literal(Literal::integer(0)));
                }
                let total = sum_numeric(&values)?;
                let mean = total.as_f64() / numbers.len() as f64;
                let literal = match total {
                    Numeric::Double(_) => Literal::double(mean),
                    _ => Literal::decimal(mean),
                };
                Some(Term::Literal(literal))
            }
            AggregateFunction::Min => values.into_iter().reduce(|best, candidate| {
                if candidate.sparql_cmp(&best) == Ordering::Less {
                    candidate
                } else {
                    best
                }
            }),
            AggregateFunction::Max => values.into_iter().reduce(|best, candidate| {
                if candidate.sparql_cmp(&best) == Ordering::Greater {
                    candidate
                } else {
                    best
                }
            }),
            AggregateFunction::GroupConcat => {
                let separator = aggregate.separator.as_deref().unwrap_or(" ");
                let joined = values
                    .iter()
                    .map(expression::string_form)
                    .collect::<Vec<_>>()
                    .join(separator);
                Some(Term::Literal(Literal::simple(joined)))
            }
            AggregateFunction::Sample => values.into_iter().next(),
        }
    }
}

/// Sum with XPath numeric promotion; the empty sum is integer 0. Non-numeric
/// values are skipped, overflow gives up on the aggregate.
fn sum_numeric(values: &[Term]) -> Option<Numeric> {
    let mut total = Numeric::Integer(0);
    for value in values {
        if let Some(number) = value.as_literal().and_then(|lit| lit.numeric_value()) {
            total = expression::add_numerics(total, number).ok()?;
        }
    }
    Some(total)
}

fn compare_order_keys(
    comparators: &[OrderComparator],
    a: &[Option<Term>],
    b: &[Option<Term>],
) -> Ordering {
    for (index, comparator) in comparators.iter().enumerate() {
        let ordering = match (&a[index], &b[index]) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(x), Some(y)) => x.sparql_cmp(y),
        };
        let ordering = if comparator.descending {
            ordering.reverse()
        } else {
            ordering
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

fn instantiate_template(
    pattern: &TriplePattern,
    solution: &Solution,
    index: usize,
) -> Option<Triple> {
    let subject = instantiate_term(&pattern.subject, solution, index)?;
    if subject.is_literal() {
        return None;
    }
    let predicate = match &pattern.predicate {
        PatternPredicate::Iri(iri) => iri.clone(),
        PatternPredicate::Variable(var) => match solution.get(var)? {
            Term::Iri(iri) => iri.clone(),
            _ => return None,
        },
        PatternPredicate::Path(_) => return None,
    };
    let object = instantiate_term(&pattern.object, solution, index)?;
    Some(Triple::new(subject, predicate, object))
}

/// Template blank nodes mint a fresh blank node per solution.
fn instantiate_term(term: &PatternTerm, solution: &Solution, index: usize) -> Option<Term> {
    match term {
        PatternTerm::Term(Term::BlankNode(label)) => {
            Some(Term::BlankNode(format!("{}_{}", label, index)))
        }
        PatternTerm::Term(ground) => Some(ground.clone()),
        PatternTerm::Variable(var) => solution.get(var).cloned(),
    }
}
