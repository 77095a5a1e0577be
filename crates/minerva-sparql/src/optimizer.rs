//! SPARQL query optimization
//!
//! Two pure rewrite passes over the algebra, applied in order: filter
//! push-down, then cost-driven join reordering. Both preserve query
//! semantics for every input, so optimization is total and never fails.

use crate::algebra::{expression_variables, visible_variables, Algebra};
use crate::parser::{PatternPredicate, PatternTerm};
use std::collections::BTreeSet;
use tracing::debug;

/// Optimization rules, applied in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizationRule {
    /// Move filters toward the join side that binds all their variables.
    FilterPushDown,
    /// Swap join operands so the cheaper side drives the nested loop.
    JoinReordering,
}

/// Optimizer trait.
pub trait Optimizer {
    fn optimize(&self, algebra: Algebra) -> Algebra;
}

/// Default rule-based optimizer.
pub struct DefaultOptimizer {
    rules: Vec<OptimizationRule>,
}

impl Default for DefaultOptimizer {
    fn default() -> Self {
        Self {
            rules: vec![
                OptimizationRule::FilterPushDown,
                OptimizationRule::JoinReordering,
            ],
        }
    }
}

impl DefaultOptimizer {
    pub fn new(rules: Vec<OptimizationRule>) -> Self {
        Self { rules }
    }
}

impl Optimizer for DefaultOptimizer {
    fn optimize(&self, algebra: Algebra) -> Algebra {
        let mut optimized = algebra;
        for rule in &self.rules {
            optimized = match rule {
                OptimizationRule::FilterPushDown => push_down_filters(optimized),
                OptimizationRule::JoinReordering => reorder_joins(optimized),
            };
        }
        debug!(cost = estimate_cost(&optimized), "optimized algebra");
        optimized
    }
}

/// Heuristic cost model. No I/O: a BGP costs 100 per triple pattern plus a
/// penalty per variable position, predicate variables being the worst case
/// for an SPO-indexed store.
pub fn estimate_cost(algebra: &Algebra) -> f64 {
    match algebra {
        Algebra::Bgp(triples) => triples
            .iter()
            .map(|triple| {
                let mut cost = 100.0;
                if matches!(triple.subject, PatternTerm::Variable(_)) {
                    cost += 10.0;
                }
                if matches!(triple.predicate, PatternPredicate::Variable(_)) {
                    cost += 20.0;
                }
                if matches!(triple.object, PatternTerm::Variable(_)) {
                    cost += 10.0;
                }
                cost
            })
            .sum(),
        Algebra::Filter(_, input) => 0.3 * estimate_cost(input),
        Algebra::Join(left, right) => estimate_cost(left) * estimate_cost(right),
        Algebra::LeftJoin { left, right, .. } => {
            estimate_cost(left) + 0.5 * estimate_cost(right)
        }
        Algebra::Union(left, right) => estimate_cost(left) + estimate_cost(right),
        Algebra::Minus(left, right) => estimate_cost(left) + estimate_cost(right),
        Algebra::Values { .. } => 100.0,
        Algebra::Project(_, input)
        | Algebra::Distinct(input)
        | Algebra::Reduced(input)
        | Algebra::OrderBy(_, input)
        | Algebra::Slice { input, .. }
        | Algebra::Extend { input, .. }
        | Algebra::Group { input, .. }
        | Algebra::SubQuery(input)
        | Algebra::Ask(input)
        | Algebra::Construct { input, .. } => estimate_cost(input),
        Algebra::Service { pattern, .. } => estimate_cost(pattern),
    }
}

/// Filter push-down. A filter above a join moves into the side that binds
/// all of its variables (when the other side binds none of them exclusively);
/// above a union it is duplicated into both branches; above a left join it
/// may move into the left side only when its variables are disjoint from the
/// right side. Everything else is traversed structurally.
fn push_down_filters(algebra: Algebra) -> Algebra {
    match algebra {
        Algebra::Filter(expr, input) => {
            let input = push_down_filters(*input);
            let mut free = BTreeSet::new();
            expression_variables(&expr, &mut free);
            match input {
                Algebra::Join(left, right) => {
                    let left_vars = visible_variables(&left);
                    let right_vars = visible_variables(&right);
                    let all_in_left = free.iter().all(|var| left_vars.contains(var));
                    let all_in_right = free.iter().all(|var| right_vars.contains(var));
                    if all_in_left && !all_in_right {
                        Algebra::Join(
                            Box::new(push_down_filters(Algebra::Filter(expr, left))),
                            right,
                        )
                    } else if all_in_right && !all_in_left {
                        Algebra::Join(
                            left,
                            Box::new(push_down_filters(Algebra::Filter(expr, right))),
                        )
                    } else {
                        Algebra::Filter(expr, Box::new(Algebra::Join(left, right)))
                    }
                }
                Algebra::Union(left, right) => Algebra::Union(
                    Box::new(push_down_filters(Algebra::Filter(expr.clone(), left))),
                    Box::new(push_down_filters(Algebra::Filter(expr, right))),
                ),
                Algebra::LeftJoin {
                    left,
                    right,
                    expr: join_expr,
                } => {
                    let right_vars = visible_variables(&right);
                    if free.iter().all(|var| !right_vars.contains(var)) {
                        Algebra::LeftJoin {
                            left: Box::new(push_down_filters(Algebra::Filter(expr, left))),
                            right,
                            expr: join_expr,
                        }
                    } else {
                        Algebra::Filter(
                            expr,
                            Box::new(Algebra::LeftJoin {
                                left,
                                right,
                                expr: join_expr,
                            }),
                        )
                    }
                }
                other => Algebra::Filter(expr, Box::new(other)),
            }
        }
        other => map_children(other, push_down_filters),
    }
}

/// Join reordering: swap operands when the right side is estimated cheaper.
/// Not applied under left joins (operand order is semantic there) or across
/// unions.
fn reorder_joins(algebra: Algebra) -> Algebra {
    match algebra {
        Algebra::Join(left, right) => {
            let left = reorder_joins(*left);
            let right = reorder_joins(*right);
            if estimate_cost(&right) < estimate_cost(&left) {
                Algebra::Join(Box::new(right), Box::new(left))
            } else {
                Algebra::Join(Box::new(left), Box::new(right))
            }
        }
        Algebra::LeftJoin { .. } | Algebra::Union(..) => algebra,
        other => map_children(other, reorder_joins),
    }
}

/// Rebuild a node with `f` applied to each direct child.
fn map_children(algebra: Algebra, f: fn(Algebra) -> Algebra) -> Algebra {
    match algebra {
        Algebra::Bgp(_) | Algebra::Values { .. } => algebra,
        Algebra::Join(left, right) => Algebra::Join(Box::new(f(*left)), Box::new(f(*right))),
        Algebra::LeftJoin { left, right, expr } => Algebra::LeftJoin {
            left: Box::new(f(*left)),
            right: Box::new(f(*right)),
            expr,
        },
        Algebra::Union(left, right) => Algebra::Union(Box::new(f(*left)), Box::new(f(*right))),
        Algebra::Minus(left, right) => Algebra::Minus(Box::new(f(*left)), Box::new(f(*right))),
        Algebra::Filter(expr, input) => Algebra::Filter(expr, Box::new(f(*input))),
        Algebra::Extend {
            input,
            variable,
            expr,
        } => Algebra::Extend {
            input: Box::new(f(*input)),
            variable,
            expr,
        },
        Algebra::Project(vars, input) => Algebra::Project(vars, Box::new(f(*input))),
        Algebra::Distinct(input) => Algebra::Distinct(Box::new(f(*input))),
        Algebra::Reduced(input) => Algebra::Reduced(Box::new(f(*input))),
        Algebra::OrderBy(comparators, input) => {
            Algebra::OrderBy(comparators, Box::new(f(*input)))
        }
        Algebra::Slice {
            input,
            offset,
            limit,
        } => Algebra::Slice {
            input: Box::new(f(*input)),
            offset,
            limit,
        },
        Algebra::Group {
            input,
            keys,
            aggregates,
        } => Algebra::Group {
            input: Box::new(f(*input)),
            keys,
            aggregates,
        },
        Algebra::SubQuery(input) => Algebra::SubQuery(Box::new(f(*input))),
        Algebra::Service {
            endpoint,
            pattern,
            silent,
        } => Algebra::Service {
            endpoint,
            pattern: Box::new(f(*pattern)),
            silent,
        },
        Algebra::Ask(input) => Algebra::Ask(Box::new(f(*input))),
        Algebra::Construct { template, input } => Algebra::Construct {
            template,
            input: Box::new(f(*input)),
        },
    }
}
