//! # Minerva SPARQL
//!
//! SPARQL 1.1 query engine over a [`minerva_store::TripleStore`]:
//! - surface parsing (Parser)
//! - algebra translation (PlanBuilder)
//! - rule-based optimization (Optimizer)
//! - lazy, pull-based execution (Executor)
//! - federated SERVICE evaluation (ServiceClient)
//!
//! The pipeline is `parse -> to_algebra -> optimize -> execute`; the
//! [`QueryEngine`] facade ties it together for callers that just want to run
//! a query string.

pub mod algebra;
pub mod bgp;
pub mod engine;
pub mod evaluator;
pub mod expression;
pub mod optimizer;
pub mod parser;
pub mod service;
pub mod solution;

// Re-exports
pub use algebra::{Aggregate, AggregateFunction, Algebra, Expr, OrderComparator, PlanBuilder};
pub use engine::QueryEngine;
pub use evaluator::{Executor, QueryResult, SolutionIter};
pub use optimizer::{DefaultOptimizer, OptimizationRule, Optimizer};
pub use parser::{GraphPattern, PropertyPath, Query, QueryForm, SparqlParser, TriplePattern};
pub use service::{ServiceClient, ServiceConfig};
pub use solution::Solution;

// Error types
use thiserror::Error;

/// Engine-level errors. Per-solution evaluation errors never appear here:
/// they drop the offending solution inside the executor, per SPARQL
/// filter/bind semantics.
#[derive(Error, Debug)]
pub enum SparqlError {
    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Translation error: {0}")]
    TranslationError(String),

    #[error("Execution error: {0}")]
    ExecutionError(String),

    #[error("Service error: {0}")]
    ServiceError(String),

    #[error("Unsupported feature: {0}")]
    UnsupportedFeature(String),
}
