//! Query engine facade
//!
//! Ties the pipeline together for callers that hold a populated store and
//! want to run query strings: parse -> translate -> optimize -> execute.

use crate::algebra::{visible_variables, Algebra, DefaultPlanBuilder, PlanBuilder};
use crate::evaluator::{Executor, QueryResult};
use crate::optimizer::{DefaultOptimizer, Optimizer};
use crate::parser::SparqlParser;
use crate::service::ServiceClient;
use crate::SparqlError;
use minerva_core::Variable;
use minerva_store::TripleStore;
use tracing::debug;

/// An embedded SPARQL engine over an owned triple store. The indexer mutates
/// the store between queries through [`QueryEngine::store_mut`]; evaluation
/// itself is read-only.
pub struct QueryEngine {
    store: TripleStore,
    service: Option<ServiceClient>,
    optimizer: DefaultOptimizer,
}

impl QueryEngine {
    pub fn new(store: TripleStore) -> Self {
        Self {
            store,
            service: None,
            optimizer: DefaultOptimizer::default(),
        }
    }

    pub fn with_service(store: TripleStore, service: ServiceClient) -> Self {
        Self {
            store,
            service: Some(service),
            optimizer: DefaultOptimizer::default(),
        }
    }

    pub fn store(&self) -> &TripleStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut TripleStore {
        &mut self.store
    }

    /// Run a query string through the full pipeline.
    pub fn query(&self, text: &str) -> Result<QueryResult, SparqlError> {
        let parsed = SparqlParser::parse(text)?;
        let algebra = DefaultPlanBuilder.to_algebra(&parsed)?;
        let optimized = self.optimizer.optimize(algebra);
        debug!(query = text, "executing");

        let executor = match &self.service {
            Some(service) => Executor::with_service(&self.store, service),
            None => Executor::new(&self.store),
        };

        match &optimized {
            Algebra::Ask(_) => Ok(QueryResult::Ask(executor.execute_ask(&optimized)?)),
            Algebra::Construct { .. } => Ok(QueryResult::Construct(
                executor.execute_construct(&optimized)?,
            )),
            _ => {
                let variables: Vec<Variable> =
                    visible_variables(&optimized).into_iter().collect();
                let solutions = executor.execute_all(&optimized)?;
                Ok(QueryResult::Select {
                    variables,
                    solutions,
                })
            }
        }
    }
}
