//! # Minerva - Embedded SPARQL Engine
//!
//! Minerva answers SPARQL 1.1 SELECT / ASK / CONSTRUCT queries over an
//! in-memory RDF triple store. It is built for knowledge-base applications
//! that index small-to-medium graphs (up to roughly 10^5 triples) and need
//! predictable single-threaded latency.
//!
//! ## Quick Start
//!
//! ```rust
//! use minerva::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut store = TripleStore::new();
//!     store.add(Triple::new(
//!         Term::iri("http://example.org/t1"),
//!         Iri::new("http://example.org/label"),
//!         Term::literal("Implement SPARQL"),
//!     ));
//!
//!     let engine = QueryEngine::new(store);
//!     let result = engine.query(
//!         "SELECT ?l WHERE { ?t <http://example.org/label> ?l }",
//!     )?;
//!
//!     if let QueryResult::Select { solutions, .. } = result {
//!         assert_eq!(solutions.len(), 1);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! Minerva consists of three specialized crates:
//!
//! - **`minerva-core`**: RDF term and triple model
//! - **`minerva-store`**: indexed in-memory triple store
//! - **`minerva-sparql`**: parser, algebra, optimizer, executor and the
//!   federated SERVICE client

pub use minerva_core as core;
pub use minerva_sparql as sparql;
pub use minerva_store as store;

// Convenience re-exports for common types
pub use minerva_core::{Iri, Literal, Term, Triple, Variable};
pub use minerva_sparql::{
    QueryEngine, QueryResult, ServiceClient, ServiceConfig, Solution, SparqlError,
};
pub use minerva_store::TripleStore;

// Commonly used external dependencies
pub use anyhow;
pub use serde;
pub use serde_json;

/// Current version of Minerva
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
///
/// ```rust
/// use minerva::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        Iri, Literal, QueryEngine, QueryResult, ServiceClient, ServiceConfig, Solution,
        SparqlError, Term, Triple, TripleStore, Variable,
    };

    // Common external types
    pub use anyhow::Result;
    pub use serde::{Deserialize, Serialize};
    pub use serde_json::Value;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_constant() {
        assert!(!VERSION.is_empty());
        assert!(VERSION.chars().all(|c| c.is_ascii_digit() || c == '.'));
    }

    #[test]
    fn test_end_to_end_query() {
        let mut store = TripleStore::new();
        store.add(Triple::new(
            Term::iri("http://example.org/t1"),
            Iri::new("http://example.org/label"),
            Term::literal("hello"),
        ));
        let engine = QueryEngine::new(store);
        let result = engine
            .query("SELECT ?l WHERE { ?t <http://example.org/label> ?l }")
            .unwrap();
        match result {
            QueryResult::Select { solutions, .. } => {
                assert_eq!(solutions.len(), 1);
                assert_eq!(
                    solutions[0].get(&Variable::new("l")),
                    Some(&Term::literal("hello"))
                );
            }
            _ => panic!("expected SELECT result"),
        }
    }
}
