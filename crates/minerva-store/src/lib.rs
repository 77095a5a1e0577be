//! # Minerva Store
//!
//! Indexed in-memory triple store. The knowledge-base indexer populates it
//! between query runs; the SPARQL engine only ever reads it through
//! [`TripleStore::find_triples`].

pub mod store;

pub use store::TripleStore;
