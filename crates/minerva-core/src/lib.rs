//! # Minerva Core
//!
//! RDF term and triple model shared by the triple store and the SPARQL
//! engine. Terms are immutable, equality is structural and total, and the
//! RDF 1.1 plain-literal / `xsd:string` identification is baked into the
//! `Literal` constructors.

pub mod model;

pub use model::*;
