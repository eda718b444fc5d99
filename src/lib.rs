//! prismquery - A deterministic query normalization and secondary-index
//! emulation engine
//!
//! Sits between a relational-style filter interface (arbitrary AND/OR trees,
//! negation, range and set-membership predicates) and a document store whose
//! native engine only runs conjunctions of equality/range predicates with at
//! most one inequality-bearing column per query.

pub mod compiler;
pub mod filter;
pub mod indexing;
pub mod observability;
