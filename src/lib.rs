//! Bounded exploration queries over a precomputed code property graph.
//!
//! The graph (functions, types, variables and the call, data-flow and
//! parameter edges between them) is produced by an upstream extractor and
//! stored in SQLite. This crate answers call-graph traversals, data-flow
//! slices, reverse-call impact queries and named catalog queries over it,
//! as a library, an HTTP service and a CLI.

pub mod api;
pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod graph;
pub mod observability;
pub mod types;
