//! # Filter Compiler
//!
//! Turns an order's [`FilterSpec`](crate::models::FilterSpec) into one normalized
//! predicate that the reconciler and the exporter share without re-parsing.

pub mod compiler;
pub mod location;

pub use compiler::{CompiledFilter, FilterCompiler};
pub use location::normalize_country;
