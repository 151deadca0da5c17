//! Statistics core: the aggregation tree, compiled definitions, the fold
//! engine, display filtering, and the request-level service.

pub mod aggregator;
pub mod definition;
pub mod filter;
pub mod service;
pub mod tree;
