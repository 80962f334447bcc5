//! Approximate nearest-neighbor index.
//!
//! [`HnswIndex`] ties together the pieces in this module: [`config`] holds
//! the tuning parameters, [`graph`] the layered neighbor structure,
//! [`search`] the traversal primitives, and [`snapshot`] persistence.

pub mod config;
pub mod graph;
pub mod hnsw;
mod search;
pub mod snapshot;

pub use config::HnswConfig;
pub use graph::EntryPoint;
pub use hnsw::{HnswIndex, SearchResult};
pub use snapshot::{NodeSnapshot, Snapshot};
