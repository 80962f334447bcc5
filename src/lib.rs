//! `smallworld`
//!
//! An in-memory approximate nearest-neighbor index built on a hierarchical
//! navigable small world (HNSW) graph.
//!
//! # Overview
//!
//! This crate provides:
//!
//! - **Vector storage**: fixed-dimension embeddings in a slot arena with
//!   tombstone deletion
//! - **Graph search**: layered HNSW construction and query, concurrent
//!   through `&self`
//! - **Distance functions**: squared Euclidean, cosine, and dot product,
//!   SIMD-accelerated by default
//! - **Persistence**: JSON snapshots that rebuild an equivalent index
//! - **A C ABI**: a handle-based [`ffi`] surface for host languages
//!
//! # Example
//!
//! ```
//! use smallworld::{DistanceMetric, Embedding, HnswConfig, HnswIndex};
//!
//! # fn main() -> Result<(), smallworld::IndexError> {
//! let index = HnswIndex::new(4, 1000, DistanceMetric::SquaredEuclidean, HnswConfig::new(16))?;
//!
//! index.insert(1, &Embedding::new(vec![1.0, 2.0, 3.0, 4.0])?)?;
//! index.insert(2, &Embedding::new(vec![2.0, 3.0, 4.0, 5.0])?)?;
//!
//! let query = Embedding::new(vec![1.5, 2.5, 3.5, 4.5])?;
//! let hits = index.search(&query, 1, None)?;
//! assert_eq!(hits[0].external_id, 2);
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - [`index`] - The HNSW index ([`HnswIndex`]), configuration, snapshots
//! - [`store`] - Vector storage ([`VectorStore`])
//! - [`types`] - Core types ([`Embedding`])
//! - [`distance`] - Distance functions
//! - [`ops`] - Brute-force search ([`ExactKnn`]) for small sets or validation
//! - [`inference`] - Embedding-producer trait boundary
//! - [`vault`] - At-rest encryption trait boundary
//! - [`ffi`] - C-callable handle API
//! - [`error`] - Error types

pub mod distance;
pub mod error;
pub mod ffi;
pub mod index;
pub mod inference;
pub mod ops;
pub mod store;
pub mod types;
pub mod vault;

// Re-export commonly used types
pub use distance::DistanceMetric;
pub use error::IndexError;
pub use index::{HnswConfig, HnswIndex, SearchResult, Snapshot};
pub use inference::{InferenceError, InferenceSession};
pub use ops::ExactKnn;
pub use store::VectorStore;
pub use types::Embedding;
pub use vault::{Vault, VaultError};
