//! Search operators outside the graph index.

mod exact_knn;

pub use exact_knn::ExactKnn;
