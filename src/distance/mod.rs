//! Distance functions for vector similarity.
//!
//! This module provides both SIMD-optimized and scalar implementations of the
//! distance kernels used by the index.
//!
//! # SIMD
//!
//! By default the `wide` crate is used for portable SIMD that works across
//! x86 (SSE2..AVX2), ARM NEON and WebAssembly SIMD128, processing 8 floats at
//! a time with a scalar tail. Enabling the `scalar` feature forces the plain
//! implementations, which is useful for debugging and for platforms where
//! `wide` degenerates to scalar anyway.

#[cfg(not(feature = "scalar"))]
mod simd;

#[cfg(feature = "scalar")]
mod scalar;

#[cfg(not(feature = "scalar"))]
pub use simd::{
    cosine_distance, cosine_similarity, dot_product, euclidean_distance_squared, l2_norm,
    sum_of_squares,
};

#[cfg(feature = "scalar")]
pub use scalar::{
    cosine_distance, cosine_similarity, dot_product, euclidean_distance_squared, l2_norm,
    sum_of_squares,
};

/// Distance metric for comparing vectors.
///
/// The metric is fixed when an index is created; every component of the index
/// computes distances through [`DistanceMetric::calculate`] so a single index
/// can never mix metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum DistanceMetric {
    /// Squared Euclidean (L2) distance. The square root is skipped since only
    /// relative ordering matters for nearest-neighbor search.
    SquaredEuclidean,
    /// Cosine distance (1 - cosine similarity).
    Cosine,
    /// Dot product, negated so smaller is more similar.
    DotProduct,
}

impl DistanceMetric {
    /// Calculate the distance between two vectors using this metric.
    ///
    /// Deterministic and symmetric for all three metrics.
    #[inline]
    #[must_use]
    pub fn calculate(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Self::SquaredEuclidean => euclidean_distance_squared(a, b),
            Self::Cosine => cosine_distance(a, b),
            Self::DotProduct => -dot_product(a, b),
        }
    }
}
