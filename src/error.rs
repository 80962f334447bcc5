//! Error types for the index.

use thiserror::Error;

use crate::distance::DistanceMetric;

/// Errors that can occur in index operations.
///
/// Configuration errors are fatal at creation time. Input errors are returned
/// at the call boundary and the caller decides whether to retry or skip.
/// Invariant violations (a neighbor list over its cap, an entry point naming a
/// missing node) are bugs, not user errors; the construction path asserts on
/// them instead of returning a variant.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Rejected configuration at index creation.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// Dimension mismatch between a vector and the index.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// The dimension the index was created with.
        expected: usize,
        /// The dimension of the offending vector.
        actual: usize,
    },

    /// Invalid value in a vector (NaN, Infinity).
    #[error("invalid value at index {index}: {value} - {reason}")]
    InvalidValue {
        /// The position of the invalid value.
        index: usize,
        /// The invalid value.
        value: f32,
        /// Why the value is rejected.
        reason: &'static str,
    },

    /// The external id already maps to a live vector.
    #[error("duplicate external id: {0}")]
    DuplicateId(u64),

    /// No live vector at the given internal slot.
    #[error("no live vector at slot {0}")]
    NotFound(u32),

    /// The index has reached its configured element capacity.
    #[error("index capacity of {capacity} elements exceeded")]
    CapacityExceeded {
        /// The configured `max_elements`.
        capacity: usize,
    },

    /// A snapshot or caller-supplied metric disagrees with the index metric.
    #[error("distance metric mismatch: expected {expected:?}, got {actual:?}")]
    ConfigMismatch {
        /// The metric the index was created with.
        expected: DistanceMetric,
        /// The metric supplied by the caller or snapshot.
        actual: DistanceMetric,
    },

    /// A snapshot failed internal consistency checks.
    #[error("invalid graph state: {0}")]
    InvalidGraphState(String),

    /// Lock poisoned - indicates a prior panic in another thread corrupted
    /// the index. Unrecoverable; the index must be dropped and rebuilt.
    #[error("index corrupted: lock poisoned due to prior panic in another thread")]
    LockPoisoned,

    /// Snapshot serialization or deserialization failure.
    #[error("snapshot error: {0}")]
    Snapshot(#[from] serde_json::Error),

    /// I/O failure while reading or writing a snapshot.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
