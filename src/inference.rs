//! Embedding inference seam.
//!
//! The index stores and searches vectors; producing them from raw input is a
//! collaborator's job. [`InferenceSession`] is the boundary: callers hand the
//! index pipeline any session that turns bytes into a fixed-width embedding.

use thiserror::Error;

/// Failure modes of an inference backend.
#[derive(Debug, Error)]
pub enum InferenceError {
    /// The session is not ready to serve (model missing, not loaded).
    #[error("inference session unavailable: {0}")]
    Unavailable(String),

    /// The input could not be embedded.
    #[error("inference failed: {0}")]
    Failed(String),

    /// The backend produced a vector of the wrong width.
    #[error("backend produced {actual} values, expected {expected}")]
    OutputMismatch {
        /// The width the caller asked for.
        expected: usize,
        /// The width the backend returned.
        actual: usize,
    },
}

/// A session that embeds raw input into a fixed-width vector.
///
/// Implementations must return exactly `output_len` values or an error;
/// callers feed the result straight into the index and rely on the width.
pub trait InferenceSession: Send + Sync {
    /// Embed `input` into a vector of `output_len` values.
    ///
    /// # Errors
    ///
    /// Any [`InferenceError`] the backend reports.
    fn run(&self, input: &[u8], output_len: usize) -> Result<Vec<f32>, InferenceError>;
}
