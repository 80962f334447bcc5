//! Core vector type.

use std::ops::Deref;

use crate::error::IndexError;

/// A dense vector embedding with dimension validation.
///
/// Embeddings are fixed-dimension vectors of f32 values stored contiguously
/// for SIMD-friendly memory layout. Construction rejects empty vectors and
/// non-finite values, so downstream distance code never sees a NaN.
///
/// # Example
///
/// ```
/// use smallworld::types::Embedding;
///
/// let embedding = Embedding::new(vec![1.0, 2.0, 3.0]).unwrap();
/// assert_eq!(embedding.dimension(), 3);
/// assert_eq!(embedding.as_slice(), &[1.0, 2.0, 3.0]);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding {
    data: Vec<f32>,
}

impl Embedding {
    /// Create a new embedding from a vector of f32 values.
    ///
    /// # Errors
    ///
    /// Returns an error if the vector is empty or contains NaN/Infinite
    /// values.
    pub fn new(data: Vec<f32>) -> Result<Self, IndexError> {
        if data.is_empty() {
            return Err(IndexError::InvalidConfig("embedding must not be empty".into()));
        }

        for (i, &value) in data.iter().enumerate() {
            if !value.is_finite() {
                return Err(IndexError::InvalidValue {
                    index: i,
                    value,
                    reason: if value.is_nan() {
                        "NaN values are not allowed"
                    } else {
                        "Infinite values are not allowed"
                    },
                });
            }
        }

        Ok(Self { data })
    }

    /// Create a zero-filled embedding of the given dimension.
    ///
    /// # Errors
    ///
    /// Returns an error if `dimension` is 0.
    pub fn zeros(dimension: usize) -> Result<Self, IndexError> {
        if dimension == 0 {
            return Err(IndexError::InvalidConfig("embedding must not be empty".into()));
        }
        Ok(Self { data: vec![0.0; dimension] })
    }

    /// Get the dimension of the embedding.
    #[inline]
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.data.len()
    }

    /// Get the embedding data as a slice.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Consume the embedding and return the underlying vector.
    #[inline]
    #[must_use]
    pub fn into_vec(self) -> Vec<f32> {
        self.data
    }
}

impl Deref for Embedding {
    type Target = [f32];

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.data
    }
}

impl TryFrom<Vec<f32>> for Embedding {
    type Error = IndexError;

    fn try_from(data: Vec<f32>) -> Result<Self, Self::Error> {
        Self::new(data)
    }
}
