//! SIMD-optimized distance functions using the `wide` crate.
//!
//! All functions process 8 floats at a time with `f32x8` vectors and handle
//! the remainder with a scalar tail. `wide` selects the best available
//! instruction set at compile time (SSE2..AVX2, NEON, SIMD128) and falls back
//! to scalar code elsewhere.

use wide::f32x8;

/// Number of f32 elements processed per SIMD iteration.
const SIMD_WIDTH: usize = 8;

/// Convert a slice to a fixed-size array for SIMD.
/// Returns a zero array if conversion fails (cannot happen with correct loop
/// bounds).
#[inline]
fn slice_to_simd_array(slice: &[f32]) -> [f32; SIMD_WIDTH] {
    slice.try_into().unwrap_or([0.0; SIMD_WIDTH])
}

#[inline]
fn horizontal_sum(v: f32x8) -> f32 {
    let arr: [f32; 8] = v.to_array();
    arr.iter().sum()
}

/// Calculate the squared Euclidean (L2) distance between two vectors.
///
/// # Panics
///
/// Debug-panics if vectors have different lengths.
#[inline]
#[must_use]
pub fn euclidean_distance_squared(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "vectors must have same dimension");

    let len = a.len();
    let simd_len = len - (len % SIMD_WIDTH);

    let mut sum = f32x8::ZERO;

    for i in (0..simd_len).step_by(SIMD_WIDTH) {
        let va = f32x8::new(slice_to_simd_array(&a[i..i + SIMD_WIDTH]));
        let vb = f32x8::new(slice_to_simd_array(&b[i..i + SIMD_WIDTH]));
        let diff = va - vb;
        sum += diff * diff;
    }

    let mut result = horizontal_sum(sum);

    for i in simd_len..len {
        let diff = a[i] - b[i];
        result += diff * diff;
    }

    result
}

/// Calculate the dot product between two vectors.
///
/// # Panics
///
/// Debug-panics if vectors have different lengths.
#[inline]
#[must_use]
pub fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "vectors must have same dimension");

    let len = a.len();
    let simd_len = len - (len % SIMD_WIDTH);

    let mut sum = f32x8::ZERO;

    for i in (0..simd_len).step_by(SIMD_WIDTH) {
        let va = f32x8::new(slice_to_simd_array(&a[i..i + SIMD_WIDTH]));
        let vb = f32x8::new(slice_to_simd_array(&b[i..i + SIMD_WIDTH]));
        sum += va * vb;
    }

    let mut result = horizontal_sum(sum);

    for i in simd_len..len {
        result += a[i] * b[i];
    }

    result
}

/// Calculate the sum of squares (squared L2 norm) of a vector.
#[inline]
#[must_use]
pub fn sum_of_squares(v: &[f32]) -> f32 {
    let len = v.len();
    let simd_len = len - (len % SIMD_WIDTH);

    let mut sum = f32x8::ZERO;

    for i in (0..simd_len).step_by(SIMD_WIDTH) {
        let vv = f32x8::new(slice_to_simd_array(&v[i..i + SIMD_WIDTH]));
        sum += vv * vv;
    }

    let mut result = horizontal_sum(sum);

    for i in simd_len..len {
        result += v[i] * v[i];
    }

    result
}

/// Calculate the L2 norm (magnitude) of a vector.
#[inline]
#[must_use]
pub fn l2_norm(v: &[f32]) -> f32 {
    sum_of_squares(v).sqrt()
}

/// Calculate the cosine similarity between two vectors.
///
/// Returns a value in [-1, 1]; 0.0 if either vector has zero magnitude.
///
/// # Panics
///
/// Debug-panics if vectors have different lengths.
#[inline]
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "vectors must have same dimension");

    let norm_a = l2_norm(a);
    let norm_b = l2_norm(b);

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product(a, b) / (norm_a * norm_b)
}

/// Calculate the cosine distance (1 - cosine similarity) between two vectors.
///
/// # Panics
///
/// Debug-panics if vectors have different lengths.
#[inline]
#[must_use]
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    1.0 - cosine_similarity(a, b)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Plain iterator implementations are the reference; the SIMD kernels
    // must agree within floating-point reassociation tolerance.
    fn reference_l2sq(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
    }

    fn reference_dot(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
    }

    fn test_vectors(len: usize) -> (Vec<f32>, Vec<f32>) {
        let a: Vec<f32> = (0..len).map(|i| (i as f32 * 0.37).sin()).collect();
        let b: Vec<f32> = (0..len).map(|i| (i as f32 * 0.73).cos()).collect();
        (a, b)
    }

    #[test]
    fn matches_scalar_reference() {
        // Cover exact multiples of the SIMD width and ragged tails.
        for len in [1, 7, 8, 9, 16, 63, 64, 65, 1536] {
            let (a, b) = test_vectors(len);

            let simd = euclidean_distance_squared(&a, &b);
            let reference = reference_l2sq(&a, &b);
            assert!((simd - reference).abs() < 1e-3, "l2sq len={len}: {simd} vs {reference}");

            let simd = dot_product(&a, &b);
            let reference = reference_dot(&a, &b);
            assert!((simd - reference).abs() < 1e-3, "dot len={len}: {simd} vs {reference}");
        }
    }
}
