//! C-callable boundary over [`HnswIndex`].
//!
//! Handle-based API for host languages: `sw_index_create` hands out an
//! opaque pointer, every other call takes it back. Errors cross the boundary
//! as negative status codes, never as panics; panics are caught and reported
//! as [`SW_ERR_INTERNAL`].

use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::distance::DistanceMetric;
use crate::error::IndexError;
use crate::index::{HnswConfig, HnswIndex};
use crate::types::Embedding;

/// Success.
pub const SW_OK: i32 = 0;
/// A required pointer argument was null.
pub const SW_ERR_NULL_POINTER: i32 = -1;
/// An argument was out of range, non-finite, or of the wrong dimension.
pub const SW_ERR_INVALID_ARGUMENT: i32 = -2;
/// The external id already maps to a live vector.
pub const SW_ERR_DUPLICATE_ID: i32 = -3;
/// The index is at its configured capacity.
pub const SW_ERR_CAPACITY: i32 = -4;
/// Internal failure (poisoned lock, caught panic).
pub const SW_ERR_INTERNAL: i32 = -5;

fn status_of(err: &IndexError) -> i32 {
    match err {
        IndexError::DuplicateId(_) => SW_ERR_DUPLICATE_ID,
        IndexError::CapacityExceeded { .. } => SW_ERR_CAPACITY,
        IndexError::InvalidConfig(_)
        | IndexError::DimensionMismatch { .. }
        | IndexError::InvalidValue { .. } => SW_ERR_INVALID_ARGUMENT,
        _ => SW_ERR_INTERNAL,
    }
}

fn metric_of(code: i32) -> Option<DistanceMetric> {
    match code {
        0 => Some(DistanceMetric::SquaredEuclidean),
        1 => Some(DistanceMetric::Cosine),
        2 => Some(DistanceMetric::DotProduct),
        _ => None,
    }
}

/// Create an index.
///
/// `metric` is 0 for squared Euclidean, 1 for cosine, 2 for dot product.
/// Zero `m` or `ef_construction` selects the defaults. Returns null on any
/// invalid argument; the handle must be released with [`sw_index_destroy`].
#[no_mangle]
pub extern "C" fn sw_index_create(
    dimensions: i32,
    max_elements: i32,
    metric: i32,
    m: i32,
    ef_construction: i32,
) -> *mut HnswIndex {
    let built = catch_unwind(|| {
        let dimensions = usize::try_from(dimensions).ok().filter(|&d| d > 0)?;
        let max_elements = usize::try_from(max_elements).ok().filter(|&n| n > 0)?;
        let metric = metric_of(metric)?;
        if m < 0 || ef_construction < 0 {
            return None;
        }

        let mut config = if m == 0 { HnswConfig::default() } else { HnswConfig::new(m as usize) };
        if ef_construction > 0 {
            config = config.with_ef_construction(ef_construction as usize);
        }

        HnswIndex::new(dimensions, max_elements, metric, config).ok()
    });

    match built {
        Ok(Some(index)) => Box::into_raw(Box::new(index)),
        _ => std::ptr::null_mut(),
    }
}

/// Destroy an index created with [`sw_index_create`]. Null is a no-op.
///
/// # Safety
///
/// `handle` must be null or a pointer from [`sw_index_create`] that has not
/// already been destroyed. No other call may use the handle afterwards.
#[no_mangle]
pub unsafe extern "C" fn sw_index_destroy(handle: *mut HnswIndex) {
    if !handle.is_null() {
        drop(Box::from_raw(handle));
    }
}

/// Insert `vector` (of the index dimension) under `external_id`.
///
/// Returns [`SW_OK`] or a negative status.
///
/// # Safety
///
/// `handle` must be a live pointer from [`sw_index_create`]; `vector` must
/// point to at least the index dimension of readable `f32`s.
#[no_mangle]
pub unsafe extern "C" fn sw_index_insert(
    handle: *const HnswIndex,
    vector: *const f32,
    external_id: u64,
) -> i32 {
    if handle.is_null() || vector.is_null() {
        return SW_ERR_NULL_POINTER;
    }
    let index = &*handle;
    let data = std::slice::from_raw_parts(vector, index.dimension());

    let outcome = catch_unwind(AssertUnwindSafe(|| {
        let embedding = Embedding::new(data.to_vec())?;
        index.insert(external_id, &embedding)
    }));
    match outcome {
        Ok(Ok(())) => SW_OK,
        Ok(Err(err)) => status_of(&err),
        Err(_) => SW_ERR_INTERNAL,
    }
}

/// Search for the `k` nearest live vectors.
///
/// Writes up to `k` ids and distances into the output buffers and returns
/// the number written (possibly fewer than `k`, zero on an empty index), or
/// a negative status.
///
/// # Safety
///
/// `handle` must be a live pointer from [`sw_index_create`]; `query` must
/// point to at least the index dimension of readable `f32`s; `out_ids` and
/// `out_distances` must each have room for `k` elements.
#[no_mangle]
pub unsafe extern "C" fn sw_index_search(
    handle: *const HnswIndex,
    query: *const f32,
    k: i32,
    out_ids: *mut u64,
    out_distances: *mut f32,
) -> i32 {
    if handle.is_null() || query.is_null() || out_ids.is_null() || out_distances.is_null() {
        return SW_ERR_NULL_POINTER;
    }
    let Ok(k) = usize::try_from(k) else {
        return SW_ERR_INVALID_ARGUMENT;
    };
    let index = &*handle;
    let data = std::slice::from_raw_parts(query, index.dimension());

    let outcome = catch_unwind(AssertUnwindSafe(|| {
        let embedding = Embedding::new(data.to_vec())?;
        index.search(&embedding, k, None)
    }));
    let hits = match outcome {
        Ok(Ok(hits)) => hits,
        Ok(Err(err)) => return status_of(&err),
        Err(_) => return SW_ERR_INTERNAL,
    };

    for (i, hit) in hits.iter().enumerate() {
        *out_ids.add(i) = hit.external_id;
        *out_distances.add(i) = hit.distance;
    }
    // k is bounded by i32 on entry, so the count fits.
    hits.len() as i32
}

/// Remove the vector under `external_id`.
///
/// Returns 1 if removed, 0 if absent, or a negative status.
///
/// # Safety
///
/// `handle` must be a live pointer from [`sw_index_create`].
#[no_mangle]
pub unsafe extern "C" fn sw_index_remove(handle: *const HnswIndex, external_id: u64) -> i32 {
    if handle.is_null() {
        return SW_ERR_NULL_POINTER;
    }
    let index = &*handle;
    match catch_unwind(AssertUnwindSafe(|| index.remove(external_id))) {
        Ok(Ok(true)) => 1,
        Ok(Ok(false)) => 0,
        Ok(Err(err)) => status_of(&err),
        Err(_) => SW_ERR_INTERNAL,
    }
}

/// Number of live vectors, or a negative status on a null handle.
///
/// # Safety
///
/// `handle` must be null or a live pointer from [`sw_index_create`].
#[no_mangle]
pub unsafe extern "C" fn sw_index_len(handle: *const HnswIndex) -> i64 {
    if handle.is_null() {
        return i64::from(SW_ERR_NULL_POINTER);
    }
    (*handle).len() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_rejects_bad_arguments() {
        assert!(sw_index_create(0, 16, 0, 8, 50).is_null());
        assert!(sw_index_create(4, 0, 0, 8, 50).is_null());
        assert!(sw_index_create(4, 16, 9, 8, 50).is_null());
        assert!(sw_index_create(4, 16, 0, -1, 50).is_null());
    }

    #[test]
    fn null_handles_are_harmless() {
        unsafe {
            sw_index_destroy(std::ptr::null_mut());
            assert_eq!(sw_index_insert(std::ptr::null(), std::ptr::null(), 1), SW_ERR_NULL_POINTER);
            assert_eq!(sw_index_remove(std::ptr::null(), 1), SW_ERR_NULL_POINTER);
            assert_eq!(sw_index_len(std::ptr::null()), i64::from(SW_ERR_NULL_POINTER));
        }
    }

    #[test]
    fn insert_search_remove_through_the_boundary() {
        let handle = sw_index_create(4, 16, 0, 8, 50);
        assert!(!handle.is_null());

        unsafe {
            let a = [1.0f32, 2.0, 3.0, 4.0];
            let b = [2.0f32, 3.0, 4.0, 5.0];
            let c = [3.0f32, 4.0, 5.0, 6.0];
            assert_eq!(sw_index_insert(handle, a.as_ptr(), 1), SW_OK);
            assert_eq!(sw_index_insert(handle, b.as_ptr(), 2), SW_OK);
            assert_eq!(sw_index_insert(handle, c.as_ptr(), 3), SW_OK);
            assert_eq!(sw_index_insert(handle, b.as_ptr(), 2), SW_ERR_DUPLICATE_ID);
            assert_eq!(sw_index_len(handle), 3);

            let query = [1.5f32, 2.5, 3.5, 4.5];
            let mut ids = [0u64; 2];
            let mut distances = [0.0f32; 2];
            let found =
                sw_index_search(handle, query.as_ptr(), 2, ids.as_mut_ptr(), distances.as_mut_ptr());
            assert_eq!(found, 2);
            assert_eq!(ids[0], 2);
            assert!(distances[0] <= distances[1]);

            assert_eq!(sw_index_remove(handle, 2), 1);
            assert_eq!(sw_index_remove(handle, 2), 0);
            assert_eq!(sw_index_len(handle), 2);

            sw_index_destroy(handle);
        }
    }

    #[test]
    fn non_finite_input_is_rejected() {
        let handle = sw_index_create(2, 8, 0, 4, 50);
        unsafe {
            let bad = [f32::NAN, 1.0];
            assert_eq!(sw_index_insert(handle, bad.as_ptr(), 1), SW_ERR_INVALID_ARGUMENT);
            sw_index_destroy(handle);
        }
    }

    #[test]
    fn search_with_k_exceeding_len_reports_actual_count() {
        let handle = sw_index_create(2, 8, 0, 4, 50);
        unsafe {
            let v = [0.5f32, 0.5];
            assert_eq!(sw_index_insert(handle, v.as_ptr(), 7), SW_OK);

            let mut ids = [0u64; 5];
            let mut distances = [0.0f32; 5];
            let found =
                sw_index_search(handle, v.as_ptr(), 5, ids.as_mut_ptr(), distances.as_mut_ptr());
            assert_eq!(found, 1);
            assert_eq!(ids[0], 7);

            sw_index_destroy(handle);
        }
    }
}
