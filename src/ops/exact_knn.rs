//! Exact k-nearest-neighbor search by brute force.
//!
//! Computes distances to every provided vector and keeps the k nearest.
//! O(n * d); useful for small datasets and for validating approximate
//! results from the graph index.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::distance::DistanceMetric;
use crate::error::IndexError;
use crate::index::SearchResult;
use crate::types::Embedding;

/// Wrapper for max-heap comparison over kept results (largest distance pops
/// first). Equal distances evict the lower id, matching the graph index's
/// later-insertion tie-break so exact and approximate results compare
/// cleanly.
#[derive(Debug)]
struct MaxHeapEntry {
    external_id: u64,
    distance: f32,
}

impl PartialEq for MaxHeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.distance == other.distance && self.external_id == other.external_id
    }
}

impl Eq for MaxHeapEntry {}

impl PartialOrd for MaxHeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MaxHeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.distance.partial_cmp(&other.distance) {
            Some(Ordering::Equal) | None => other.external_id.cmp(&self.external_id),
            Some(ord) => ord,
        }
    }
}

/// Exact k-NN over an iterator of `(id, embedding)` pairs.
pub struct ExactKnn {
    results: Vec<SearchResult>,
}

impl ExactKnn {
    /// Scan `vectors` and keep the `k` nearest to `query`.
    ///
    /// # Errors
    ///
    /// `DimensionMismatch` if any vector disagrees with the query dimension.
    pub fn k_nearest<I>(
        vectors: I,
        query: &Embedding,
        metric: DistanceMetric,
        k: usize,
    ) -> Result<Self, IndexError>
    where
        I: IntoIterator<Item = (u64, Embedding)>,
    {
        let dim = query.dimension();
        let query = query.as_slice();

        let mut heap: BinaryHeap<MaxHeapEntry> =
            BinaryHeap::with_capacity(k.saturating_add(1).min(1024));

        for (external_id, embedding) in vectors {
            if embedding.dimension() != dim {
                return Err(IndexError::DimensionMismatch {
                    expected: dim,
                    actual: embedding.dimension(),
                });
            }

            let distance = metric.calculate(query, embedding.as_slice());
            let entry = MaxHeapEntry { external_id, distance };

            if heap.len() < k {
                heap.push(entry);
            } else if let Some(worst) = heap.peek() {
                if entry.cmp(worst) == Ordering::Less {
                    heap.pop();
                    heap.push(entry);
                }
            }
        }

        let mut results: Vec<SearchResult> = heap
            .into_iter()
            .map(|e| SearchResult { external_id: e.external_id, distance: e.distance })
            .collect();
        results.sort_by(|a, b| {
            match a.distance.partial_cmp(&b.distance) {
                Some(Ordering::Equal) | None => b.external_id.cmp(&a.external_id),
                Some(ord) => ord,
            }
        });

        Ok(Self { results })
    }

    /// Number of results found.
    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Whether no results were found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// The results, sorted by ascending distance.
    #[must_use]
    pub fn results(&self) -> &[SearchResult] {
        &self.results
    }

    /// Consume the operator, yielding the sorted results.
    #[must_use]
    pub fn into_results(self) -> Vec<SearchResult> {
        self.results
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn embedding(dim: usize, value: f32) -> Embedding {
        Embedding::new(vec![value; dim]).unwrap()
    }

    fn vectors(count: usize) -> Vec<(u64, Embedding)> {
        (1..=count as u64).map(|i| (i, embedding(4, i as f32))).collect()
    }

    #[test]
    fn empty_input_yields_no_results() {
        let knn = ExactKnn::k_nearest(
            Vec::new(),
            &embedding(4, 1.0),
            DistanceMetric::SquaredEuclidean,
            5,
        )
        .unwrap();
        assert!(knn.is_empty());
    }

    #[test]
    fn keeps_k_nearest_sorted() {
        let knn = ExactKnn::k_nearest(
            vectors(10),
            &embedding(4, 5.0),
            DistanceMetric::SquaredEuclidean,
            3,
        )
        .unwrap();

        let results = knn.results();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].external_id, 5);
        assert!(results[0].distance <= results[1].distance);
        assert!(results[1].distance <= results[2].distance);
    }

    #[test]
    fn k_larger_than_input_returns_everything() {
        let knn = ExactKnn::k_nearest(
            vectors(3),
            &embedding(4, 1.0),
            DistanceMetric::SquaredEuclidean,
            10,
        )
        .unwrap();
        assert_eq!(knn.len(), 3);
    }

    #[test]
    fn cosine_orders_by_angle() {
        let query = Embedding::new(vec![1.0, 0.0]).unwrap();
        let input = vec![
            (1, Embedding::new(vec![2.0, 0.0]).unwrap()),
            (2, Embedding::new(vec![0.0, 1.0]).unwrap()),
            (3, Embedding::new(vec![-1.0, 0.0]).unwrap()),
        ];

        let knn = ExactKnn::k_nearest(input, &query, DistanceMetric::Cosine, 3).unwrap();
        let results = knn.results();
        assert_eq!(results[0].external_id, 1);
        assert!(results[0].distance < 1e-6);
        assert!((results[1].distance - 1.0).abs() < 1e-6);
        assert!((results[2].distance - 2.0).abs() < 1e-6);
    }

    #[test]
    fn dot_product_negates_for_ranking() {
        let query = Embedding::new(vec![1.0, 1.0]).unwrap();
        let input = vec![
            (1, Embedding::new(vec![2.0, 2.0]).unwrap()),
            (2, Embedding::new(vec![1.0, 0.0]).unwrap()),
        ];

        let knn = ExactKnn::k_nearest(input, &query, DistanceMetric::DotProduct, 2).unwrap();
        assert_eq!(knn.results()[0].external_id, 1);
        assert!((knn.results()[0].distance - (-4.0)).abs() < 1e-6);
    }

    #[test]
    fn dimension_mismatch_is_rejected() {
        let result = ExactKnn::k_nearest(
            vec![(1, embedding(8, 1.0))],
            &embedding(4, 1.0),
            DistanceMetric::SquaredEuclidean,
            5,
        );
        assert!(matches!(result, Err(IndexError::DimensionMismatch { .. })));
    }

    #[test]
    fn equal_distances_break_toward_higher_id() {
        let input = vec![
            (9, Embedding::new(vec![1.0, 0.0]).unwrap()),
            (2, Embedding::new(vec![0.0, 1.0]).unwrap()),
        ];
        let knn = ExactKnn::k_nearest(
            input,
            &Embedding::new(vec![0.0, 0.0]).unwrap(),
            DistanceMetric::SquaredEuclidean,
            1,
        )
        .unwrap();
        assert_eq!(knn.results()[0].external_id, 9);
    }
}
