//! The HNSW index: layered construction and query over the vector store and
//! neighbor graph.
//!
//! All operations take `&self`. Insertion serializes only where it must (the
//! arena push, one node-layer lock at a time); searches never block each
//! other and run concurrently with inserts, observing the graph mid-build as
//! a smaller but valid index.

use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::debug;

use crate::distance::DistanceMetric;
use crate::error::IndexError;
use crate::store::VectorStore;
use crate::types::Embedding;

use super::config::HnswConfig;
use super::graph::{Candidate, EntryPoint, GraphIndex};
use super::search::{search_layer, select_diverse};

/// Hard ceiling on layer assignment. With ml = 1/ln(16) the probability of
/// drawing 16 is below 1e-19, so the cap never distorts the distribution.
const MAX_LAYER: usize = 16;

/// Xorshift64 generator for layer assignment.
///
/// Layer draws are the only randomness in the index, so a fixed seed plus a
/// fixed insertion order reproduces the graph bit for bit.
struct LevelGenerator {
    state: u64,
    ml: f64,
}

impl LevelGenerator {
    fn new(seed: Option<u64>, ml: f64) -> Self {
        let seed = seed.unwrap_or_else(|| {
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map_or(0x9E37_79B9_7F4A_7C15, |d| d.as_nanos() as u64)
        });
        // Xorshift must not start at zero; every other seed maps to itself
        // so distinct seeds produce distinct sequences.
        let state = if seed == 0 { 0x9E37_79B9_7F4A_7C15 } else { seed };
        Self { state, ml }
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }

    /// Draw a layer from the exponential distribution
    /// `floor(-ln(uniform) * ml)`, capped at [`MAX_LAYER`].
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    #[allow(clippy::cast_sign_loss)]
    fn next_level(&mut self) -> usize {
        // 53 mantissa bits, shifted into (0, 1] so ln never sees zero.
        let uniform = ((self.next_u64() >> 11) + 1) as f64 / (1u64 << 53) as f64;
        let level = (-uniform.ln() * self.ml).floor() as usize;
        level.min(MAX_LAYER)
    }
}

/// One search hit: the caller's identifier and its distance to the query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchResult {
    /// The external id supplied at insertion.
    pub external_id: u64,
    /// Distance to the query under the index metric.
    pub distance: f32,
}

/// A hierarchical navigable small world index.
///
/// Create with [`HnswIndex::new`], populate with [`insert`](Self::insert),
/// query with [`search`](Self::search). Shareable across threads behind an
/// `Arc`; every operation takes `&self`.
pub struct HnswIndex {
    store: VectorStore,
    graph: GraphIndex,
    config: HnswConfig,
    level_gen: Mutex<LevelGenerator>,
}

impl HnswIndex {
    /// Create an empty index.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` if `dimension` or `max_elements` is zero, or if any
    /// config parameter is outside its legal range.
    pub fn new(
        dimension: usize,
        max_elements: usize,
        metric: DistanceMetric,
        config: HnswConfig,
    ) -> Result<Self, IndexError> {
        if dimension == 0 {
            return Err(IndexError::InvalidConfig("dimension must be at least 1".into()));
        }
        if max_elements == 0 {
            return Err(IndexError::InvalidConfig("max_elements must be at least 1".into()));
        }
        config.validate()?;

        let level_gen = Mutex::new(LevelGenerator::new(config.seed, config.ml));
        Ok(Self {
            store: VectorStore::new(dimension, metric, max_elements),
            graph: GraphIndex::new(config.m, config.m_max0),
            config,
            level_gen,
        })
    }

    /// The vector dimension this index accepts.
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.store.dimension()
    }

    /// The distance metric this index ranks by.
    #[must_use]
    pub fn metric(&self) -> DistanceMetric {
        self.store.metric()
    }

    /// The configuration the index was built with.
    #[must_use]
    pub fn config(&self) -> &HnswConfig {
        &self.config
    }

    /// Number of live (non-deleted) vectors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.store.live_count()
    }

    /// Whether the index holds no live vectors.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `external_id` maps to a live vector.
    ///
    /// # Errors
    ///
    /// `LockPoisoned` if a prior panic corrupted the id map.
    pub fn contains(&self, external_id: u64) -> Result<bool, IndexError> {
        Ok(self.store.slot_of(external_id)?.is_some())
    }

    pub(crate) fn store(&self) -> &VectorStore {
        &self.store
    }

    pub(crate) fn graph(&self) -> &GraphIndex {
        &self.graph
    }

    pub(crate) fn entry_point(&self) -> Option<EntryPoint> {
        self.graph.entry_point()
    }

    /// Insert a vector under `external_id`.
    ///
    /// An id whose previous vector was removed may be reused; a live id is
    /// rejected with `DuplicateId`.
    ///
    /// # Errors
    ///
    /// `DimensionMismatch`, `DuplicateId`, `CapacityExceeded`, or
    /// `LockPoisoned`.
    pub fn insert(&self, external_id: u64, embedding: &Embedding) -> Result<(), IndexError> {
        let slot = self.store.insert(embedding, external_id)?;
        let level = {
            let mut gen = self.level_gen.lock().map_err(|_| IndexError::LockPoisoned)?;
            gen.next_level()
        };
        self.graph.insert(slot, level)?;

        debug!(external_id, slot, level, "inserting vector");

        // First node in wins the entry point and has nothing to link to.
        if self.graph.try_set_first_entry(EntryPoint { slot, layer: level }) {
            return Ok(());
        }
        let entry = match self.graph.entry_point() {
            Some(entry) => entry,
            None => unreachable!("entry point set before first insert returns"),
        };

        let query = embedding.as_slice();

        // Greedy descent through the layers above the new node's level.
        let mut eps = vec![entry.slot];
        for layer in (level + 1..=entry.layer).rev() {
            let found = search_layer(&self.store, &self.graph, query, &eps, 1, layer)?;
            if let Some(best) = found.first() {
                eps = vec![best.slot];
            }
        }

        // Wide search on each layer the node joins, selecting its neighbors
        // top-down but deferring the edge writes.
        let top = level.min(entry.layer);
        let mut planned: Vec<(usize, Vec<Candidate>)> = Vec::with_capacity(top + 1);
        for layer in (0..=top).rev() {
            let found = search_layer(
                &self.store,
                &self.graph,
                query,
                &eps,
                self.config.ef_construction,
                layer,
            )?;
            let selected = select_diverse(&self.store, &found, self.graph.cap_at(layer))?;
            eps = found.iter().map(|c| c.slot).collect();
            if eps.is_empty() {
                eps = vec![entry.slot];
            }
            planned.push((layer, selected));
        }

        // Commit edges bottom-up so a concurrent search that sees the node at
        // some layer also finds it on every layer below.
        for (layer, selected) in planned.into_iter().rev() {
            let own: Vec<u32> = selected.iter().map(|c| c.slot).collect();
            self.graph.set_neighbors(slot, layer, own)?;

            for candidate in &selected {
                self.link_back(candidate.slot, slot, layer)?;
            }
        }

        self.graph.update_entry_point(EntryPoint { slot, layer: level });
        Ok(())
    }

    /// Add `slot` to `neighbor`'s list at `layer`, pruning with the
    /// diversity heuristic if the list overflows its cap.
    ///
    /// The whole read-modify-write runs under the neighbor's layer lock so
    /// two concurrent back-links cannot lose each other's edge.
    fn link_back(&self, neighbor: u32, slot: u32, layer: usize) -> Result<(), IndexError> {
        let node = match self.graph.node(neighbor)? {
            Some(node) => node,
            None => return Ok(()),
        };
        let lock = match node.layer_lock(layer) {
            Some(lock) => lock,
            None => return Ok(()),
        };
        let mut list = lock.write().map_err(|_| IndexError::LockPoisoned)?;

        if list.contains(&slot) {
            return Ok(());
        }

        let cap = self.graph.cap_at(layer);
        if list.len() < cap {
            list.push(slot);
            return Ok(());
        }

        // Overflow: re-select a diverse cap-sized list from the neighbor's
        // point of view, with the new edge competing on equal terms.
        let record = match self.store.record(neighbor)? {
            Some(record) => record,
            None => return Ok(()),
        };
        let mut pool: Vec<Candidate> = Vec::with_capacity(list.len() + 1);
        for &other in list.iter().chain(std::iter::once(&slot)) {
            if let Some(distance) = self.store.distance_to(record.vector(), other)? {
                pool.push(Candidate::new(other, distance));
            }
        }
        let pruned = select_diverse(&self.store, &pool, cap)?;
        *list = pruned.into_iter().map(|c| c.slot).collect();
        Ok(())
    }

    /// Find the `k` live vectors nearest to `query`.
    ///
    /// Returns up to `k` results ordered by ascending distance; fewer than
    /// `k` live vectors is not an error. `ef` overrides the configured
    /// search beam width and is raised to at least `k`.
    ///
    /// # Errors
    ///
    /// `DimensionMismatch` if `query` has the wrong dimension, or
    /// `LockPoisoned`.
    pub fn search(
        &self,
        query: &Embedding,
        k: usize,
        ef: Option<usize>,
    ) -> Result<Vec<SearchResult>, IndexError> {
        if query.dimension() != self.store.dimension() {
            return Err(IndexError::DimensionMismatch {
                expected: self.store.dimension(),
                actual: query.dimension(),
            });
        }
        if k == 0 {
            return Ok(Vec::new());
        }
        let entry = match self.graph.entry_point() {
            Some(entry) => entry,
            None => return Ok(Vec::new()),
        };

        let ef = ef.unwrap_or(self.config.ef_search).max(k);
        let query = query.as_slice();

        let mut eps = vec![entry.slot];
        for layer in (1..=entry.layer).rev() {
            let found = search_layer(&self.store, &self.graph, query, &eps, 1, layer)?;
            if let Some(best) = found.first() {
                eps = vec![best.slot];
            }
        }

        let found = search_layer(&self.store, &self.graph, query, &eps, ef, 0)?;

        let mut results = Vec::with_capacity(k.min(found.len()));
        for candidate in found.into_iter().take(k) {
            let record = self.store.get(candidate.slot)?;
            results.push(SearchResult {
                external_id: record.external_id,
                distance: candidate.distance,
            });
        }
        Ok(results)
    }

    /// Remove the vector under `external_id`.
    ///
    /// The node is tombstoned, not unlinked: its edges keep carrying
    /// traffic, it stops appearing in results, and its id becomes free for
    /// reinsertion. Returns `false` if no live vector had that id.
    ///
    /// # Errors
    ///
    /// `LockPoisoned` if a prior panic corrupted the store.
    pub fn remove(&self, external_id: u64) -> Result<bool, IndexError> {
        let slot = match self.store.slot_of(external_id)? {
            Some(slot) => slot,
            None => return Ok(false),
        };
        let removed = self.store.tombstone(slot)?;
        if removed {
            debug!(external_id, slot, "tombstoned vector");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index(dimension: usize) -> HnswIndex {
        HnswIndex::new(
            dimension,
            1024,
            DistanceMetric::SquaredEuclidean,
            HnswConfig::new(8).with_ef_construction(50).with_seed(42),
        )
        .unwrap()
    }

    fn embed(v: &[f32]) -> Embedding {
        Embedding::new(v.to_vec()).unwrap()
    }

    #[test]
    fn rejects_zero_dimension() {
        let err = HnswIndex::new(0, 16, DistanceMetric::Cosine, HnswConfig::default());
        assert!(matches!(err, Err(IndexError::InvalidConfig(_))));
    }

    #[test]
    fn level_distribution_is_mostly_zero() {
        let mut gen = LevelGenerator::new(Some(7), 1.0 / 16_f64.ln());
        let mut zeros = 0usize;
        for _ in 0..10_000 {
            let level = gen.next_level();
            assert!(level <= MAX_LAYER);
            if level == 0 {
                zeros += 1;
            }
        }
        // P(level = 0) = 1 - 16^-1 = 0.9375.
        assert!(zeros > 9_000, "got {zeros} zero levels");
    }

    #[test]
    fn adjacent_seeds_diverge() {
        // Seeds 2k and 2k+1 must not collapse to one state.
        let mut a = LevelGenerator::new(Some(6), 0.5);
        let mut b = LevelGenerator::new(Some(7), 0.5);
        assert_ne!(a.next_u64(), b.next_u64());

        // Zero is the one seed xorshift cannot use directly.
        let mut z = LevelGenerator::new(Some(0), 0.5);
        assert_ne!(z.next_u64(), 0);
    }

    #[test]
    fn layer_zero_selection_fills_the_wider_cap() {
        // 16 mutually diverse vectors: +/- each basis direction of an
        // 8-dimensional space. Every one is closer to the origin (distance 1)
        // than to any other (distance >= 2), so nothing is rejected by the
        // diversity heuristic and the origin should fill layer 0 to its
        // 2*M cap, not stop at M.
        let index = HnswIndex::new(
            8,
            64,
            DistanceMetric::SquaredEuclidean,
            HnswConfig::new(4).with_ef_construction(64).with_seed(5),
        )
        .unwrap();

        let mut id = 0u64;
        for axis in 0..8 {
            for sign in [1.0f32, -1.0] {
                let mut v = vec![0.0f32; 8];
                v[axis] = sign;
                index.insert(id, &embed(&v)).unwrap();
                id += 1;
            }
        }
        index.insert(100, &embed(&[0.0; 8])).unwrap();

        let slot = index.store().slot_of(100).unwrap().unwrap();
        let node = index.graph().node(slot).unwrap().unwrap();
        let n0 = node.neighbors(0).unwrap().len();
        assert_eq!(n0, index.graph().cap_at(0));
    }

    #[test]
    fn seeded_levels_repeat() {
        let mut a = LevelGenerator::new(Some(99), 0.5);
        let mut b = LevelGenerator::new(Some(99), 0.5);
        for _ in 0..100 {
            assert_eq!(a.next_level(), b.next_level());
        }
    }

    #[test]
    fn nearest_neighbor_among_three() {
        let index = index(4);
        index.insert(1, &embed(&[1.0, 2.0, 3.0, 4.0])).unwrap();
        index.insert(2, &embed(&[2.0, 3.0, 4.0, 5.0])).unwrap();
        index.insert(3, &embed(&[3.0, 4.0, 5.0, 6.0])).unwrap();

        let hits = index.search(&embed(&[1.5, 2.5, 3.5, 4.5]), 1, None).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].external_id, 2);
    }

    #[test]
    fn self_query_has_zero_distance() {
        let index = index(3);
        index.insert(10, &embed(&[0.5, 0.25, 0.125])).unwrap();
        let hits = index.search(&embed(&[0.5, 0.25, 0.125]), 1, None).unwrap();
        assert_eq!(hits[0].external_id, 10);
        assert_eq!(hits[0].distance, 0.0);
    }

    #[test]
    fn k_larger_than_index_returns_everything() {
        let index = index(2);
        index.insert(1, &embed(&[0.0, 0.0])).unwrap();
        index.insert(2, &embed(&[1.0, 0.0])).unwrap();

        let hits = index.search(&embed(&[0.0, 0.0]), 10, None).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].external_id, 1);
    }

    #[test]
    fn empty_index_returns_no_hits() {
        let index = index(2);
        assert!(index.search(&embed(&[0.0, 0.0]), 5, None).unwrap().is_empty());
    }

    #[test]
    fn duplicate_live_id_is_rejected() {
        let index = index(2);
        index.insert(1, &embed(&[0.0, 0.0])).unwrap();
        let err = index.insert(1, &embed(&[1.0, 1.0]));
        assert!(matches!(err, Err(IndexError::DuplicateId(1))));
    }

    #[test]
    fn dimension_mismatch_on_insert_and_search() {
        let index = index(3);
        assert!(matches!(
            index.insert(1, &embed(&[1.0, 2.0])),
            Err(IndexError::DimensionMismatch { expected: 3, actual: 2 })
        ));
        assert!(matches!(
            index.search(&embed(&[1.0, 2.0]), 1, None),
            Err(IndexError::DimensionMismatch { expected: 3, actual: 2 })
        ));
    }

    #[test]
    fn removed_vector_disappears_from_results() {
        let index = index(2);
        index.insert(1, &embed(&[0.0, 0.0])).unwrap();
        index.insert(2, &embed(&[1.0, 0.0])).unwrap();
        index.insert(3, &embed(&[2.0, 0.0])).unwrap();

        assert!(index.remove(2).unwrap());
        assert!(!index.remove(2).unwrap());
        assert!(!index.contains(2).unwrap());
        assert_eq!(index.len(), 2);

        let hits = index.search(&embed(&[1.0, 0.0]), 3, None).unwrap();
        let ids: Vec<u64> = hits.iter().map(|h| h.external_id).collect();
        assert!(!ids.contains(&2));
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn removed_id_can_be_reinserted() {
        let index = index(2);
        index.insert(1, &embed(&[0.0, 0.0])).unwrap();
        assert!(index.remove(1).unwrap());
        index.insert(1, &embed(&[5.0, 5.0])).unwrap();

        let hits = index.search(&embed(&[5.0, 5.0]), 1, None).unwrap();
        assert_eq!(hits[0].external_id, 1);
        assert_eq!(hits[0].distance, 0.0);
    }

    #[test]
    fn capacity_is_enforced() {
        let index = HnswIndex::new(
            2,
            2,
            DistanceMetric::SquaredEuclidean,
            HnswConfig::new(4).with_seed(1),
        )
        .unwrap();
        index.insert(1, &embed(&[0.0, 0.0])).unwrap();
        index.insert(2, &embed(&[1.0, 0.0])).unwrap();
        assert!(matches!(
            index.insert(3, &embed(&[2.0, 0.0])),
            Err(IndexError::CapacityExceeded { capacity: 2 })
        ));
    }

    #[test]
    fn caps_hold_after_many_inserts() {
        let index = index(2);
        for i in 0..200u64 {
            let x = (i % 20) as f32;
            let y = (i / 20) as f32;
            index.insert(i, &embed(&[x, y])).unwrap();
        }
        for slot in 0..200u32 {
            let node = index.graph().node(slot).unwrap().unwrap();
            for layer in 0..=node.max_layer() {
                let n = node.neighbors(layer).unwrap().len();
                assert!(n <= index.graph().cap_at(layer), "layer {layer} has {n} edges");
            }
        }
    }

    #[test]
    fn recall_on_a_grid() {
        let index = index(2);
        for i in 0..100u64 {
            index.insert(i, &embed(&[(i % 10) as f32, (i / 10) as f32])).unwrap();
        }
        // Exact nearest of (3.2, 7.1) is the grid point (3, 7), id 73.
        let hits = index.search(&embed(&[3.2, 7.1]), 1, Some(100)).unwrap();
        assert_eq!(hits[0].external_id, 73);
    }
}
