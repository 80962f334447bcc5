//! HNSW graph data structure.
//!
//! The graph is an arena of nodes addressed by the same dense `u32` slots the
//! vector store assigns. Neighbor lists are stored as slot indices rather
//! than references, which sidesteps ownership cycles entirely and makes
//! deletion a flag flip in the store rather than graph surgery.
//!
//! Locking is per node per layer: each neighbor list carries its own
//! `RwLock`, so concurrent inserts touching disjoint regions of the graph do
//! not serialize against each other. The entry point is one packed
//! `AtomicU64` swapped with compare-exchange.

use std::cmp::Ordering as CmpOrdering;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use crate::error::IndexError;

/// Sentinel for "no entry point".
const ENTRY_EMPTY: u64 = u64::MAX;

/// Levels are capped well below 255, so the layer fits the low byte.
#[inline]
fn pack_entry(slot: u32, layer: usize) -> u64 {
    (u64::from(slot) << 8) | (layer as u64 & 0xFF)
}

#[inline]
#[allow(clippy::cast_possible_truncation)] // reversing pack_entry
fn unpack_entry(packed: u64) -> EntryPoint {
    EntryPoint { slot: (packed >> 8) as u32, layer: (packed & 0xFF) as usize }
}

/// The traversal root: the node with the current maximum layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryPoint {
    /// Arena slot of the entry node.
    pub slot: u32,
    /// Its maximum layer.
    pub layer: usize,
}

/// A node in the HNSW graph: per-layer neighbor lists behind individual
/// locks.
#[derive(Debug)]
pub struct GraphNode {
    max_layer: usize,
    layers: Vec<RwLock<Vec<u32>>>,
}

impl GraphNode {
    fn new(max_layer: usize) -> Self {
        let layers = (0..=max_layer).map(|_| RwLock::new(Vec::new())).collect();
        Self { max_layer, layers }
    }

    /// The highest layer this node participates in.
    #[inline]
    #[must_use]
    pub fn max_layer(&self) -> usize {
        self.max_layer
    }

    /// Copy of the current neighbor list at a layer; empty if the node is
    /// absent at that layer.
    ///
    /// # Errors
    ///
    /// `LockPoisoned` if a prior panic corrupted the list.
    pub fn neighbors(&self, layer: usize) -> Result<Vec<u32>, IndexError> {
        match self.layers.get(layer) {
            Some(list) => Ok(list.read().map_err(|_| IndexError::LockPoisoned)?.clone()),
            None => Ok(Vec::new()),
        }
    }

    /// The lock guarding one layer's neighbor list. Used by the construction
    /// engine to make back-link insertion plus pruning a single critical
    /// section.
    pub(crate) fn layer_lock(&self, layer: usize) -> Option<&RwLock<Vec<u32>>> {
        self.layers.get(layer)
    }
}

/// The multi-layer neighbor graph and entry point.
pub struct GraphIndex {
    nodes: RwLock<Vec<Option<Arc<GraphNode>>>>,
    entry: AtomicU64,
    m: usize,
    m_max0: usize,
}

impl GraphIndex {
    /// Create an empty graph with the given neighbor caps.
    #[must_use]
    pub fn new(m: usize, m_max0: usize) -> Self {
        Self {
            nodes: RwLock::new(Vec::new()),
            entry: AtomicU64::new(ENTRY_EMPTY),
            m,
            m_max0,
        }
    }

    /// The neighbor cap at a layer.
    #[inline]
    #[must_use]
    pub fn cap_at(&self, layer: usize) -> usize {
        if layer == 0 {
            self.m_max0
        } else {
            self.m
        }
    }

    /// Register a node at `slot` with empty neighbor lists up to `max_layer`.
    ///
    /// Slots may arrive out of order under concurrent insertion; gaps are
    /// filled with placeholders that no edge references yet.
    ///
    /// # Errors
    ///
    /// `LockPoisoned` if a prior panic corrupted the arena.
    pub fn insert(&self, slot: u32, max_layer: usize) -> Result<(), IndexError> {
        let mut nodes = self.nodes.write().map_err(|_| IndexError::LockPoisoned)?;
        let idx = slot as usize;
        if nodes.len() <= idx {
            nodes.resize_with(idx + 1, || None);
        }
        nodes[idx] = Some(Arc::new(GraphNode::new(max_layer)));
        Ok(())
    }

    /// Fetch a node by slot.
    ///
    /// # Errors
    ///
    /// `LockPoisoned` if a prior panic corrupted the arena.
    pub fn node(&self, slot: u32) -> Result<Option<Arc<GraphNode>>, IndexError> {
        let nodes = self.nodes.read().map_err(|_| IndexError::LockPoisoned)?;
        Ok(nodes.get(slot as usize).and_then(Clone::clone))
    }

    /// Copy of a node's neighbor list at a layer; empty if the node or layer
    /// is absent.
    ///
    /// # Errors
    ///
    /// `LockPoisoned` if a prior panic corrupted the arena or the list.
    pub fn neighbors(&self, slot: u32, layer: usize) -> Result<Vec<u32>, IndexError> {
        match self.node(slot)? {
            Some(node) => node.neighbors(layer),
            None => Ok(Vec::new()),
        }
    }

    /// Atomically replace a node's neighbor list at one layer.
    ///
    /// # Panics
    ///
    /// Panics if `list` exceeds the layer cap. An oversized list is a bug in
    /// the construction engine, not a user-facing error; continuing would
    /// corrupt the graph.
    ///
    /// # Errors
    ///
    /// `LockPoisoned` if a prior panic corrupted the arena or the list.
    pub fn set_neighbors(
        &self,
        slot: u32,
        layer: usize,
        list: Vec<u32>,
    ) -> Result<(), IndexError> {
        assert!(
            list.len() <= self.cap_at(layer),
            "neighbor list overflow at layer {layer}: {} > {}",
            list.len(),
            self.cap_at(layer),
        );
        if let Some(node) = self.node(slot)? {
            if let Some(lock) = node.layer_lock(layer) {
                *lock.write().map_err(|_| IndexError::LockPoisoned)? = list;
            }
        }
        Ok(())
    }

    /// The current entry point, or `None` while the graph has no nodes.
    #[must_use]
    pub fn entry_point(&self) -> Option<EntryPoint> {
        let packed = self.entry.load(Ordering::Acquire);
        if packed == ENTRY_EMPTY {
            None
        } else {
            Some(unpack_entry(packed))
        }
    }

    /// Install `candidate` as entry point only if the graph had none.
    /// Returns `true` on success.
    pub fn try_set_first_entry(&self, candidate: EntryPoint) -> bool {
        self.entry
            .compare_exchange(
                ENTRY_EMPTY,
                pack_entry(candidate.slot, candidate.layer),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Replace the entry point if `candidate`'s layer exceeds the current
    /// entry layer (or the graph had none).
    pub fn update_entry_point(&self, candidate: EntryPoint) {
        let packed = pack_entry(candidate.slot, candidate.layer);
        let mut current = self.entry.load(Ordering::Acquire);
        loop {
            if current != ENTRY_EMPTY && unpack_entry(current).layer >= candidate.layer {
                return;
            }
            match self.entry.compare_exchange_weak(
                current,
                packed,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return,
                Err(observed) => current = observed,
            }
        }
    }

    /// Number of registered nodes.
    ///
    /// # Errors
    ///
    /// `LockPoisoned` if a prior panic corrupted the arena.
    pub fn node_count(&self) -> Result<usize, IndexError> {
        let nodes = self.nodes.read().map_err(|_| IndexError::LockPoisoned)?;
        Ok(nodes.iter().filter(|n| n.is_some()).count())
    }
}

/// A candidate during graph traversal, ordered so the `BinaryHeap` pops the
/// closest first. Equal distances break toward the higher slot (the later
/// insertion), which keeps construction deterministic for a fixed seed and
/// insertion order.
#[derive(Debug, Clone, Copy)]
pub struct Candidate {
    /// Arena slot of the candidate.
    pub slot: u32,
    /// Distance to the query.
    pub distance: f32,
}

impl Candidate {
    /// Create a new candidate.
    #[inline]
    #[must_use]
    pub const fn new(slot: u32, distance: f32) -> Self {
        Self { slot, distance }
    }
}

impl PartialEq for Candidate {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.distance == other.distance && self.slot == other.slot
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    #[inline]
    fn cmp(&self, other: &Self) -> CmpOrdering {
        // Reversed for min-heap behavior (smallest distance pops first).
        // NaN cannot arise from validated embeddings; ties fall through to
        // the slot so heap order is total and deterministic.
        match other.distance.partial_cmp(&self.distance) {
            Some(CmpOrdering::Equal) | None => self.slot.cmp(&other.slot),
            Some(ord) => ord,
        }
    }
}

/// Max-heap wrapper tracking the worst kept result. Equal distances evict
/// the lower slot first, mirroring [`Candidate`]'s tie-break.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaxCandidate(pub Candidate);

impl PartialOrd for MaxCandidate {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for MaxCandidate {
    #[inline]
    fn cmp(&self, other: &Self) -> CmpOrdering {
        match self.0.distance.partial_cmp(&other.0.distance) {
            Some(CmpOrdering::Equal) | None => other.0.slot.cmp(&self.0.slot),
            Some(ord) => ord,
        }
    }
}
