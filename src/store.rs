//! Append-only vector storage with tombstone deletion.
//!
//! The store owns the raw vector data and the external-id mapping. Vectors
//! live in a dense arena addressed by `u32` slot; a slot is assigned once at
//! insertion and never reused while the index lives. Deletion flips an atomic
//! tombstone flag instead of removing the record, so a concurrent search can
//! never dereference a freed vector: records are handed out as `Arc`s and the
//! arena only ever grows.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use crate::distance::DistanceMetric;
use crate::error::IndexError;
use crate::types::Embedding;

/// One stored vector with its external identity and tombstone flag.
#[derive(Debug)]
pub struct VectorRecord {
    /// The caller-supplied identifier.
    pub external_id: u64,
    data: Box<[f32]>,
    deleted: AtomicBool,
}

impl VectorRecord {
    fn new(external_id: u64, data: Vec<f32>) -> Self {
        Self { external_id, data: data.into_boxed_slice(), deleted: AtomicBool::new(false) }
    }

    /// The stored vector data.
    #[inline]
    #[must_use]
    pub fn vector(&self) -> &[f32] {
        &self.data
    }

    /// Whether this record has been tombstoned.
    #[inline]
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.deleted.load(Ordering::Acquire)
    }
}

/// Append-only arena of vectors with external-id lookup.
pub struct VectorStore {
    dimension: usize,
    metric: DistanceMetric,
    capacity: usize,
    slots: RwLock<Vec<Arc<VectorRecord>>>,
    ids: RwLock<HashMap<u64, u32>>,
    live: AtomicUsize,
}

impl VectorStore {
    /// Create an empty store for vectors of the given dimension.
    #[must_use]
    pub fn new(dimension: usize, metric: DistanceMetric, capacity: usize) -> Self {
        Self {
            dimension,
            metric,
            capacity,
            slots: RwLock::new(Vec::new()),
            ids: RwLock::new(HashMap::new()),
            live: AtomicUsize::new(0),
        }
    }

    /// The fixed vector dimension.
    #[inline]
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// The configured distance metric.
    #[inline]
    #[must_use]
    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    /// The configured element capacity.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append a vector and map its external id, returning the assigned slot.
    ///
    /// # Errors
    ///
    /// `DimensionMismatch` if the vector length differs from the store
    /// dimension, `DuplicateId` if the external id already maps to a live
    /// record, `CapacityExceeded` once `capacity` live-or-dead records exist.
    pub fn insert(&self, embedding: &Embedding, external_id: u64) -> Result<u32, IndexError> {
        if embedding.dimension() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.dimension(),
            });
        }

        let mut ids = self.ids.write().map_err(|_| IndexError::LockPoisoned)?;
        let mut slots = self.slots.write().map_err(|_| IndexError::LockPoisoned)?;

        // Only a live mapping blocks the id; a tombstoned record may be
        // superseded by a fresh insert under the same external id.
        if let Some(&slot) = ids.get(&external_id) {
            if !slots[slot as usize].is_deleted() {
                return Err(IndexError::DuplicateId(external_id));
            }
        }

        if slots.len() >= self.capacity {
            return Err(IndexError::CapacityExceeded { capacity: self.capacity });
        }

        let slot = u32::try_from(slots.len())
            .map_err(|_| IndexError::CapacityExceeded { capacity: self.capacity })?;
        slots.push(Arc::new(VectorRecord::new(external_id, embedding.as_slice().to_vec())));
        ids.insert(external_id, slot);
        self.live.fetch_add(1, Ordering::Release);

        Ok(slot)
    }

    /// Fetch a record regardless of its tombstone state.
    ///
    /// Tombstoned records are still needed as graph bridges and for distance
    /// computation during traversal.
    ///
    /// # Errors
    ///
    /// `LockPoisoned` if a prior panic corrupted the arena.
    pub fn record(&self, slot: u32) -> Result<Option<Arc<VectorRecord>>, IndexError> {
        let slots = self.slots.read().map_err(|_| IndexError::LockPoisoned)?;
        Ok(slots.get(slot as usize).cloned())
    }

    /// Fetch a live record.
    ///
    /// # Errors
    ///
    /// `NotFound` if the slot was never assigned or is tombstoned.
    pub fn get(&self, slot: u32) -> Result<Arc<VectorRecord>, IndexError> {
        match self.record(slot)? {
            Some(record) if !record.is_deleted() => Ok(record),
            _ => Err(IndexError::NotFound(slot)),
        }
    }

    /// Mark a slot logically deleted. Idempotent; returns `true` if this call
    /// flipped the flag.
    ///
    /// The id mapping is dropped so the external id can be inserted again.
    ///
    /// # Errors
    ///
    /// `LockPoisoned` if a prior panic corrupted the arena.
    pub fn tombstone(&self, slot: u32) -> Result<bool, IndexError> {
        let record = match self.record(slot)? {
            Some(record) => record,
            None => return Ok(false),
        };

        if record.deleted.swap(true, Ordering::AcqRel) {
            return Ok(false);
        }
        self.live.fetch_sub(1, Ordering::Release);

        let mut ids = self.ids.write().map_err(|_| IndexError::LockPoisoned)?;
        if ids.get(&record.external_id) == Some(&slot) {
            ids.remove(&record.external_id);
        }

        Ok(true)
    }

    /// Look up the slot currently mapped to an external id.
    ///
    /// # Errors
    ///
    /// `LockPoisoned` if a prior panic corrupted the id map.
    pub fn slot_of(&self, external_id: u64) -> Result<Option<u32>, IndexError> {
        let ids = self.ids.read().map_err(|_| IndexError::LockPoisoned)?;
        Ok(ids.get(&external_id).copied())
    }

    /// Distance between two stored vectors under the configured metric.
    ///
    /// # Errors
    ///
    /// `NotFound` if either slot was never assigned.
    pub fn distance(&self, a: u32, b: u32) -> Result<f32, IndexError> {
        let ra = self.record(a)?.ok_or(IndexError::NotFound(a))?;
        let rb = self.record(b)?.ok_or(IndexError::NotFound(b))?;
        Ok(self.metric.calculate(ra.vector(), rb.vector()))
    }

    /// Distance from a query vector to a stored vector (tombstoned or live).
    ///
    /// Returns `Ok(None)` for unassigned slots.
    ///
    /// # Errors
    ///
    /// `LockPoisoned` if a prior panic corrupted the arena.
    pub fn distance_to(&self, query: &[f32], slot: u32) -> Result<Option<f32>, IndexError> {
        Ok(self.record(slot)?.map(|record| self.metric.calculate(query, record.vector())))
    }

    /// Total number of slots ever assigned, tombstoned included.
    ///
    /// # Errors
    ///
    /// `LockPoisoned` if a prior panic corrupted the arena.
    pub fn slot_count(&self) -> Result<usize, IndexError> {
        let slots = self.slots.read().map_err(|_| IndexError::LockPoisoned)?;
        Ok(slots.len())
    }

    /// Number of live (non-tombstoned) records.
    #[inline]
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }

    /// Snapshot of all records in slot order.
    ///
    /// # Errors
    ///
    /// `LockPoisoned` if a prior panic corrupted the arena.
    pub fn records(&self) -> Result<Vec<Arc<VectorRecord>>, IndexError> {
        let slots = self.slots.read().map_err(|_| IndexError::LockPoisoned)?;
        Ok(slots.clone())
    }

    /// Restore a record during snapshot load. Bypasses the capacity and
    /// duplicate checks performed by [`VectorStore::insert`]; the snapshot
    /// loader validates consistency itself.
    pub(crate) fn restore_record(
        &self,
        external_id: u64,
        data: Vec<f32>,
        deleted: bool,
    ) -> Result<u32, IndexError> {
        let mut ids = self.ids.write().map_err(|_| IndexError::LockPoisoned)?;
        let mut slots = self.slots.write().map_err(|_| IndexError::LockPoisoned)?;

        let slot = u32::try_from(slots.len())
            .map_err(|_| IndexError::CapacityExceeded { capacity: self.capacity })?;
        let record = VectorRecord::new(external_id, data);
        if deleted {
            record.deleted.store(true, Ordering::Release);
        } else {
            ids.insert(external_id, slot);
            self.live.fetch_add(1, Ordering::Release);
        }
        slots.push(Arc::new(record));

        Ok(slot)
    }
}
