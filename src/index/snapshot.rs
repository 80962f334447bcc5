//! Snapshot persistence for the HNSW index.
//!
//! A snapshot is a self-contained JSON document: vectors, tombstone flags,
//! the full neighbor graph, the entry point, and the configuration needed to
//! rebuild an equivalent index. Capturing a snapshot reads the index through
//! the same locks as a search, so it should run while writers are quiesced;
//! a capture racing an insert sees a valid but possibly partial graph.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::distance::DistanceMetric;
use crate::error::IndexError;

use super::config::HnswConfig;
use super::graph::EntryPoint;
use super::hnsw::HnswIndex;

/// One node's persisted state. Position in [`Snapshot::nodes`] is the slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSnapshot {
    /// The caller-supplied identifier.
    pub external_id: u64,
    /// The vector data.
    pub vector: Vec<f32>,
    /// Whether the node was tombstoned.
    pub deleted: bool,
    /// Neighbor lists indexed by layer; the length gives the node's maximum
    /// layer plus one.
    pub neighbors: Vec<Vec<u32>>,
}

/// A complete serialized index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Vector dimension.
    pub dimension: usize,
    /// Configured element capacity.
    pub max_elements: usize,
    /// Distance metric.
    pub metric: DistanceMetric,
    /// Construction parameters.
    pub config: HnswConfig,
    /// Entry point as `(slot, layer)`, if the graph was non-empty.
    pub entry: Option<(u32, usize)>,
    /// All nodes in slot order, tombstoned ones included.
    pub nodes: Vec<NodeSnapshot>,
}

impl Snapshot {
    /// Check that this snapshot matches an expected dimension and metric.
    ///
    /// # Errors
    ///
    /// `DimensionMismatch` or `ConfigMismatch` on disagreement.
    pub fn validate(&self, dimension: usize, metric: DistanceMetric) -> Result<(), IndexError> {
        if self.dimension != dimension {
            return Err(IndexError::DimensionMismatch {
                expected: dimension,
                actual: self.dimension,
            });
        }
        if self.metric != metric {
            return Err(IndexError::ConfigMismatch { expected: metric, actual: self.metric });
        }
        Ok(())
    }

    /// Serialize to a writer as JSON.
    ///
    /// # Errors
    ///
    /// `Snapshot` on serialization failure.
    pub fn write_to<W: Write>(&self, writer: W) -> Result<(), IndexError> {
        serde_json::to_writer(writer, self)?;
        Ok(())
    }

    /// Deserialize from a reader.
    ///
    /// # Errors
    ///
    /// `Snapshot` on malformed JSON.
    pub fn read_from<R: Read>(reader: R) -> Result<Self, IndexError> {
        Ok(serde_json::from_reader(reader)?)
    }
}

impl HnswIndex {
    /// Capture the full index state.
    ///
    /// # Errors
    ///
    /// `LockPoisoned` if a prior panic corrupted the index.
    pub fn snapshot(&self) -> Result<Snapshot, IndexError> {
        let records = self.store().records()?;
        let mut nodes = Vec::with_capacity(records.len());
        for (slot, record) in records.iter().enumerate() {
            let slot = u32::try_from(slot).map_err(|_| {
                IndexError::InvalidGraphState("slot count exceeds u32".into())
            })?;
            let node = self.graph().node(slot)?.ok_or_else(|| {
                IndexError::InvalidGraphState(format!("slot {slot} has a vector but no node"))
            })?;
            let mut neighbors = Vec::with_capacity(node.max_layer() + 1);
            for layer in 0..=node.max_layer() {
                neighbors.push(node.neighbors(layer)?);
            }
            nodes.push(NodeSnapshot {
                external_id: record.external_id,
                vector: record.vector().to_vec(),
                deleted: record.is_deleted(),
                neighbors,
            });
        }

        Ok(Snapshot {
            dimension: self.dimension(),
            max_elements: self.store().capacity(),
            metric: self.metric(),
            config: self.config().clone(),
            entry: self.entry_point().map(|e| (e.slot, e.layer)),
            nodes,
        })
    }

    /// Rebuild an index from a snapshot.
    ///
    /// The snapshot is validated for internal consistency before any state
    /// is installed; a malformed document never yields a partially loaded
    /// index.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` for a bad configuration, `DimensionMismatch` for a
    /// vector of the wrong length, `InvalidGraphState` for dangling slots,
    /// oversized neighbor lists, duplicate live ids, or a bad entry point.
    pub fn from_snapshot(snapshot: &Snapshot) -> Result<Self, IndexError> {
        if snapshot.nodes.len() > snapshot.max_elements {
            return Err(IndexError::InvalidGraphState(format!(
                "{} nodes exceed capacity {}",
                snapshot.nodes.len(),
                snapshot.max_elements,
            )));
        }

        let index = Self::new(
            snapshot.dimension,
            snapshot.max_elements,
            snapshot.metric,
            snapshot.config.clone(),
        )?;

        let slot_count = snapshot.nodes.len();
        let mut live_ids = std::collections::HashSet::new();
        for (slot, node) in snapshot.nodes.iter().enumerate() {
            if node.vector.len() != snapshot.dimension {
                return Err(IndexError::DimensionMismatch {
                    expected: snapshot.dimension,
                    actual: node.vector.len(),
                });
            }
            if !node.deleted && !live_ids.insert(node.external_id) {
                return Err(IndexError::InvalidGraphState(format!(
                    "external id {} is live in two slots",
                    node.external_id,
                )));
            }
            if node.neighbors.is_empty() {
                return Err(IndexError::InvalidGraphState(format!(
                    "slot {slot} has no layers",
                )));
            }
            for (layer, list) in node.neighbors.iter().enumerate() {
                let cap = index.graph().cap_at(layer);
                if list.len() > cap {
                    return Err(IndexError::InvalidGraphState(format!(
                        "slot {slot} has {} neighbors at layer {layer}, cap is {cap}",
                        list.len(),
                    )));
                }
                for &neighbor in list {
                    if neighbor as usize >= slot_count {
                        return Err(IndexError::InvalidGraphState(format!(
                            "slot {slot} links to missing slot {neighbor}",
                        )));
                    }
                }
            }
        }

        if let Some((slot, layer)) = snapshot.entry {
            let node = snapshot.nodes.get(slot as usize).ok_or_else(|| {
                IndexError::InvalidGraphState(format!("entry point slot {slot} is missing"))
            })?;
            if layer >= node.neighbors.len() {
                return Err(IndexError::InvalidGraphState(format!(
                    "entry point layer {layer} exceeds slot {slot}'s maximum",
                )));
            }
        } else if snapshot.nodes.iter().any(|n| !n.deleted) {
            return Err(IndexError::InvalidGraphState(
                "live nodes but no entry point".into(),
            ));
        }

        for (slot, node) in snapshot.nodes.iter().enumerate() {
            let restored = index.store().restore_record(
                node.external_id,
                node.vector.clone(),
                node.deleted,
            )?;
            debug_assert_eq!(restored as usize, slot);
            index.graph().insert(restored, node.neighbors.len() - 1)?;
            for (layer, list) in node.neighbors.iter().enumerate() {
                index.graph().set_neighbors(restored, layer, list.clone())?;
            }
        }

        if let Some((slot, layer)) = snapshot.entry {
            index.graph().try_set_first_entry(EntryPoint { slot, layer });
        }

        Ok(index)
    }

    /// Write a snapshot of this index to `path` as JSON.
    ///
    /// # Errors
    ///
    /// `Io` on filesystem failure, `Snapshot` on serialization failure, or
    /// `LockPoisoned`.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), IndexError> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        self.snapshot()?.write_to(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Load an index previously written with [`save`](Self::save).
    ///
    /// # Errors
    ///
    /// `Io`, `Snapshot`, or any error [`from_snapshot`](Self::from_snapshot)
    /// reports.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, IndexError> {
        let file = File::open(path)?;
        let snapshot = Snapshot::read_from(BufReader::new(file))?;
        Self::from_snapshot(&snapshot)
    }
}
