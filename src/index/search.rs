//! Layered greedy search and neighbor selection.
//!
//! Both query and construction traffic go through [`search_layer`], the
//! candidate-list traversal at one layer of the graph. Construction also uses
//! [`select_diverse`], the diversity-aware neighbor selection heuristic that
//! keeps the graph navigable.

use std::collections::{BinaryHeap, HashSet};

use crate::error::IndexError;
use crate::store::VectorStore;

use super::graph::{Candidate, GraphIndex, MaxCandidate};

/// Greedy candidate-list search at a single layer.
///
/// Maintains a min-heap of candidates to explore and a result set bounded to
/// `ef`, both ordered by distance to `query` with ties broken toward higher
/// slots. Terminates once the closest unexplored candidate cannot improve a
/// full result set.
///
/// Tombstoned nodes act as bridges: they are expanded (their edges keep the
/// graph connected for downstream nodes) but never enter the result set, so
/// results contain only live nodes.
pub(crate) fn search_layer(
    store: &VectorStore,
    graph: &GraphIndex,
    query: &[f32],
    entry_points: &[u32],
    ef: usize,
    layer: usize,
) -> Result<Vec<Candidate>, IndexError> {
    if entry_points.is_empty() {
        return Ok(Vec::new());
    }

    let mut candidates: BinaryHeap<Candidate> = BinaryHeap::new();
    let mut results: BinaryHeap<MaxCandidate> = BinaryHeap::new();
    let mut visited: HashSet<u32> = HashSet::new();

    for &ep in entry_points {
        if !visited.insert(ep) {
            continue;
        }
        if let Some(record) = store.record(ep)? {
            let candidate = Candidate::new(ep, store.metric().calculate(query, record.vector()));
            candidates.push(candidate);
            if !record.is_deleted() {
                results.push(MaxCandidate(candidate));
            }
        }
    }

    while let Some(current) = candidates.pop() {
        let furthest = results.peek().map_or(f32::INFINITY, |c| c.0.distance);

        // Early stop: a full result set cannot be improved by anything
        // farther than its worst member.
        if results.len() >= ef && current.distance > furthest {
            break;
        }

        for neighbor in graph.neighbors(current.slot, layer)? {
            if !visited.insert(neighbor) {
                continue;
            }

            let record = match store.record(neighbor)? {
                Some(record) => record,
                None => continue,
            };
            let distance = store.metric().calculate(query, record.vector());
            let furthest = results.peek().map_or(f32::INFINITY, |c| c.0.distance);

            if results.len() < ef || distance < furthest {
                let candidate = Candidate::new(neighbor, distance);
                candidates.push(candidate);

                if !record.is_deleted() {
                    results.push(MaxCandidate(candidate));
                    if results.len() > ef {
                        results.pop();
                    }
                }
            }
        }
    }

    let mut out: Vec<Candidate> = results.into_iter().map(|mc| mc.0).collect();
    out.sort_unstable_by(|a, b| b.cmp(a));
    Ok(out)
}

/// Diversity-aware neighbor selection.
///
/// Repeatedly takes the candidate closest to the query point, rejecting any
/// candidate that sits closer to an already-selected neighbor than to the
/// query. This prevents near-duplicate neighbors from clustering and is what
/// keeps the small-world graph navigable. Returns at most `m` candidates;
/// fewer when diversity thins the set ("up to the cap", no backfill).
///
/// Tombstoned candidates are skipped, which lazily scrubs dead edges out of
/// neighbor lists whenever they are re-selected.
pub(crate) fn select_diverse(
    store: &VectorStore,
    candidates: &[Candidate],
    m: usize,
) -> Result<Vec<Candidate>, IndexError> {
    let mut remaining: Vec<Candidate> = candidates.to_vec();
    remaining.sort_unstable_by(|a, b| b.cmp(a));
    remaining.dedup_by_key(|c| c.slot);

    let mut selected: Vec<Candidate> = Vec::with_capacity(m);

    for candidate in remaining {
        if selected.len() >= m {
            break;
        }

        match store.record(candidate.slot)? {
            Some(record) if !record.is_deleted() => {}
            _ => continue,
        }

        let mut diverse = true;
        for kept in &selected {
            if store.distance(candidate.slot, kept.slot)? < candidate.distance {
                diverse = false;
                break;
            }
        }

        if diverse {
            selected.push(candidate);
        }
    }

    Ok(selected)
}
