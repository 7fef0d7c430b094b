//! MVCC Garbage Collection (vacuum)
//!
//! A version may be removed only if it is provably invisible to every
//! present and future read view.
//!
//! The *vacuum boundary* is the oldest start snapshot among Active
//! transactions, or the visible watermark when none are active. Every
//! present snapshot is at or above the boundary, and every future snapshot
//! will be too, because the watermark never moves backwards.
//!
//! For each key, every such snapshot resolves to the newest committed
//! version at or below the boundary, or to something newer. So, per chain:
//! - keep the single newest committed version `≤ boundary`
//! - keep everything newer than the boundary, and the pending slot
//! - drop everything strictly older
//!
//! A chain whose only survivor is a tombstone at or below the boundary
//! reads as absent for every snapshot and is removed outright.

use std::collections::BTreeMap;
use std::hash::Hash;

use serde::Serialize;

use super::{CommitId, VersionStore};

/// Tracks the start snapshots of Active transactions.
///
/// Several transactions may share one snapshot, so boundaries are counted,
/// not just recorded.
#[derive(Debug, Clone, Default)]
pub struct VisibilityFloor {
    snapshots: BTreeMap<CommitId, usize>,
}

impl VisibilityFloor {
    /// Create a floor with no registered snapshots.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the start snapshot of a transaction that just began.
    pub fn register(&mut self, snapshot: CommitId) {
        *self.snapshots.entry(snapshot).or_insert(0) += 1;
    }

    /// Unregister the start snapshot of a transaction that just ended.
    pub fn unregister(&mut self, snapshot: CommitId) {
        if let Some(count) = self.snapshots.get_mut(&snapshot) {
            *count -= 1;
            if *count == 0 {
                self.snapshots.remove(&snapshot);
            }
        }
    }

    /// Number of registered snapshots, duplicates included.
    #[cfg(test)]
    pub(crate) fn active_count(&self) -> usize {
        self.snapshots.values().sum()
    }

    /// The oldest registered snapshot.
    pub fn lower_bound(&self) -> Option<CommitId> {
        self.snapshots.keys().next().copied()
    }

    /// The vacuum boundary given the current visible watermark.
    pub fn boundary(&self, watermark: CommitId) -> CommitId {
        self.lower_bound().unwrap_or(watermark)
    }
}

/// Outcome of one vacuum pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VacuumStats {
    /// The boundary the pass compacted against.
    pub boundary: CommitId,
    /// Chains examined.
    pub chains_scanned: usize,
    /// Superseded versions removed from chains.
    pub versions_reclaimed: usize,
    /// Whole chains removed because the key is absent at every snapshot.
    pub chains_removed: usize,
}

/// Vacuum driver.
///
/// Holds no state; the boundary is computed by the caller, which owns the
/// table of Active transactions.
pub struct Vacuum;

impl Vacuum {
    /// Compact every chain in `store` against `boundary`.
    ///
    /// Each chain is locked exclusively only while it is compacted, so a
    /// pass never blocks more than one key at a time and never interleaves
    /// with a publish or discard on the same key.
    pub fn run<K, V>(store: &VersionStore<K, V>, boundary: CommitId) -> VacuumStats
    where
        K: Eq + Hash + Ord + Clone,
        V: Clone,
    {
        let refs = store.chain_refs();
        let chains_scanned = refs.len();
        let mut versions_reclaimed = 0;
        let mut dead = Vec::new();

        for (key, chain) in &refs {
            let mut chain = chain.write();
            versions_reclaimed += chain.compact(boundary);
            if chain.is_dead_at(boundary) {
                dead.push(key.clone());
            }
        }
        drop(refs);

        let mut chains_removed = 0;
        if !dead.is_empty() {
            let (removed, versions) = store.remove_dead_chains(&dead, boundary);
            chains_removed = removed;
            versions_reclaimed += versions;
        }

        VacuumStats {
            boundary,
            chains_scanned,
            versions_reclaimed,
            chains_removed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mvcc::{ReadView, TxId, VersionPayload};

    fn commit(store: &VersionStore<&'static str, i32>, tx: u64, commit: u64, key: &'static str, value: Option<i32>) {
        let mut writes = BTreeMap::new();
        writes.insert(key, value.map_or(VersionPayload::Tombstone, VersionPayload::Value));
        store
            .stage_writes(TxId::new(tx), &writes)
            .unwrap()
            .publish(CommitId::new(commit));
    }

    // === VisibilityFloor ===

    #[test]
    fn test_empty_floor_uses_watermark() {
        let floor = VisibilityFloor::new();
        assert!(floor.lower_bound().is_none());
        assert_eq!(floor.boundary(CommitId::new(7)), CommitId::new(7));
    }

    #[test]
    fn test_floor_uses_minimum() {
        let mut floor = VisibilityFloor::new();
        floor.register(CommitId::new(10));
        floor.register(CommitId::new(5));

        assert_eq!(floor.boundary(CommitId::new(20)), CommitId::new(5));
    }

    #[test]
    fn test_floor_counts_shared_snapshots() {
        let mut floor = VisibilityFloor::new();
        floor.register(CommitId::new(3));
        floor.register(CommitId::new(3));
        floor.unregister(CommitId::new(3));

        assert_eq!(floor.active_count(), 1);
        assert_eq!(floor.lower_bound(), Some(CommitId::new(3)));

        floor.unregister(CommitId::new(3));
        assert!(floor.lower_bound().is_none());
    }

    // === Vacuum ===

    #[test]
    fn test_vacuum_drops_superseded_versions() {
        let store = VersionStore::new();
        for i in 1..=5 {
            commit(&store, i, i, "k", Some(i as i32));
        }

        let stats = Vacuum::run(&store, CommitId::new(5));

        assert_eq!(stats.versions_reclaimed, 4);
        assert_eq!(store.version_count(), 1);
        assert_eq!(store.read(&"k", ReadView::new(CommitId::new(5))), Some(5));
    }

    #[test]
    fn test_vacuum_preserves_views_at_or_above_boundary() {
        let store = VersionStore::new();
        for i in 1..=6 {
            commit(&store, i, i, "k", Some(i as i32 * 10));
        }

        Vacuum::run(&store, CommitId::new(3));

        for at in 3..=6 {
            let view = ReadView::new(CommitId::new(at));
            assert_eq!(store.read(&"k", view), Some(at as i32 * 10));
        }
        assert_eq!(store.version_count(), 4);
    }

    #[test]
    fn test_vacuum_removes_dead_chains() {
        let store = VersionStore::new();
        commit(&store, 1, 1, "gone", Some(1));
        commit(&store, 2, 2, "gone", None);
        commit(&store, 3, 3, "kept", Some(1));

        let stats = Vacuum::run(&store, CommitId::new(3));

        assert_eq!(stats.chains_removed, 1);
        assert_eq!(stats.versions_reclaimed, 2);
        assert_eq!(store.key_count(), 1);
        assert_eq!(store.read(&"gone", ReadView::new(CommitId::new(3))), None);
    }

    #[test]
    fn test_vacuum_removes_empty_chain_left_by_discard() {
        let store: VersionStore<&str, i32> = VersionStore::new();
        store.stage(&"k", TxId::new(1), VersionPayload::Value(1)).unwrap();
        store.discard(TxId::new(1));
        assert_eq!(store.key_count(), 1);

        let stats = Vacuum::run(&store, CommitId::ZERO);

        assert_eq!(stats.chains_removed, 1);
        assert_eq!(stats.versions_reclaimed, 0);
        assert_eq!(store.key_count(), 0);
    }

    #[test]
    fn test_vacuum_keeps_tombstone_above_boundary() {
        let store = VersionStore::new();
        commit(&store, 1, 1, "k", Some(1));
        commit(&store, 2, 2, "k", None);

        let stats = Vacuum::run(&store, CommitId::new(1));

        assert_eq!(stats.versions_reclaimed, 0);
        assert_eq!(store.read(&"k", ReadView::new(CommitId::new(1))), Some(1));
        assert_eq!(store.read(&"k", ReadView::new(CommitId::new(2))), None);
    }
}
