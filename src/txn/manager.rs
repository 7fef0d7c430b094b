//! TransactionManager - begin/put/get/commit/rollback
//!
//! Owns the version store, the id generators and the table of Active
//! transactions. Every public operation that names a transaction rejects
//! ids that are not Active with `UnknownOrInactiveTransaction`.
//!
//! Lock order:
//!
//! 1. a transaction's own mutex
//! 2. the version store (key map, then chains in ascending key order)
//! 3. the transaction table
//! 4. the commit authority
//!
//! A transaction mutex is never acquired while the table lock is held;
//! lookups clone the handle out of the table first.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::{Mutex, RwLock};

use super::transaction::FinishedLog;
use super::{Transaction, TransactionInfo, TransactionState};
use crate::config::{MvccConfig, VacuumPolicy};
use crate::error::{MvccError, MvccResult};
use crate::mvcc::{CommitAuthority, CommitId, TxId, Vacuum, VacuumStats, VersionPayload, VersionStore, VisibilityFloor};
use crate::observability::{log_event, Event, MetricsRegistry, MetricsSnapshot, ObservationScope};

type TxnHandle<K, V> = Arc<Mutex<Transaction<K, V>>>;

/// Active transactions plus the snapshots they pin.
struct TransactionTable<K, V> {
    active: HashMap<TxId, TxnHandle<K, V>>,
    floor: VisibilityFloor,
    finished: FinishedLog,
}

/// Snapshot-isolated transactions over a multi-version key-value store.
///
/// ```ignore
/// let manager: TransactionManager<String, i64> = TransactionManager::new();
/// let tx = manager.begin_transaction();
/// manager.put(tx, "k".to_string(), 1)?;
/// manager.commit(tx)?;
/// ```
pub struct TransactionManager<K, V> {
    config: MvccConfig,
    store: VersionStore<K, V>,
    authority: CommitAuthority,
    table: RwLock<TransactionTable<K, V>>,
    metrics: MetricsRegistry,
    /// Publishing commits since the last automatic vacuum.
    commits_since_vacuum: AtomicU64,
}

impl<K, V> TransactionManager<K, V>
where
    K: Eq + Hash + Ord + Clone,
    V: Clone,
{
    /// Creates a manager with the default configuration.
    pub fn new() -> Self {
        Self::build(MvccConfig::default())
    }

    /// Creates a manager, validating `config` first.
    pub fn with_config(config: MvccConfig) -> MvccResult<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: MvccConfig) -> Self {
        let policy = match config.vacuum_policy {
            VacuumPolicy::Manual => "manual".to_string(),
            VacuumPolicy::EveryNCommits { commits } => format!("every_{}_commits", commits),
        };
        log_event(config.log_level, Event::StoreCreated, &[("vacuum_policy", &policy)]);

        Self {
            store: VersionStore::new(),
            authority: CommitAuthority::new(),
            table: RwLock::new(TransactionTable {
                active: HashMap::new(),
                floor: VisibilityFloor::new(),
                finished: FinishedLog::new(config.finished_history),
            }),
            metrics: MetricsRegistry::new(),
            commits_since_vacuum: AtomicU64::new(0),
            config,
        }
    }

    /// The configuration this manager was built with.
    pub fn config(&self) -> &MvccConfig {
        &self.config
    }

    /// Begin a new transaction.
    ///
    /// The start snapshot is the highest commit id whose writes are fully
    /// visible. The snapshot is pinned in the visibility floor before the
    /// table lock is released, so a concurrent vacuum cannot compute a
    /// boundary that ignores it.
    pub fn begin_transaction(&self) -> TxId {
        let (tx_id, snapshot) = {
            let mut table = self.table.write();
            let tx_id = self.authority.next_tx_id();
            let snapshot = self.authority.current_snapshot();
            table.floor.register(snapshot.upper_bound());
            table
                .active
                .insert(tx_id, Arc::new(Mutex::new(Transaction::new(tx_id, snapshot))));
            (tx_id, snapshot)
        };

        self.metrics.increment_begun();
        log_event(
            self.config.log_level,
            Event::TxnBegin,
            &[
                ("tx_id", &tx_id.value().to_string()),
                ("snapshot", &snapshot.upper_bound().value().to_string()),
            ],
        );
        tx_id
    }

    /// Buffer a write of `value` to `key`.
    ///
    /// Invisible to every other transaction until commit.
    pub fn put(&self, tx_id: TxId, key: K, value: V) -> MvccResult<()> {
        self.with_active(tx_id, "put", |txn| {
            txn.buffer(key, VersionPayload::Value(value));
            Ok(())
        })?;
        self.metrics.increment_writes();
        Ok(())
    }

    /// Buffer a deletion of `key`. Committing it publishes a tombstone.
    pub fn delete(&self, tx_id: TxId, key: K) -> MvccResult<()> {
        self.with_active(tx_id, "delete", |txn| {
            txn.buffer(key, VersionPayload::Tombstone);
            Ok(())
        })?;
        self.metrics.increment_writes();
        Ok(())
    }

    /// Read `key` as this transaction sees it.
    ///
    /// The transaction's own buffered write wins; otherwise the newest
    /// version committed at or before the start snapshot.
    pub fn get(&self, tx_id: TxId, key: &K) -> MvccResult<Option<V>> {
        let value = self.with_active(tx_id, "get", |txn| {
            Ok(match txn.buffered(key) {
                Some(payload) => payload.as_value().cloned(),
                None => self.store.read(key, txn.snapshot()),
            })
        })?;
        self.metrics.increment_reads();
        Ok(value)
    }

    /// Commit the transaction.
    ///
    /// Locks every written key, stages the buffered writes, and checks each
    /// key for a version committed after the start snapshot. Any such
    /// version aborts the transaction with `WriteConflict` and discards the
    /// staged versions. Otherwise the next commit id is allocated and every
    /// staged version is published under it before the locks are released.
    ///
    /// Returns the assigned commit id, or None for a transaction that wrote
    /// nothing. Does not return until the commit is visible to new
    /// transactions.
    pub fn commit(&self, tx_id: TxId) -> MvccResult<Option<CommitId>> {
        let commit_id = self.with_active(tx_id, "commit", |txn| self.commit_active(txn))?;
        if commit_id.is_some() {
            self.maybe_auto_vacuum();
        }
        Ok(commit_id)
    }

    fn commit_active(&self, txn: &mut Transaction<K, V>) -> MvccResult<Option<CommitId>> {
        let tx_id = txn.id();
        let snapshot = txn.snapshot().upper_bound();

        if txn.write_count() == 0 {
            self.finish(txn, TransactionState::Committed);
            self.metrics.increment_committed();
            log_event(
                self.config.log_level,
                Event::TxnCommit,
                &[("tx_id", &tx_id.value().to_string()), ("writes", "0")],
            );
            return Ok(None);
        }

        let batch = match self.store.stage_writes(tx_id, txn.writes()) {
            Ok(batch) => batch,
            Err(e) => {
                self.finish(txn, TransactionState::Aborted);
                return Err(e);
            }
        };

        if let Some(conflicting_commit) = batch.newest_commit_after(snapshot) {
            batch.discard();
            self.finish(txn, TransactionState::Aborted);
            self.metrics.increment_conflicts();
            log_event(
                self.config.log_level,
                Event::TxnConflict,
                &[
                    ("tx_id", &tx_id.value().to_string()),
                    ("snapshot", &snapshot.value().to_string()),
                    ("conflicting_commit", &conflicting_commit.value().to_string()),
                ],
            );
            return Err(MvccError::WriteConflict {
                tx_id,
                conflicting_commit,
            });
        }

        let commit_id = self.authority.allocate();
        let published = batch.publish(commit_id);
        self.authority.mark_published(commit_id);
        self.authority.wait_visible(commit_id);

        self.finish(txn, TransactionState::Committed);
        self.metrics.increment_committed();
        self.metrics.add_versions_published(published as u64);
        log_event(
            self.config.log_level,
            Event::TxnCommit,
            &[
                ("tx_id", &tx_id.value().to_string()),
                ("commit_id", &commit_id.value().to_string()),
                ("writes", &published.to_string()),
            ],
        );
        Ok(Some(commit_id))
    }

    /// Roll the transaction back, discarding its buffered writes.
    pub fn rollback(&self, tx_id: TxId) -> MvccResult<()> {
        self.with_active(tx_id, "rollback", |txn| {
            let discarded = txn.write_count();
            self.finish(txn, TransactionState::Aborted);
            log_event(
                self.config.log_level,
                Event::TxnRollback,
                &[
                    ("tx_id", &tx_id.value().to_string()),
                    ("discarded", &discarded.to_string()),
                ],
            );
            Ok(())
        })?;
        self.metrics.increment_rolled_back();
        Ok(())
    }

    /// The state of `tx_id`, or None if it was never issued or its terminal
    /// state has been evicted from the finished history.
    pub fn state(&self, tx_id: TxId) -> Option<TransactionState> {
        let handle = {
            let table = self.table.read();
            match table.active.get(&tx_id) {
                Some(handle) => Arc::clone(handle),
                None => return table.finished.get(tx_id),
            }
        };
        let state = handle.lock().state();
        Some(state)
    }

    /// The start snapshot of an Active transaction.
    pub fn snapshot_of(&self, tx_id: TxId) -> MvccResult<CommitId> {
        self.with_active(tx_id, "snapshot_of", |txn| Ok(txn.snapshot().upper_bound()))
    }

    /// Summaries of every Active transaction, oldest first.
    pub fn active_transactions(&self) -> Vec<TransactionInfo> {
        let handles: Vec<TxnHandle<K, V>> = self.table.read().active.values().cloned().collect();
        let mut infos: Vec<TransactionInfo> = handles
            .iter()
            .map(|handle| handle.lock().info())
            .filter(|info| info.state.is_active())
            .collect();
        infos.sort_by_key(|info| info.tx_id);
        infos
    }

    /// Active transactions older than the configured threshold.
    ///
    /// These pin old snapshots and hold back vacuum.
    pub fn stale_transactions(&self) -> Vec<TransactionInfo> {
        let now = Utc::now();
        let threshold = self.config.stale_threshold();
        self.active_transactions()
            .into_iter()
            .filter(|info| info.age(now) > threshold)
            .collect()
    }

    /// The highest commit id visible to a transaction beginning now.
    pub fn latest_commit_id(&self) -> CommitId {
        self.authority.watermark()
    }

    /// Current counter values.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Number of keys with a version chain.
    pub fn key_count(&self) -> usize {
        self.store.key_count()
    }

    /// Number of versions held across all keys.
    pub fn version_count(&self) -> usize {
        self.store.version_count()
    }

    /// Reclaim versions no current or future snapshot can read.
    ///
    /// The boundary is the oldest Active snapshot, or the visible watermark
    /// when nothing is Active. For each key the newest version committed at
    /// or below the boundary is kept along with everything newer.
    pub fn vacuum(&self) -> VacuumStats {
        let scope = ObservationScope::new(self.config.log_level, "VACUUM");

        let boundary = {
            let table = self.table.read();
            table.floor.boundary(self.authority.watermark())
        };
        self.report_stale();

        let stats = Vacuum::run(&self.store, boundary);
        self.metrics.record_vacuum(stats.versions_reclaimed as u64);

        scope.complete_with_fields(&[
            ("boundary", &stats.boundary.value().to_string()),
            ("chains_scanned", &stats.chains_scanned.to_string()),
            ("versions_reclaimed", &stats.versions_reclaimed.to_string()),
            ("chains_removed", &stats.chains_removed.to_string()),
        ]);
        stats
    }

    fn report_stale(&self) {
        let now = Utc::now();
        for info in self.stale_transactions() {
            log_event(
                self.config.log_level,
                Event::VacuumStaleTransaction,
                &[
                    ("tx_id", &info.tx_id.value().to_string()),
                    ("snapshot", &info.snapshot.value().to_string()),
                    ("age_secs", &info.age(now).num_seconds().to_string()),
                ],
            );
        }
    }

    fn maybe_auto_vacuum(&self) {
        if let VacuumPolicy::EveryNCommits { commits } = self.config.vacuum_policy {
            let count = self.commits_since_vacuum.fetch_add(1, Ordering::AcqRel) + 1;
            if count % commits == 0 {
                self.vacuum();
            }
        }
    }

    /// Runs `op` on `tx_id` if it is Active.
    fn with_active<R>(
        &self,
        tx_id: TxId,
        operation: &'static str,
        op: impl FnOnce(&mut Transaction<K, V>) -> MvccResult<R>,
    ) -> MvccResult<R> {
        let handle = self.table.read().active.get(&tx_id).cloned();
        let handle = match handle {
            Some(handle) => handle,
            None => return Err(self.misuse(tx_id, operation, None)),
        };

        let mut txn = handle.lock();
        if !txn.state().is_active() {
            // Finished by another thread between lookup and lock.
            let state = txn.state();
            drop(txn);
            return Err(self.misuse(tx_id, operation, Some(state)));
        }
        op(&mut *txn)
    }

    fn misuse(&self, tx_id: TxId, operation: &'static str, state: Option<TransactionState>) -> MvccError {
        let state = state.or_else(|| self.table.read().finished.get(tx_id));
        self.metrics.increment_misuse();
        log_event(
            self.config.log_level,
            Event::TxnMisuse,
            &[
                ("tx_id", &tx_id.value().to_string()),
                ("operation", operation),
                ("state", state.map_or("unknown", |s| s.as_str())),
            ],
        );
        MvccError::inactive(tx_id, state)
    }

    /// Move `txn` to a terminal state and release its snapshot.
    fn finish(&self, txn: &mut Transaction<K, V>, state: TransactionState) {
        txn.finish(state);
        let mut table = self.table.write();
        table.active.remove(&txn.id());
        table.floor.unregister(txn.snapshot().upper_bound());
        table.finished.record(txn.id(), state);
    }
}

impl<K, V> Default for TransactionManager<K, V>
where
    K: Eq + Hash + Ord + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> TransactionManager<&'static str, i32> {
        TransactionManager::new()
    }

    #[test]
    fn test_begin_allocates_increasing_ids() {
        let mgr = manager();
        let t1 = mgr.begin_transaction();
        let t2 = mgr.begin_transaction();

        assert!(t2 > t1);
        assert_eq!(mgr.state(t1), Some(TransactionState::Active));
        assert_eq!(mgr.active_transactions().len(), 2);
    }

    #[test]
    fn test_snapshot_is_latest_visible_commit() {
        let mgr = manager();
        let t1 = mgr.begin_transaction();
        mgr.put(t1, "k", 1).unwrap();
        let commit = mgr.commit(t1).unwrap().unwrap();

        let t2 = mgr.begin_transaction();
        assert_eq!(mgr.snapshot_of(t2).unwrap(), commit);
        assert_eq!(mgr.latest_commit_id(), commit);
    }

    #[test]
    fn test_read_your_own_writes() {
        let mgr = manager();
        let t1 = mgr.begin_transaction();
        mgr.put(t1, "k", 1).unwrap();
        assert_eq!(mgr.get(t1, &"k").unwrap(), Some(1));

        mgr.delete(t1, "k").unwrap();
        assert_eq!(mgr.get(t1, &"k").unwrap(), None);
    }

    #[test]
    fn test_uncommitted_writes_invisible_to_others() {
        let mgr = manager();
        let t1 = mgr.begin_transaction();
        let t2 = mgr.begin_transaction();
        mgr.put(t1, "k", 1).unwrap();

        assert_eq!(mgr.get(t2, &"k").unwrap(), None);
        assert_eq!(mgr.version_count(), 0);
    }

    #[test]
    fn test_read_only_commit_consumes_no_commit_id() {
        let mgr = manager();
        let t1 = mgr.begin_transaction();
        assert_eq!(mgr.commit(t1).unwrap(), None);
        assert_eq!(mgr.latest_commit_id(), CommitId::ZERO);
        assert_eq!(mgr.state(t1), Some(TransactionState::Committed));
    }

    #[test]
    fn test_conflict_aborts_and_discards() {
        let mgr = manager();
        let t1 = mgr.begin_transaction();
        let t2 = mgr.begin_transaction();

        mgr.put(t2, "k", 2).unwrap();
        let winner = mgr.commit(t2).unwrap().unwrap();

        mgr.put(t1, "k", 1).unwrap();
        let err = mgr.commit(t1).unwrap_err();
        assert_eq!(
            err,
            MvccError::WriteConflict {
                tx_id: t1,
                conflicting_commit: winner,
            }
        );
        assert_eq!(mgr.state(t1), Some(TransactionState::Aborted));

        let t3 = mgr.begin_transaction();
        assert_eq!(mgr.get(t3, &"k").unwrap(), Some(2));
        assert_eq!(mgr.version_count(), 1);
    }

    #[test]
    fn test_operations_on_finished_transaction_fail() {
        let mgr = manager();
        let t1 = mgr.begin_transaction();
        mgr.rollback(t1).unwrap();

        let err = mgr.put(t1, "k", 1).unwrap_err();
        assert_eq!(err, MvccError::inactive(t1, Some(TransactionState::Aborted)));
        assert!(mgr.get(t1, &"k").is_err());
        assert!(mgr.commit(t1).is_err());
        assert!(mgr.rollback(t1).is_err());
        assert!(mgr.snapshot_of(t1).is_err());
        assert_eq!(mgr.metrics().misuse_errors, 5);
    }

    #[test]
    fn test_unknown_transaction() {
        let mgr = manager();
        let err = mgr.get(TxId::new(99), &"k").unwrap_err();
        assert_eq!(err, MvccError::inactive(TxId::new(99), None));
        assert_eq!(mgr.state(TxId::new(99)), None);
    }

    #[test]
    fn test_finished_transactions_leave_active_table() {
        let mgr = manager();
        let t1 = mgr.begin_transaction();
        let t2 = mgr.begin_transaction();
        mgr.commit(t1).unwrap();
        mgr.rollback(t2).unwrap();

        assert!(mgr.active_transactions().is_empty());
        assert!(mgr.stale_transactions().is_empty());
    }

    #[test]
    fn test_vacuum_respects_active_snapshot() {
        let mgr = manager();
        let writer = mgr.begin_transaction();
        mgr.put(writer, "k", 1).unwrap();
        mgr.commit(writer).unwrap();

        let reader = mgr.begin_transaction();

        for value in 2..5 {
            let tx = mgr.begin_transaction();
            mgr.put(tx, "k", value).unwrap();
            mgr.commit(tx).unwrap();
        }

        let stats = mgr.vacuum();
        assert_eq!(stats.versions_reclaimed, 0);
        assert_eq!(mgr.get(reader, &"k").unwrap(), Some(1));

        mgr.commit(reader).unwrap();
        let stats = mgr.vacuum();
        assert_eq!(stats.versions_reclaimed, 3);
        assert_eq!(mgr.version_count(), 1);
    }

    #[test]
    fn test_auto_vacuum_runs_on_commit() {
        let mgr: TransactionManager<&str, i32> =
            TransactionManager::with_config(MvccConfig::with_auto_vacuum(2)).unwrap();
        for value in 0..4 {
            let tx = mgr.begin_transaction();
            mgr.put(tx, "k", value).unwrap();
            mgr.commit(tx).unwrap();
        }

        assert_eq!(mgr.metrics().vacuum_runs, 2);
        assert_eq!(mgr.version_count(), 1);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let result: MvccResult<TransactionManager<&str, i32>> =
            TransactionManager::with_config(MvccConfig::with_auto_vacuum(0));
        assert!(matches!(result, Err(MvccError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_metrics_count_lifecycle() {
        let mgr = manager();
        let t1 = mgr.begin_transaction();
        mgr.put(t1, "a", 1).unwrap();
        mgr.put(t1, "b", 2).unwrap();
        mgr.get(t1, &"a").unwrap();
        mgr.commit(t1).unwrap();

        let m = mgr.metrics();
        assert_eq!(m.transactions_begun, 1);
        assert_eq!(m.transactions_committed, 1);
        assert_eq!(m.writes, 2);
        assert_eq!(m.reads, 1);
        assert_eq!(m.versions_published, 2);
    }
}
