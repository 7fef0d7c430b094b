//! VersionStore - Per-key version chains
//!
//! The store exclusively owns every version chain. Each chain sits behind
//! its own lock so commits on disjoint keys do not serialize against each
//! other:
//!
//! - `read` takes a chain's read lock for the length of one lookup
//! - a commit locks every key it writes, in ascending key order, through a
//!   [`CommitBatch`]; stage, conflict check and publish all happen while the
//!   batch is held
//! - `publish` and `discard` of versions staged one key at a time lock
//!   every key the transaction staged, again in ascending order, before
//!   touching any of them
//! - vacuum takes one chain's write lock at a time
//!
//! Lock order is: key map, then chains in ascending key order. No code path
//! acquires the key map while holding a chain lock. The staged-key index is
//! a leaf lock.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::{ArcRwLockWriteGuard, Mutex, RawRwLock, RwLock};

use super::{CommitId, ReadView, TxId, VersionChain, VersionPayload};
use crate::error::MvccResult;

type ChainRef<V> = Arc<RwLock<VersionChain<V>>>;
type ChainGuard<V> = ArcRwLockWriteGuard<RawRwLock, VersionChain<V>>;

/// Multi-version storage for every key.
#[derive(Debug)]
pub struct VersionStore<K, V> {
    chains: RwLock<HashMap<K, ChainRef<V>>>,
    /// Keys staged through [`VersionStore::stage`], per transaction.
    staged: Mutex<HashMap<TxId, BTreeSet<K>>>,
}

impl<K, V> VersionStore<K, V>
where
    K: Eq + Hash + Ord + Clone,
    V: Clone,
{
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            chains: RwLock::new(HashMap::new()),
            staged: Mutex::new(HashMap::new()),
        }
    }

    /// Number of keys with a version chain.
    pub fn key_count(&self) -> usize {
        self.chains.read().len()
    }

    /// Number of versions across all chains, pending ones included.
    pub fn version_count(&self) -> usize {
        self.chains.read().values().map(|chain| chain.read().len()).sum()
    }

    /// Snapshot read.
    ///
    /// Returns the value of the newest committed version of `key` whose
    /// commit identity is inside `view`, or None if there is none or it is
    /// a tombstone. Uncommitted versions are never returned.
    pub fn read(&self, key: &K, view: ReadView) -> Option<V> {
        let chains = self.chains.read();
        let chain = chains.get(key)?.read();
        chain
            .visible_version(view)
            .version()
            .and_then(|version| version.payload().as_value().cloned())
    }

    /// Commit identity of the newest committed version of `key`.
    pub fn latest_committed_version(&self, key: &K) -> Option<CommitId> {
        let chains = self.chains.read();
        let chain = chains.get(key)?.read();
        chain.latest_committed()
    }

    /// Stage one uncommitted version of `key` on behalf of `tx_id`.
    ///
    /// A second stage by the same transaction overwrites its pending
    /// version; a stage by any other transaction is refused while one is
    /// pending.
    pub fn stage(&self, key: &K, tx_id: TxId, payload: VersionPayload<V>) -> MvccResult<()> {
        let chain = self.chain_for_write(key);
        let mut chain = chain.write();
        chain.stage(tx_id, payload)?;
        self.staged.lock().entry(tx_id).or_default().insert(key.clone());
        Ok(())
    }

    /// Stamps every version `tx_id` staged with `commit_id`.
    ///
    /// All of the transaction's keys are write-locked before the first one
    /// is stamped, so a reader sees either none or all of them committed.
    /// Returns the number of versions published.
    pub fn publish(&self, tx_id: TxId, commit_id: CommitId) -> usize {
        self.lock_staged(tx_id)
            .iter_mut()
            .map(|chain| chain.publish(tx_id, commit_id))
            .filter(|published| *published)
            .count()
    }

    /// Removes every version `tx_id` staged that was never published.
    pub fn discard(&self, tx_id: TxId) -> usize {
        self.lock_staged(tx_id)
            .iter_mut()
            .map(|chain| chain.discard(tx_id))
            .filter(|discarded| *discarded)
            .count()
    }

    /// Takes the staged keys of `tx_id` out of the index and write-locks
    /// their chains in ascending key order.
    fn lock_staged(&self, tx_id: TxId) -> Vec<ChainGuard<V>> {
        let keys = self.staged.lock().remove(&tx_id).unwrap_or_default();
        let refs: Vec<ChainRef<V>> = {
            let chains = self.chains.read();
            keys.iter().filter_map(|key| chains.get(key).map(Arc::clone)).collect()
        };
        refs.iter().map(|chain| chain.write_arc()).collect()
    }

    /// Locks every key in `writes` and stages one uncommitted version per
    /// key on behalf of `tx_id`.
    ///
    /// Keys are locked in ascending order, which is the order a `BTreeMap`
    /// iterates in, so overlapping commits cannot deadlock. The returned
    /// batch keeps the locks until it is published or discarded; dropping
    /// it unpublished discards the staged versions.
    pub fn stage_writes(
        &self,
        tx_id: TxId,
        writes: &BTreeMap<K, VersionPayload<V>>,
    ) -> MvccResult<CommitBatch<K, V>> {
        let refs: Vec<(K, ChainRef<V>)> = writes
            .keys()
            .map(|key| (key.clone(), self.chain_for_write(key)))
            .collect();

        let mut batch = CommitBatch {
            tx_id,
            entries: refs
                .iter()
                .map(|(key, chain)| (key.clone(), chain.write_arc()))
                .collect(),
            finished: false,
        };
        drop(refs);

        for ((_, chain), payload) in batch.entries.iter_mut().zip(writes.values()) {
            chain.stage(tx_id, payload.clone())?;
        }
        Ok(batch)
    }

    /// Returns the chain for `key`, creating it if absent.
    fn chain_for_write(&self, key: &K) -> ChainRef<V> {
        if let Some(chain) = self.chains.read().get(key) {
            return Arc::clone(chain);
        }
        let mut chains = self.chains.write();
        Arc::clone(
            chains
                .entry(key.clone())
                .or_insert_with(|| Arc::new(RwLock::new(VersionChain::new()))),
        )
    }

    /// Clones out every (key, chain) pair. Used by vacuum to walk chains
    /// without holding the key map.
    pub(crate) fn chain_refs(&self) -> Vec<(K, ChainRef<V>)> {
        self.chains
            .read()
            .iter()
            .map(|(key, chain)| (key.clone(), Arc::clone(chain)))
            .collect()
    }

    /// Removes the chains of `keys` that are still dead at `boundary`.
    ///
    /// A chain is only removed while nobody else holds a handle to it; a
    /// commit that has already picked the chain up keeps it alive.
    ///
    /// Returns the number of chains removed and the versions they held.
    pub(crate) fn remove_dead_chains(&self, keys: &[K], boundary: CommitId) -> (usize, usize) {
        let mut chains = self.chains.write();
        let mut removed = 0;
        let mut versions = 0;
        for key in keys {
            let held = chains
                .get(key)
                .filter(|chain| Arc::strong_count(*chain) == 1)
                .map(|chain| chain.read())
                .and_then(|chain| chain.is_dead_at(boundary).then(|| chain.len()));
            if let Some(held) = held {
                chains.remove(key);
                removed += 1;
                versions += held;
            }
        }
        (removed, versions)
    }
}

impl<K, V> Default for VersionStore<K, V>
where
    K: Eq + Hash + Ord + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

/// The locked write set of one committing transaction.
///
/// Holds the write lock of every key the transaction wrote, each with
/// exactly one staged version. Readers of those keys wait only for the
/// duration of the conflict check and publish.
pub struct CommitBatch<K, V> {
    tx_id: TxId,
    entries: Vec<(K, ChainGuard<V>)>,
    finished: bool,
}

impl<K, V> CommitBatch<K, V> {
    /// Returns the newest commit identity, among all locked keys, that is
    /// greater than `snapshot`.
    ///
    /// This is the write-write conflict test: any such commit was made by a
    /// transaction that committed after `snapshot` was taken.
    pub fn newest_commit_after(&self, snapshot: CommitId) -> Option<CommitId> {
        self.entries
            .iter()
            .filter_map(|(_, chain)| chain.latest_committed())
            .filter(|commit| *commit > snapshot)
            .max()
    }

    /// Stamps every staged version with `commit_id` and releases the locks.
    ///
    /// All versions of the batch become committed before any lock is
    /// released. Returns the number of versions published.
    pub fn publish(mut self, commit_id: CommitId) -> usize {
        let mut published = 0;
        for (_, chain) in self.entries.iter_mut() {
            if chain.publish(self.tx_id, commit_id) {
                published += 1;
            }
        }
        self.finished = true;
        published
    }

    /// Drops every staged version and releases the locks.
    pub fn discard(mut self) -> usize {
        let mut discarded = 0;
        for (_, chain) in self.entries.iter_mut() {
            if chain.discard(self.tx_id) {
                discarded += 1;
            }
        }
        self.finished = true;
        discarded
    }
}

impl<K, V> Drop for CommitBatch<K, V> {
    fn drop(&mut self) {
        if !self.finished {
            let tx_id = self.tx_id;
            for (_, chain) in self.entries.iter_mut() {
                chain.discard(tx_id);
            }
        }
    }
}
