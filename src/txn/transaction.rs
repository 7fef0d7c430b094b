//! Transaction record
//!
//! One record per Active transaction: its snapshot, its state and its
//! private write buffer. Nothing in the buffer is visible to any other
//! transaction until commit publishes it.

use std::collections::{BTreeMap, HashMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::TransactionState;
use crate::mvcc::{CommitId, ReadView, TxId, VersionPayload};

/// The state of one transaction.
#[derive(Debug)]
pub struct Transaction<K, V> {
    id: TxId,
    snapshot: ReadView,
    state: TransactionState,
    /// Pending writes, ordered by key so commit can lock them in order.
    writes: BTreeMap<K, VersionPayload<V>>,
    started_at: DateTime<Utc>,
}

impl<K: Ord, V> Transaction<K, V> {
    /// Creates a new Active transaction reading at `snapshot`.
    pub(crate) fn new(id: TxId, snapshot: ReadView) -> Self {
        Self {
            id,
            snapshot,
            state: TransactionState::Active,
            writes: BTreeMap::new(),
            started_at: Utc::now(),
        }
    }

    /// Returns the transaction ID.
    pub fn id(&self) -> TxId {
        self.id
    }

    /// Returns the start snapshot.
    pub fn snapshot(&self) -> ReadView {
        self.snapshot
    }

    /// Returns the current state.
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// When the transaction began.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Number of keys in the write buffer.
    pub fn write_count(&self) -> usize {
        self.writes.len()
    }

    /// The transaction's own pending write for `key`, if any.
    pub fn buffered(&self, key: &K) -> Option<&VersionPayload<V>> {
        self.writes.get(key)
    }

    /// Buffer a write. A later write to the same key replaces it.
    pub(crate) fn buffer(&mut self, key: K, payload: VersionPayload<V>) {
        self.writes.insert(key, payload);
    }

    /// The full write buffer.
    pub(crate) fn writes(&self) -> &BTreeMap<K, VersionPayload<V>> {
        &self.writes
    }

    /// Move to a terminal state, dropping the write buffer.
    pub(crate) fn finish(&mut self, state: TransactionState) {
        debug_assert!(self.state.is_active(), "no transitions out of a terminal state");
        debug_assert!(state.is_terminal());
        self.state = state;
        self.writes.clear();
    }

    /// A serialisable summary.
    pub fn info(&self) -> TransactionInfo {
        TransactionInfo {
            tx_id: self.id,
            snapshot: self.snapshot.upper_bound(),
            state: self.state,
            write_count: self.writes.len(),
            started_at: self.started_at,
        }
    }
}

/// Summary of a transaction, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionInfo {
    pub tx_id: TxId,
    pub snapshot: CommitId,
    pub state: TransactionState,
    pub write_count: usize,
    pub started_at: DateTime<Utc>,
}

impl TransactionInfo {
    /// How long ago the transaction began.
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.started_at
    }
}

/// Bounded memory of transactions that reached a terminal state.
///
/// Lets misuse errors name the state a stale handle ended in. The oldest
/// entries are evicted first.
#[derive(Debug)]
pub(crate) struct FinishedLog {
    capacity: usize,
    order: VecDeque<TxId>,
    states: HashMap<TxId, TransactionState>,
}

impl FinishedLog {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity,
            order: VecDeque::with_capacity(capacity.min(4096)),
            states: HashMap::new(),
        }
    }

    pub(crate) fn record(&mut self, tx_id: TxId, state: TransactionState) {
        if self.capacity == 0 {
            return;
        }
        if self.order.len() == self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.states.remove(&evicted);
            }
        }
        self.order.push_back(tx_id);
        self.states.insert(tx_id, state);
    }

    pub(crate) fn get(&self, tx_id: TxId) -> Option<TransactionState> {
        self.states.get(&tx_id).copied()
    }
}
