//! Commit Authority - Identity assignment and the visibility watermark
//!
//! Owns the two logical clocks of the store:
//! - the transaction-id generator, consulted by `begin_transaction`
//! - the commit-id generator, consulted by `commit` while it holds the
//!   locks of every key it writes
//!
//! Commit ids may finish publishing out of order when their write sets are
//! disjoint. The authority therefore tracks a separate *watermark*: the
//! highest commit id such that it and every smaller id are fully
//! published. New snapshots are taken at the watermark, so a reader can
//! never observe a commit that is still mid-publication.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Condvar, Mutex};

use super::{CommitId, ReadView, TxId};

/// Commit identity authority.
#[derive(Debug)]
pub struct CommitAuthority {
    /// Last transaction id handed out.
    last_tx_id: AtomicU64,
    /// Commit clock state.
    inner: Mutex<ClockState>,
    /// Signalled every time the watermark advances.
    watermark_advanced: Condvar,
}

#[derive(Debug)]
struct ClockState {
    /// Last commit id handed out.
    last_allocated: u64,
    /// Every id at or below this value is fully published.
    watermark: u64,
    /// Published ids above the watermark, waiting for a gap to close.
    completed_above: BTreeSet<u64>,
}

impl CommitAuthority {
    /// Create a new authority. No transaction or commit id has been issued.
    pub fn new() -> Self {
        Self {
            last_tx_id: AtomicU64::new(0),
            inner: Mutex::new(ClockState {
                last_allocated: 0,
                watermark: 0,
                completed_above: BTreeSet::new(),
            }),
            watermark_advanced: Condvar::new(),
        }
    }

    /// Issue the next transaction id. Strictly increasing across threads.
    pub fn next_tx_id(&self) -> TxId {
        TxId::new(self.last_tx_id.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Allocate the next commit id.
    ///
    /// The caller must hold the locks of every key it is about to publish
    /// and must call [`CommitAuthority::mark_published`] once publishing is
    /// done.
    pub fn allocate(&self) -> CommitId {
        let mut inner = self.inner.lock();
        let commit_id = CommitId::new(inner.last_allocated).next();
        inner.last_allocated = commit_id.value();
        commit_id
    }

    /// Record that every version stamped with `commit_id` is in place.
    ///
    /// Advances the watermark over the longest contiguous run of published
    /// ids and wakes any thread waiting for visibility.
    pub fn mark_published(&self, commit_id: CommitId) {
        let mut inner = self.inner.lock();
        debug_assert!(commit_id.value() <= inner.last_allocated);
        debug_assert!(commit_id.value() > inner.watermark);

        inner.completed_above.insert(commit_id.value());
        let mut advanced = false;
        loop {
            let candidate = inner.watermark + 1;
            if !inner.completed_above.remove(&candidate) {
                break;
            }
            inner.watermark = candidate;
            advanced = true;
        }
        drop(inner);

        if advanced {
            self.watermark_advanced.notify_all();
        }
    }

    /// Block until `commit_id` is covered by the watermark.
    ///
    /// Only ever waits on commits that already hold their ids and are
    /// publishing, which is bounded by the size of their write sets.
    pub fn wait_visible(&self, commit_id: CommitId) {
        let mut inner = self.inner.lock();
        while inner.watermark < commit_id.value() {
            self.watermark_advanced.wait(&mut inner);
        }
    }

    /// The highest fully published commit id.
    pub fn watermark(&self) -> CommitId {
        CommitId::new(self.inner.lock().watermark)
    }

    /// The highest commit id handed out so far, published or not.
    #[cfg(test)]
    pub(crate) fn last_allocated(&self) -> CommitId {
        CommitId::new(self.inner.lock().last_allocated)
    }

    /// Create a read view at the current watermark.
    pub fn current_snapshot(&self) -> ReadView {
        ReadView::new(self.watermark())
    }
}

impl Default for CommitAuthority {
    fn default() -> Self {
        Self::new()
    }
}
