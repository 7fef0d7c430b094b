//! ReadView - Stable snapshot boundary
//!
//! A read view is captured when a transaction begins and never changes
//! afterwards. It is a single scalar: the highest commit identity that was
//! fully published at that moment.

use serde::{Deserialize, Serialize};

use super::CommitId;

/// A stable snapshot boundary for reads.
///
/// All versions with `commit_tx > upper_bound` are invisible, as are all
/// uncommitted versions.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ReadView {
    read_upper_bound: CommitId,
}

impl ReadView {
    /// Creates a new read view with the given upper bound.
    #[inline]
    pub fn new(upper_bound: CommitId) -> Self {
        Self {
            read_upper_bound: upper_bound,
        }
    }

    /// Returns the upper bound commit identity.
    #[inline]
    pub fn upper_bound(&self) -> CommitId {
        self.read_upper_bound
    }

    /// Returns true if a commit stamped `commit_id` falls inside this view.
    #[inline]
    pub fn includes(&self, commit_id: CommitId) -> bool {
        commit_id <= self.read_upper_bound
    }
}
