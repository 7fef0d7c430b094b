//! VersionChain - Version history for a single key
//!
//! - Committed versions are stored in commit order, oldest first, in one
//!   growable vector; lookups walk it from the back (newest first)
//! - At most one uncommitted version exists at a time, held in a separate
//!   pending slot so the invariant is structural
//! - Mutated only by the version store (stage / publish / discard) and by
//!   vacuum

use super::{CommitId, ReadView, TxId, Version, VersionPayload, Visibility, VisibilityResult};
use crate::error::{MvccError, MvccResult};

/// The complete version history of a single key.
#[derive(Clone, Debug)]
pub struct VersionChain<V> {
    /// Committed versions in ascending commit order.
    committed: Vec<Version<V>>,
    /// The in-flight version of the transaction currently committing.
    pending: Option<Version<V>>,
}

impl<V> VersionChain<V> {
    /// Creates a new empty version chain.
    pub fn new() -> Self {
        Self {
            committed: Vec::new(),
            pending: None,
        }
    }

    /// Returns the number of versions in this chain, pending included.
    #[inline]
    pub fn len(&self) -> usize {
        self.committed.len() + usize::from(self.pending.is_some())
    }

    /// Returns true if this chain has no versions.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.committed.is_empty() && self.pending.is_none()
    }

    /// Returns the committed versions, oldest first.
    ///
    /// This is a raw accessor. No visibility filtering is performed.
    #[inline]
    pub fn committed_versions(&self) -> &[Version<V>] {
        &self.committed
    }

    /// Returns the uncommitted version, if any.
    #[inline]
    pub fn pending(&self) -> Option<&Version<V>> {
        self.pending.as_ref()
    }

    /// Commit identity of the newest committed version.
    pub fn latest_committed(&self) -> Option<CommitId> {
        self.committed.last().and_then(|v| v.commit_tx())
    }

    /// Find the visible version for this chain given a read view.
    pub fn visible_version(&self, view: ReadView) -> VisibilityResult<'_, V> {
        Visibility::visible_version(self, view)
    }

    /// Stages an uncommitted version for `tx_id`.
    ///
    /// A second stage by the same transaction overwrites its own pending
    /// version. A stage by a different transaction while one is pending is
    /// rejected.
    pub fn stage(&mut self, tx_id: TxId, payload: VersionPayload<V>) -> MvccResult<()> {
        match self.pending.as_mut() {
            Some(existing) if existing.creator_tx() == tx_id => {
                existing.overwrite(payload);
                Ok(())
            }
            Some(existing) => Err(MvccError::PendingVersionExists {
                creator: existing.creator_tx(),
                requested_by: tx_id,
            }),
            None => {
                self.pending = Some(Version::uncommitted(payload, tx_id));
                Ok(())
            }
        }
    }

    /// Stamps the pending version of `tx_id` with `commit_id` and appends it
    /// to the committed history.
    ///
    /// Returns true if a version was published.
    pub fn publish(&mut self, tx_id: TxId, commit_id: CommitId) -> bool {
        match self.pending.take() {
            Some(mut version) if version.creator_tx() == tx_id => {
                debug_assert!(
                    self.latest_committed().map_or(true, |latest| latest < commit_id),
                    "commit identities must increase along a chain"
                );
                version.stamp(commit_id);
                self.committed.push(version);
                true
            }
            other => {
                self.pending = other;
                false
            }
        }
    }

    /// Drops the pending version of `tx_id`. Returns true if one existed.
    pub fn discard(&mut self, tx_id: TxId) -> bool {
        if self.pending.as_ref().map(Version::creator_tx) == Some(tx_id) {
            self.pending = None;
            true
        } else {
            false
        }
    }

    /// Removes every committed version strictly older than the newest
    /// committed version at or below `boundary`.
    ///
    /// Versions newer than the boundary and the pending slot are untouched.
    /// Runs in place in O(chain length). Returns the number removed.
    pub fn compact(&mut self, boundary: CommitId) -> usize {
        let keep_from = self
            .committed
            .iter()
            .rposition(|v| v.commit_tx().map_or(false, |c| c <= boundary));

        match keep_from {
            Some(index) if index > 0 => {
                self.committed.drain(..index);
                index
            }
            _ => 0,
        }
    }

    /// Returns true if this chain resolves to "absent" for every snapshot at
    /// or above `boundary` and holds nothing that could change that.
    ///
    /// That is the case when the only remaining version is a tombstone at or
    /// below the boundary and nothing is pending.
    pub fn is_dead_at(&self, boundary: CommitId) -> bool {
        if self.pending.is_some() {
            return false;
        }
        match self.committed.as_slice() {
            [] => true,
            [only] => only.is_tombstone() && only.commit_tx().map_or(false, |c| c <= boundary),
            _ => false,
        }
    }
}

impl<V> Default for VersionChain<V> {
    fn default() -> Self {
        Self::new()
    }
}
