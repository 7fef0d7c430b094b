//! Version - A single entry in a key's history
//!
//! - Holds a complete value OR an explicit tombstone
//! - Records the transaction that created it
//! - Receives its commit identity exactly once, at publish time
//! - Is immutable from that moment on
//!
//! Deletes are explicit tombstone versions, fully ordered in the chain.

use super::{CommitId, TxId};

/// The payload of a version: either a value or a tombstone.
///
/// Tombstone is explicit, NOT represented via Option.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VersionPayload<V> {
    /// A complete value.
    Value(V),
    /// An explicit deletion marker.
    Tombstone,
}

impl<V> VersionPayload<V> {
    /// Returns true if this payload is a tombstone.
    #[inline]
    pub fn is_tombstone(&self) -> bool {
        matches!(self, VersionPayload::Tombstone)
    }

    /// Returns the value, or None for a tombstone.
    #[inline]
    pub fn as_value(&self) -> Option<&V> {
        match self {
            VersionPayload::Value(v) => Some(v),
            VersionPayload::Tombstone => None,
        }
    }

    /// Converts into the value, or None for a tombstone.
    #[inline]
    pub fn into_value(self) -> Option<V> {
        match self {
            VersionPayload::Value(v) => Some(v),
            VersionPayload::Tombstone => None,
        }
    }
}

/// A single version of a key.
///
/// All fields are private. The only mutation is the one-time commit stamp,
/// which is crate-private and performed by the version store under the
/// key's lock.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Version<V> {
    payload: VersionPayload<V>,
    creator_tx: TxId,
    commit_tx: Option<CommitId>,
}

impl<V> Version<V> {
    /// Creates a new, uncommitted version.
    pub fn uncommitted(payload: VersionPayload<V>, creator_tx: TxId) -> Self {
        Self {
            payload,
            creator_tx,
            commit_tx: None,
        }
    }

    /// Creates an already committed version.
    pub fn committed(payload: VersionPayload<V>, creator_tx: TxId, commit_tx: CommitId) -> Self {
        Self {
            payload,
            creator_tx,
            commit_tx: Some(commit_tx),
        }
    }

    /// Returns a reference to the payload.
    #[inline]
    pub fn payload(&self) -> &VersionPayload<V> {
        &self.payload
    }

    /// Returns the transaction that created this version.
    #[inline]
    pub fn creator_tx(&self) -> TxId {
        self.creator_tx
    }

    /// Returns the commit identity, or None while uncommitted.
    #[inline]
    pub fn commit_tx(&self) -> Option<CommitId> {
        self.commit_tx
    }

    /// Returns true once a commit identity has been assigned.
    #[inline]
    pub fn is_committed(&self) -> bool {
        self.commit_tx.is_some()
    }

    /// Returns true if this version is a tombstone.
    #[inline]
    pub fn is_tombstone(&self) -> bool {
        self.payload.is_tombstone()
    }

    /// Replaces the payload of an uncommitted version.
    ///
    /// Last write wins within one transaction.
    pub(crate) fn overwrite(&mut self, payload: VersionPayload<V>) {
        debug_assert!(self.commit_tx.is_none(), "committed versions are immutable");
        self.payload = payload;
    }

    /// Assigns the commit identity.
    pub(crate) fn stamp(&mut self, commit_tx: CommitId) {
        debug_assert!(self.commit_tx.is_none(), "commit identity is assigned once");
        self.commit_tx = Some(commit_tx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uncommitted_version_has_no_commit_tx() {
        let version = Version::uncommitted(VersionPayload::Value("a"), TxId::new(3));

        assert_eq!(version.creator_tx(), TxId::new(3));
        assert!(version.commit_tx().is_none());
        assert!(!version.is_committed());
    }

    #[test]
    fn test_committed_version() {
        let version = Version::committed(VersionPayload::Value(1u32), TxId::new(1), CommitId::new(4));

        assert!(version.is_committed());
        assert_eq!(version.commit_tx(), Some(CommitId::new(4)));
        assert_eq!(version.payload().as_value(), Some(&1));
    }

    #[test]
    fn test_tombstone_is_explicit() {
        let version: Version<u32> = Version::uncommitted(VersionPayload::Tombstone, TxId::new(1));

        assert!(version.is_tombstone());
        assert!(version.payload().as_value().is_none());
    }

    #[test]
    fn test_stamp_then_read() {
        let mut version = Version::uncommitted(VersionPayload::Value("x"), TxId::new(2));
        version.overwrite(VersionPayload::Value("y"));
        version.stamp(CommitId::new(9));

        assert_eq!(version.commit_tx(), Some(CommitId::new(9)));
        assert_eq!(version.payload().clone().into_value(), Some("y"));
    }
}
