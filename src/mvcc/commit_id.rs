//! TxId and CommitId - Logical identities
//!
//! Two independent, strictly increasing sequences:
//! - `TxId` names a transaction from `begin` onwards
//! - `CommitId` stamps the logical time at which a transaction's writes
//!   become visible
//!
//! Neither depends on wall-clock time. Both are PURE TYPES.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of a transaction, issued by `begin_transaction`.
///
/// Transaction ids are never reused within one manager.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct TxId(u64);

impl TxId {
    /// Creates a new TxId with the given value.
    #[inline]
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the underlying value.
    #[inline]
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tx#{}", self.0)
    }
}

/// A totally ordered commit identity.
///
/// - Every committed version carries exactly one commit identity
/// - Commit identities define a strict total order
/// - This ordering is the sole authority for visibility
///
/// `CommitId::ZERO` is the genesis point: a snapshot taken at zero sees
/// nothing, because no commit is ever stamped with it.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct CommitId(u64);

impl CommitId {
    /// The genesis commit point. Never assigned to a commit.
    pub const ZERO: CommitId = CommitId(0);

    /// Creates a new CommitId with the given value.
    ///
    /// No Default implementation exists to prevent accidental construction.
    #[inline]
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the underlying value.
    #[inline]
    pub fn value(&self) -> u64 {
        self.0
    }

    /// Returns the commit identity that immediately follows this one.
    #[inline]
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c#{}", self.0)
    }
}
