//! Errors for snapkv
//!
//! Every failure surfaces synchronously to the caller of the failing
//! operation. Codes follow the `MVCC_CATEGORY_NAME` format.

use std::fmt;

use thiserror::Error;

use crate::mvcc::{CommitId, TxId};
use crate::observability::Severity;
use crate::txn::TransactionState;

/// Result type for store operations.
pub type MvccResult<T> = Result<T, MvccError>;

/// Stable, machine-readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MvccErrorCode {
    /// A concurrent commit wrote a key in this transaction's write set.
    MvccWriteConflict,
    /// The transaction id was never issued, or is no longer Active.
    MvccInactiveTransaction,
    /// A configuration value failed validation.
    MvccInvalidConfiguration,
    /// A second uncommitted version was staged on one key.
    MvccPendingVersionExists,
}

impl MvccErrorCode {
    /// Returns the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            MvccErrorCode::MvccWriteConflict => "MVCC_WRITE_CONFLICT",
            MvccErrorCode::MvccInactiveTransaction => "MVCC_INACTIVE_TRANSACTION",
            MvccErrorCode::MvccInvalidConfiguration => "MVCC_INVALID_CONFIGURATION",
            MvccErrorCode::MvccPendingVersionExists => "MVCC_PENDING_VERSION_EXISTS",
        }
    }

    /// Severity used when the error is logged.
    ///
    /// Conflicts are an expected outcome under contention; misuse and
    /// invariant violations are not.
    pub fn severity(&self) -> Severity {
        match self {
            MvccErrorCode::MvccWriteConflict => Severity::Info,
            MvccErrorCode::MvccInactiveTransaction => Severity::Warn,
            MvccErrorCode::MvccInvalidConfiguration => Severity::Error,
            MvccErrorCode::MvccPendingVersionExists => Severity::Error,
        }
    }
}

impl fmt::Display for MvccErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Store errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MvccError {
    /// Another transaction committed a write to a key in this transaction's
    /// write set after this transaction's snapshot was taken. The
    /// transaction has been aborted; the caller may retry it from scratch.
    #[error("write conflict: {tx_id} lost to newer commit {conflicting_commit}")]
    WriteConflict {
        tx_id: TxId,
        conflicting_commit: CommitId,
    },

    /// The transaction id does not name an Active transaction.
    ///
    /// `state` is the terminal state if the manager still remembers it, or
    /// None for an id it never issued or has already evicted.
    #[error(
        "transaction {tx_id} is unknown or inactive (state: {})",
        .state.map_or("unknown", |s| s.as_str())
    )]
    UnknownOrInactiveTransaction {
        tx_id: TxId,
        state: Option<TransactionState>,
    },

    /// Rejected at construction time.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Internal invariant: at most one uncommitted version per key.
    #[error("key already has a pending version from {creator}, refused stage by {requested_by}")]
    PendingVersionExists { creator: TxId, requested_by: TxId },
}

impl MvccError {
    /// Returns the error code.
    pub fn code(&self) -> MvccErrorCode {
        match self {
            MvccError::WriteConflict { .. } => MvccErrorCode::MvccWriteConflict,
            MvccError::UnknownOrInactiveTransaction { .. } => MvccErrorCode::MvccInactiveTransaction,
            MvccError::InvalidConfiguration(_) => MvccErrorCode::MvccInvalidConfiguration,
            MvccError::PendingVersionExists { .. } => MvccErrorCode::MvccPendingVersionExists,
        }
    }

    /// True only for failures a caller should answer by re-running the
    /// whole transaction. The store itself never retries.
    pub fn is_retryable(&self) -> bool {
        matches!(self, MvccError::WriteConflict { .. })
    }

    pub(crate) fn inactive(tx_id: TxId, state: Option<TransactionState>) -> Self {
        MvccError::UnknownOrInactiveTransaction { tx_id, state }
    }
}
