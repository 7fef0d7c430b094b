//! Transaction states
//!
//! ```text
//! ┌───────┐ begin_transaction() ┌────────┐
//! │ Start │────────────────────▶│ Active │
//! └───────┘                     └────────┘
//!                                   │
//!                         ┌─────────┴─────────┐
//!                         │                   │
//!                     commit()      rollback() / conflict
//!                         │                   │
//!                         ▼                   ▼
//!                   ┌───────────┐       ┌──────────┐
//!                   │ Committed │       │ Aborted  │
//!                   └───────────┘       └──────────┘
//! ```
//!
//! There are no transitions out of a terminal state.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The state of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionState {
    /// Accepting reads and writes.
    Active,
    /// Writes published. Terminal.
    Committed,
    /// Writes discarded, by rollback or by a failed commit. Terminal.
    Aborted,
}

impl TransactionState {
    /// Returns the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionState::Active => "Active",
            TransactionState::Committed => "Committed",
            TransactionState::Aborted => "Aborted",
        }
    }

    /// Returns true if the transaction can perform operations.
    pub fn is_active(&self) -> bool {
        matches!(self, TransactionState::Active)
    }

    /// Returns true if the transaction has ended.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransactionState::Committed | TransactionState::Aborted)
    }
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
