//! Observable events
//!
//! Every event the store can log. Events are explicit and typed.

use std::fmt;

use super::Severity;

/// Observable events in the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// A transaction manager was constructed
    StoreCreated,

    // Transaction lifecycle
    /// Transaction began
    TxnBegin,
    /// Transaction committed
    TxnCommit,
    /// Transaction rolled back by its caller
    TxnRollback,
    /// Commit rejected by write-write conflict detection
    TxnConflict,
    /// Operation on an unknown or non-Active transaction
    TxnMisuse,

    // Vacuum
    /// An old Active transaction is holding back reclamation
    VacuumStaleTransaction,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::StoreCreated => "STORE_CREATED",
            Event::TxnBegin => "TXN_BEGIN",
            Event::TxnCommit => "TXN_COMMIT",
            Event::TxnRollback => "TXN_ROLLBACK",
            Event::TxnConflict => "TXN_WRITE_CONFLICT",
            Event::TxnMisuse => "TXN_MISUSE",
            Event::VacuumStaleTransaction => "VACUUM_STALE_TRANSACTION",
        }
    }

    /// Severity the event is logged at
    pub fn severity(&self) -> Severity {
        match self {
            Event::TxnBegin | Event::TxnCommit | Event::TxnRollback => Severity::Trace,
            Event::StoreCreated | Event::TxnConflict => Severity::Info,
            Event::TxnMisuse | Event::VacuumStaleTransaction => Severity::Warn,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
