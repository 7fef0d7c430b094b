//! Transaction Lifecycle
//!
//! This module provides:
//! - `TransactionState` - Active, Committed, Aborted
//! - `Transaction` - Snapshot and private write buffer of one transaction
//! - `TransactionManager` - begin/put/get/commit/rollback over a `VersionStore`
//!
//! # Isolation
//!
//! Snapshot isolation with first-committer-wins write-write conflict
//! detection. Read sets are not validated, so write skew between
//! transactions with disjoint write sets is possible.

mod manager;
mod state;
mod transaction;

pub use manager::TransactionManager;
pub use state::TransactionState;
pub use transaction::{Transaction, TransactionInfo};
