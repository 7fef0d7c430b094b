//! snapkv - A transactional multi-version key-value store
//!
//! Snapshot isolation with optimistic concurrency control: transactions
//! read a consistent point-in-time view, buffer writes privately, and
//! commit atomically. A commit that would overwrite a newer concurrent
//! commit is rejected with `WriteConflict`. Vacuum reclaims versions no
//! current or future snapshot can read.

pub mod config;
pub mod error;
pub mod mvcc;
pub mod observability;
pub mod txn;

pub use config::{MvccConfig, VacuumPolicy};
pub use error::{MvccError, MvccErrorCode, MvccResult};
pub use mvcc::{CommitId, TxId, VacuumStats};
pub use txn::{TransactionInfo, TransactionManager, TransactionState};
