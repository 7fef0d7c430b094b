//! MVCC Domain Types
//!
//! This module provides:
//! - `TxId`, `CommitId` - Transaction and commit identities
//! - `Version` - A single entry in a key's history
//! - `VersionChain` - Version history for a key
//! - `ReadView` - Stable snapshot boundary
//! - `Visibility` - The snapshot-read rule
//! - `CommitAuthority` - Id generators and the visible-commit watermark
//! - `VersionStore` - Per-key chains and the locked commit batch
//! - `Vacuum` - Reclamation of versions no snapshot can reach

mod commit_authority;
mod commit_id;
mod gc;
mod read_view;
mod version;
mod version_chain;
mod version_store;
mod visibility;

pub use commit_authority::CommitAuthority;
pub use commit_id::{CommitId, TxId};
pub use gc::{Vacuum, VacuumStats, VisibilityFloor};
pub use read_view::ReadView;
pub use version::{Version, VersionPayload};
pub use version_chain::VersionChain;
pub use version_store::{CommitBatch, VersionStore};
pub use visibility::{Visibility, VisibilityResult};
