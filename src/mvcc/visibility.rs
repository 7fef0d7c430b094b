//! MVCC Visibility - Snapshot-read rule
//!
//! Given a read view `R` and the version chain of key `K`, the visible
//! version `V*` is defined as:
//! 1. Consider only committed versions where `V.commit_tx ≤ R.upper_bound`
//! 2. From those, select the version with the largest `commit_tx`
//! 3. If that version is a tombstone, `K` is absent
//!
//! Uncommitted versions are never visible through this rule. A
//! transaction's own writes are served from its private write buffer
//! before this rule is consulted.

use super::{ReadView, Version, VersionChain};

/// Result of visibility evaluation for a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VisibilityResult<'a, V> {
    /// A visible value version exists.
    Visible(&'a Version<V>),
    /// Key is absent (no eligible versions, or the newest eligible is a tombstone).
    Invisible,
}

impl<'a, V> VisibilityResult<'a, V> {
    /// Returns the visible version if any.
    pub fn version(&self) -> Option<&'a Version<V>> {
        match self {
            VisibilityResult::Visible(v) => Some(v),
            VisibilityResult::Invisible => None,
        }
    }

    /// Returns true if visible.
    pub fn is_visible(&self) -> bool {
        matches!(self, VisibilityResult::Visible(_))
    }
}

/// Stateless visibility resolver.
///
/// Visibility is evaluated identically every time for identical inputs.
pub struct Visibility;

impl Visibility {
    /// Evaluates visibility for a version chain given a read view.
    ///
    /// Committed versions are stored in ascending commit order, so the walk
    /// goes from the back and stops at the first eligible version.
    pub fn visible_version<V>(chain: &VersionChain<V>, view: ReadView) -> VisibilityResult<'_, V> {
        let visible = chain
            .committed_versions()
            .iter()
            .rev()
            .find(|v| v.commit_tx().map_or(false, |c| view.includes(c)));

        match visible {
            Some(version) if !version.is_tombstone() => VisibilityResult::Visible(version),
            _ => VisibilityResult::Invisible,
        }
    }
}
