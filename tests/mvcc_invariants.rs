//! MVCC Invariant Tests
//!
//! Tests for core MVCC invariants:
//! - Version immutability once committed
//! - At most one uncommitted version per key
//! - Commit ordering and the visible watermark
//! - Compaction keeps what snapshots can still reach

use std::sync::Arc;
use std::thread;

use snapkv::mvcc::{CommitAuthority, CommitId, ReadView, TxId, Version, VersionChain, VersionPayload};
use snapkv::MvccError;

// =============================================================================
// Version Immutability Tests
// =============================================================================

/// Committed versions carry both identities and compare by value.
#[test]
fn test_version_identities() {
    let version = Version::committed(VersionPayload::Value("original"), TxId::new(3), CommitId::new(1));

    assert_eq!(version.creator_tx(), TxId::new(3));
    assert_eq!(version.commit_tx(), Some(CommitId::new(1)));
    assert!(version.is_committed());
    assert!(!version.is_tombstone());

    let cloned = version.clone();
    assert_eq!(version, cloned);
}

/// Tombstones are explicit versions, not missing data.
#[test]
fn test_tombstone_is_explicit_version() {
    let tombstone: Version<String> = Version::committed(VersionPayload::Tombstone, TxId::new(2), CommitId::new(5));

    assert!(tombstone.is_tombstone());
    assert_eq!(tombstone.commit_tx(), Some(CommitId::new(5)));
    assert!(matches!(tombstone.payload(), VersionPayload::Tombstone));
}

/// Payload is preserved exactly.
#[test]
fn test_payload_preserved() {
    let data = b"complex data with special chars: \x00\x01\x02".to_vec();
    let version = Version::committed(VersionPayload::Value(data.clone()), TxId::new(1), CommitId::new(10));

    match version.payload() {
        VersionPayload::Value(d) => assert_eq!(d, &data),
        VersionPayload::Tombstone => panic!("Expected value, got tombstone"),
    }
}

/// Publishing never rewrites an already committed version.
#[test]
fn test_committed_versions_unchanged_by_later_commits() {
    let mut chain = VersionChain::new();
    chain.stage(TxId::new(1), VersionPayload::Value("first")).unwrap();
    chain.publish(TxId::new(1), CommitId::new(1));
    let before = chain.committed_versions()[0].clone();

    chain.stage(TxId::new(2), VersionPayload::Value("second")).unwrap();
    chain.publish(TxId::new(2), CommitId::new(2));

    assert_eq!(chain.committed_versions()[0], before);
    assert_eq!(chain.committed_versions().len(), 2);
}

// =============================================================================
// Pending Version Tests
// =============================================================================

/// A transaction restaging a key overwrites its own pending version.
#[test]
fn test_restage_overwrites_own_pending() {
    let mut chain = VersionChain::new();
    chain.stage(TxId::new(1), VersionPayload::Value(1)).unwrap();
    chain.stage(TxId::new(1), VersionPayload::Value(2)).unwrap();

    assert_eq!(chain.len(), 1);
    assert_eq!(chain.pending().unwrap().payload(), &VersionPayload::Value(2));
    assert!(!chain.pending().unwrap().is_committed());
}

/// A second transaction cannot stage while another's version is pending.
#[test]
fn test_single_pending_version_per_key() {
    let mut chain = VersionChain::new();
    chain.stage(TxId::new(1), VersionPayload::Value(1)).unwrap();

    let err = chain.stage(TxId::new(2), VersionPayload::Value(2)).unwrap_err();
    assert_eq!(
        err,
        MvccError::PendingVersionExists {
            creator: TxId::new(1),
            requested_by: TxId::new(2),
        }
    );

    assert!(chain.discard(TxId::new(1)));
    chain.stage(TxId::new(2), VersionPayload::Value(2)).unwrap();
}

/// Publish and discard only touch the named transaction's version.
#[test]
fn test_publish_requires_creator() {
    let mut chain = VersionChain::new();
    chain.stage(TxId::new(1), VersionPayload::Value(1)).unwrap();

    assert!(!chain.publish(TxId::new(2), CommitId::new(1)));
    assert!(!chain.discard(TxId::new(2)));
    assert!(chain.pending().is_some());
    assert_eq!(chain.latest_committed(), None);
}

// =============================================================================
// CommitId Ordering Tests
// =============================================================================

#[test]
fn test_commit_id_ordering() {
    let c1 = CommitId::new(1);
    let c5 = CommitId::new(5);
    let c10 = CommitId::new(10);

    assert!(c1 < c5);
    assert!(c5 < c10);
    assert_eq!(CommitId::new(42), CommitId::new(42));
    assert_eq!(c5.next(), CommitId::new(6));
}

/// Commit ids are strictly monotonic.
#[test]
fn test_commits_strictly_monotonic() {
    let authority = CommitAuthority::new();
    for i in 1..=10 {
        let next = authority.allocate();
        assert_eq!(next, CommitId::new(i));
        authority.mark_published(next);
    }
    assert_eq!(authority.watermark(), CommitId::new(10));
}

/// The watermark never passes a commit that is still publishing.
#[test]
fn test_watermark_waits_for_gaps() {
    let authority = CommitAuthority::new();
    let c1 = authority.allocate();
    let c2 = authority.allocate();
    let c3 = authority.allocate();

    authority.mark_published(c3);
    authority.mark_published(c2);
    assert_eq!(authority.watermark(), CommitId::ZERO);

    authority.mark_published(c1);
    assert_eq!(authority.watermark(), c3);
    assert_eq!(authority.current_snapshot(), ReadView::new(c3));
}

/// Transaction ids are unique and increasing across threads.
#[test]
fn test_tx_ids_unique_across_threads() {
    let authority = Arc::new(CommitAuthority::new());
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let authority = Arc::clone(&authority);
            thread::spawn(move || (0..500).map(|_| authority.next_tx_id()).collect::<Vec<_>>())
        })
        .collect();

    let mut ids: Vec<TxId> = handles.into_iter().flat_map(|h| h.join().unwrap()).collect();
    for per_thread in ids.chunks(500) {
        assert!(per_thread.windows(2).all(|w| w[0] < w[1]));
    }
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 8 * 500);
    assert_eq!(ids.last(), Some(&TxId::new(4000)));
}

// =============================================================================
// Compaction Tests
// =============================================================================

fn chain_with_commits(commits: &[u64]) -> VersionChain<u64> {
    let mut chain = VersionChain::new();
    for &c in commits {
        chain.stage(TxId::new(c), VersionPayload::Value(c)).unwrap();
        chain.publish(TxId::new(c), CommitId::new(c));
    }
    chain
}

/// Compaction keeps the newest version at or below the boundary and
/// everything newer.
#[test]
fn test_compact_keeps_boundary_version_and_newer() {
    let mut chain = chain_with_commits(&[1, 3, 5, 7, 9]);

    assert_eq!(chain.compact(CommitId::new(6)), 2);

    let kept: Vec<_> = chain
        .committed_versions()
        .iter()
        .filter_map(Version::commit_tx)
        .map(|c| c.value())
        .collect();
    assert_eq!(kept, vec![5, 7, 9]);
}

/// Every view at or above the boundary resolves identically after compaction.
#[test]
fn test_compact_preserves_reachable_views() {
    let mut chain = chain_with_commits(&[2, 4, 6, 8]);
    let before: Vec<_> = (5..=10)
        .map(|at| chain.visible_version(ReadView::new(CommitId::new(at))).version().cloned())
        .collect();

    chain.compact(CommitId::new(5));

    let after: Vec<_> = (5..=10)
        .map(|at| chain.visible_version(ReadView::new(CommitId::new(at))).version().cloned())
        .collect();
    assert_eq!(before, after);
}

/// Nothing at or below the boundary: nothing is removed.
#[test]
fn test_compact_without_old_versions() {
    let mut chain = chain_with_commits(&[10, 11]);
    assert_eq!(chain.compact(CommitId::new(5)), 0);
    assert_eq!(chain.len(), 2);
}

/// The pending slot survives compaction.
#[test]
fn test_compact_keeps_pending() {
    let mut chain = chain_with_commits(&[1, 2]);
    chain.stage(TxId::new(50), VersionPayload::Value(50)).unwrap();

    chain.compact(CommitId::new(2));

    assert_eq!(chain.committed_versions().len(), 1);
    assert!(chain.pending().is_some());
    assert!(!chain.is_dead_at(CommitId::new(2)));
}
