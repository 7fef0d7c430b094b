//! Metrics registry
//!
//! - Counters only
//! - Monotonic increase
//! - Thread-safe, lock-free

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Operational counters for one transaction manager.
///
/// Relaxed ordering: counters are observational and never drive decisions.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    transactions_begun: AtomicU64,
    transactions_committed: AtomicU64,
    transactions_rolled_back: AtomicU64,
    write_conflicts: AtomicU64,
    misuse_errors: AtomicU64,
    reads: AtomicU64,
    writes: AtomicU64,
    versions_published: AtomicU64,
    vacuum_runs: AtomicU64,
    versions_reclaimed: AtomicU64,
}

impl MetricsRegistry {
    /// Create a new metrics registry with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_begun(&self) {
        self.transactions_begun.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_committed(&self) {
        self.transactions_committed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_rolled_back(&self) {
        self.transactions_rolled_back.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_conflicts(&self) {
        self.write_conflicts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_misuse(&self) {
        self.misuse_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_reads(&self) {
        self.reads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_writes(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_versions_published(&self, count: u64) {
        self.versions_published.fetch_add(count, Ordering::Relaxed);
    }

    /// Record one finished vacuum pass.
    pub fn record_vacuum(&self, reclaimed: u64) {
        self.vacuum_runs.fetch_add(1, Ordering::Relaxed);
        self.versions_reclaimed.fetch_add(reclaimed, Ordering::Relaxed);
    }

    /// Get all metrics as a snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            transactions_begun: self.transactions_begun.load(Ordering::Relaxed),
            transactions_committed: self.transactions_committed.load(Ordering::Relaxed),
            transactions_rolled_back: self.transactions_rolled_back.load(Ordering::Relaxed),
            write_conflicts: self.write_conflicts.load(Ordering::Relaxed),
            misuse_errors: self.misuse_errors.load(Ordering::Relaxed),
            reads: self.reads.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            versions_published: self.versions_published.load(Ordering::Relaxed),
            vacuum_runs: self.vacuum_runs.load(Ordering::Relaxed),
            versions_reclaimed: self.versions_reclaimed.load(Ordering::Relaxed),
        }
    }

    /// Current values as a JSON object
    pub fn to_json(&self) -> String {
        // Serializing a struct of integers cannot fail.
        serde_json::to_string(&self.snapshot()).unwrap_or_default()
    }
}

/// A point-in-time snapshot of all metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct MetricsSnapshot {
    pub transactions_begun: u64,
    pub transactions_committed: u64,
    pub transactions_rolled_back: u64,
    pub write_conflicts: u64,
    pub misuse_errors: u64,
    pub reads: u64,
    pub writes: u64,
    pub versions_published: u64,
    pub vacuum_runs: u64,
    pub versions_reclaimed: u64,
}
