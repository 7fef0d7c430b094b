//! Store Configuration
//!
//! Sizing and policy knobs for a `TransactionManager`. Validated eagerly at
//! construction, never at operation time. Loading the document (file,
//! environment, flags) is the embedding host's business.

use serde::{Deserialize, Serialize};

use crate::error::{MvccError, MvccResult};
use crate::observability::Severity;

/// When vacuum runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum VacuumPolicy {
    /// Only when `TransactionManager::vacuum` is called.
    Manual,
    /// The committing thread runs a pass after every `commits` successful
    /// commits that published at least one version.
    EveryNCommits { commits: u64 },
}

impl Default for VacuumPolicy {
    fn default() -> Self {
        VacuumPolicy::Manual
    }
}

/// Transaction manager configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MvccConfig {
    /// Vacuum triggering policy (default: manual)
    pub vacuum_policy: VacuumPolicy,

    /// Age after which an Active transaction is reported as stale
    /// (default: 300 seconds)
    pub stale_transaction_threshold_secs: u64,

    /// Minimum severity written by the logger (default: ERROR)
    ///
    /// Log lines go to the process's stdout, or stderr for ERROR. Lowering
    /// this to WARN reports every misuse of a finished or unknown
    /// transaction as a `TXN_MISUSE` line.
    pub log_level: Severity,

    /// How many finished transactions are remembered for state queries
    /// (default: 1024)
    pub finished_history: usize,
}

impl Default for MvccConfig {
    fn default() -> Self {
        Self {
            vacuum_policy: VacuumPolicy::Manual,
            stale_transaction_threshold_secs: 300,
            log_level: Severity::Error,
            finished_history: 1024,
        }
    }
}

impl MvccConfig {
    /// Parse a JSON document and validate it.
    ///
    /// Missing fields take their defaults.
    pub fn from_json(document: &str) -> MvccResult<Self> {
        let config: MvccConfig = serde_json::from_str(document)
            .map_err(|e| MvccError::InvalidConfiguration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Config with automatic vacuum every `commits` commits.
    pub fn with_auto_vacuum(commits: u64) -> Self {
        Self {
            vacuum_policy: VacuumPolicy::EveryNCommits { commits },
            ..Self::default()
        }
    }

    /// Reject non-positive sizing parameters.
    pub fn validate(&self) -> MvccResult<()> {
        if let VacuumPolicy::EveryNCommits { commits: 0 } = self.vacuum_policy {
            return Err(MvccError::InvalidConfiguration(
                "vacuum_policy.commits must be positive".to_string(),
            ));
        }
        if self.stale_transaction_threshold_secs == 0 {
            return Err(MvccError::InvalidConfiguration(
                "stale_transaction_threshold_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// The stale-transaction threshold as a chrono duration.
    pub fn stale_threshold(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::try_from(self.stale_transaction_threshold_secs).unwrap_or(i64::MAX))
    }
}
