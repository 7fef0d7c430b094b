//! Observability subsystem
//!
//! This module provides:
//! - Structured logging (JSON lines)
//! - Typed lifecycle events
//! - Operational counters
//! - Observation scopes around vacuum passes
//!
//! # Principles
//!
//! 1. Observability is read-only: it never changes an outcome
//! 2. No background threads
//! 3. Deterministic output
//! 4. Filtered by a per-manager minimum severity

mod events;
mod logger;
mod metrics;
mod scope;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use metrics::{MetricsRegistry, MetricsSnapshot};
pub use scope::ObservationScope;

/// Log a typed event with fields, at the event's own severity.
pub fn log_event(min_level: Severity, event: Event, fields: &[(&str, &str)]) {
    Logger::log(min_level, event.severity(), event.as_str(), fields);
}
