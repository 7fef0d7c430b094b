//! ObservationScope for automatic begin/complete logging
//!
//! - Logs `{name}_BEGIN` on creation
//! - Logs `{name}_COMPLETE` with the elapsed time on `complete`
//! - Logs `{name}_INCOMPLETE` on drop if never completed

use std::time::Instant;

use super::logger::{Logger, Severity};

/// A scope that automatically logs begin and complete events.
///
/// ```ignore
/// let scope = ObservationScope::new(Severity::Info, "VACUUM");
/// // ... do work ...
/// scope.complete_with_fields(&[("versions_reclaimed", "12")]);
/// ```
pub struct ObservationScope {
    name: &'static str,
    min_level: Severity,
    started: Instant,
    completed: bool,
}

impl ObservationScope {
    /// Create a new observation scope. Logs `{name}_BEGIN` at INFO.
    pub fn new(min_level: Severity, name: &'static str) -> Self {
        Logger::log(min_level, Severity::Info, &format!("{}_BEGIN", name), &[]);
        Self {
            name,
            min_level,
            started: Instant::now(),
            completed: false,
        }
    }

    /// Mark the scope as completed, logging `extra_fields` and `elapsed_us`.
    pub fn complete_with_fields(mut self, extra_fields: &[(&str, &str)]) {
        self.completed = true;
        let elapsed = self.started.elapsed().as_micros().to_string();

        let mut fields: Vec<(&str, &str)> = extra_fields.to_vec();
        fields.push(("elapsed_us", elapsed.as_str()));
        Logger::log(
            self.min_level,
            Severity::Info,
            &format!("{}_COMPLETE", self.name),
            &fields,
        );
    }

    /// Mark the scope as completed.
    pub fn complete(self) {
        self.complete_with_fields(&[]);
    }

    /// Check if the scope has been completed
    pub fn is_completed(&self) -> bool {
        self.completed
    }
}

impl Drop for ObservationScope {
    fn drop(&mut self) {
        if !self.completed {
            Logger::log(
                self.min_level,
                Severity::Warn,
                &format!("{}_INCOMPLETE", self.name),
                &[("reason", "scope dropped without completion")],
            );
        }
    }
}
