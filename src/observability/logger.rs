//! Structured JSON logger
//!
//! - One log line = one event
//! - `event` first, then `severity`, then fields in alphabetical order
//! - Synchronous, no buffering
//! - TRACE..WARN go to stdout, ERROR to stderr

use std::fmt;
use std::io::{self, Write};

use serde::{Deserialize, Serialize};

/// Log severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    /// Per-operation detail
    Trace = 0,
    /// Normal lifecycle events
    Info = 1,
    /// Misuse and conditions the host should look at
    Warn = 2,
    /// Invariant violations
    Error = 3,
}

impl Severity {
    /// Returns the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Trace => "TRACE",
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A structured logger that outputs JSON lines.
pub struct Logger;

impl Logger {
    /// Log an event if `severity` reaches `min_level`.
    pub fn log(min_level: Severity, severity: Severity, event: &str, fields: &[(&str, &str)]) {
        if severity < min_level {
            return;
        }
        let line = Self::render(severity, event, fields);
        // A failed log write must never fail a transaction.
        let _ = if severity >= Severity::Error {
            Self::write_line(&mut io::stderr().lock(), &line)
        } else {
            Self::write_line(&mut io::stdout().lock(), &line)
        };
    }

    fn write_line<W: Write>(writer: &mut W, line: &str) -> io::Result<()> {
        writer.write_all(line.as_bytes())?;
        writer.flush()
    }

    /// Render one event as a newline-terminated JSON object.
    pub fn render(severity: Severity, event: &str, fields: &[(&str, &str)]) -> String {
        let mut output = String::with_capacity(128);

        output.push_str("{\"event\":\"");
        escape_json_string(&mut output, event);
        output.push_str("\",\"severity\":\"");
        output.push_str(severity.as_str());
        output.push('"');

        let mut sorted_fields: Vec<_> = fields.iter().collect();
        sorted_fields.sort_by_key(|(k, _)| *k);

        for (key, value) in sorted_fields {
            output.push_str(",\"");
            escape_json_string(&mut output, key);
            output.push_str("\":\"");
            escape_json_string(&mut output, value);
            output.push('"');
        }

        output.push_str("}\n");
        output
    }
}

fn escape_json_string(output: &mut String, s: &str) {
    for c in s.chars() {
        match c {
            '"' => output.push_str("\\\""),
            '\\' => output.push_str("\\\\"),
            '\n' => output.push_str("\\n"),
            '\r' => output.push_str("\\r"),
            '\t' => output.push_str("\\t"),
            c if c.is_control() => output.push_str(&format!("\\u{:04x}", c as u32)),
            c => output.push(c),
        }
    }
}
