//! Structured JSON log lines
//!
//! - One log line = one event
//! - Event name first, then severity, then fields in alphabetical order
//! - Synchronous, no buffering

use std::fmt;

/// Log severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Per-step protocol detail
    Trace = 0,
    /// Normal operations
    Info = 1,
    /// Connection-level faults (peer dropped, bad framing, failed auth)
    Warn = 2,
    /// Local failures
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

    /// Minimum connection verbosity at which this severity is emitted.
    ///
    /// Warnings and errors are always written.
    pub fn min_verbosity(&self) -> u8 {
        match self {
            Severity::Trace => 3,
            Severity::Info => 2,
            Severity::Warn | Severity::Error => 0,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Formats structured log lines.
pub struct Logger;

impl Logger {
    /// Render one event as a single JSON line (with trailing newline).
    ///
    /// `event` and `severity` lead; the remaining fields follow sorted by
    /// key so identical events always produce identical lines.
    pub fn format_line(severity: Severity, event: &str, fields: &[(&str, &str)]) -> String {
        let mut sorted: Vec<&(&str, &str)> = fields.iter().collect();
        sorted.sort_by_key(|(key, _)| *key);

        let head = [("event", event), ("severity", severity.as_str())];
        let members: Vec<String> = head
            .iter()
            .chain(sorted)
            .map(|(key, value)| format!("{}:{}", quoted(key), quoted(value)))
            .collect();
        format!("{{{}}}\n", members.join(","))
    }
}

/// JSON string literal for `text`, escapes included.
fn quoted(text: &str) -> String {
    serde_json::Value::from(text).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Trace < Severity::Info);
        assert!(Severity::Info < Severity::Warn);
        assert!(Severity::Warn < Severity::Error);
    }

    #[test]
    fn test_warnings_ignore_verbosity() {
        assert_eq!(Severity::Warn.min_verbosity(), 0);
        assert_eq!(Severity::Error.min_verbosity(), 0);
        assert!(Severity::Trace.min_verbosity() > Severity::Info.min_verbosity());
    }

    #[test]
    fn test_line_is_json() {
        let line = Logger::format_line(Severity::Info, "PAYLOAD_RECEIVED", &[("peer", "nodeA")]);

        let parsed: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed["event"], "PAYLOAD_RECEIVED");
        assert_eq!(parsed["severity"], "INFO");
        assert_eq!(parsed["peer"], "nodeA");
    }

    #[test]
    fn test_fields_sorted() {
        let a = Logger::format_line(Severity::Warn, "X", &[("zebra", "1"), ("apple", "2")]);
        let b = Logger::format_line(Severity::Warn, "X", &[("apple", "2"), ("zebra", "1")]);
        assert_eq!(a, b);
        assert!(a.find("apple").unwrap() < a.find("zebra").unwrap());
    }

    #[test]
    fn test_header_leads_fields() {
        let line = Logger::format_line(Severity::Error, "CONNECTION_LOST", &[("code", "X")]);
        assert_eq!(
            line,
            "{\"event\":\"CONNECTION_LOST\",\"severity\":\"ERROR\",\"code\":\"X\"}\n"
        );
    }

    #[test]
    fn test_escapes_control_and_quotes() {
        let line = Logger::format_line(Severity::Info, "X", &[("peer", "a\"b\u{1}\n")]);

        let parsed: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed["peer"], "a\"b\u{1}\n");
        assert_eq!(line.matches('\n').count(), 1);
    }
}
