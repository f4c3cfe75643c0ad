//! Log sinks
//!
//! The engine never writes to stdout directly; it hands each line to a
//! borrowed [`LogSink`].

use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};

use super::events::Event;
use super::logger::{Logger, Severity};

/// Destination for structured log lines.
pub trait LogSink: Send + Sync {
    /// Write one formatted line.
    fn write_line(&self, severity: Severity, line: &str);

    /// Format and write an event.
    fn log(&self, severity: Severity, event: Event, fields: &[(&str, &str)]) {
        let line = Logger::format_line(severity, event.as_str(), fields);
        self.write_line(severity, &line);
    }
}

/// Writes INFO and below to stdout, WARN and above to stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl LogSink for StdoutSink {
    fn write_line(&self, severity: Severity, line: &str) {
        // One write per line; a failing console is not a connection fault.
        if severity >= Severity::Warn {
            let mut err = io::stderr().lock();
            let _ = err.write_all(line.as_bytes());
            let _ = err.flush();
        } else {
            let mut out = io::stdout().lock();
            let _ = out.write_all(line.as_bytes());
            let _ = out.flush();
        }
    }
}

/// Keeps lines in memory.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    lines: Arc<Mutex<Vec<(Severity, String)>>>,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// All captured lines, oldest first.
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, line)| line.clone())
            .collect()
    }

    /// Whether any captured line names `event`.
    pub fn contains_event(&self, event: Event) -> bool {
        let needle = format!("\"event\":\"{}\"", event.as_str());
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|(_, line)| line.contains(&needle))
    }

    /// Number of lines at or above `severity`.
    pub fn count_at_least(&self, severity: Severity) -> usize {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(s, _)| *s >= severity)
            .count()
    }
}

impl LogSink for MemorySink {
    fn write_line(&self, severity: Severity, line: &str) {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((severity, line.to_string()));
    }
}
