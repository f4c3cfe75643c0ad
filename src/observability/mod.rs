//! Observability for replication links
//!
//! - Structured logging (one JSON object per line)
//! - Typed event names
//! - Pluggable sinks so tests can assert on what a connection reported
//!
//! # Usage
//!
//! ```ignore
//! use replink::observability::{Event, LogSink, Severity, StdoutSink};
//!
//! StdoutSink.log(Severity::Info, Event::Listening, &[("addr", "127.0.0.1:9100")]);
//! ```

mod events;
mod logger;
mod sink;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use sink::{LogSink, MemorySink, StdoutSink};
