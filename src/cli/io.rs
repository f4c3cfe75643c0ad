//! Payload and JSON line I/O for the CLI
//!
//! - Input: raw payload bytes from a file or stdin
//! - Output: one JSON object per line on stdout

use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::{json, Value};

use super::errors::{CliError, CliResult};
use crate::node::ReceivedPayload;

/// Read the payload from `file`, or all of stdin when `None`.
pub fn read_payload(file: Option<&Path>) -> CliResult<Vec<u8>> {
    match file {
        Some(path) => fs::read(path).map_err(|e| {
            CliError::io_error(format!("failed to read {}: {}", path.display(), e))
        }),
        None => {
            let mut buf = Vec::new();
            io::stdin().lock().read_to_end(&mut buf)?;
            Ok(buf)
        }
    }
}

/// JSON report for one received payload.
pub fn payload_record(received: &ReceivedPayload) -> Value {
    json!({
        "from": received.from,
        "payload": STANDARD.encode(&received.payload),
        "bytes": received.payload.len(),
    })
}

/// Write one JSON value as a line to stdout
pub fn write_json_line(value: &Value) -> CliResult<()> {
    let mut stdout = io::stdout();
    serde_json::to_writer(&mut stdout, value)?;
    writeln!(stdout)?;
    stdout.flush()?;

    Ok(())
}
