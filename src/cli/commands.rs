//! CLI command implementations
//!
//! Each command loads its config, builds a stdout log sink and drives the
//! link until it finishes. Results go to stdout as JSON lines; logs go to
//! stdout/stderr by severity.

use std::fs;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use serde_json::json;

use crate::config::NodeConfig;
use crate::connection::{Connection, StepOutcome};
use crate::node::Node;
use crate::observability::{Event, LogSink, Severity, StdoutSink};
use crate::protocol::SharedKey;

use super::args::Command;
use super::errors::{CliError, CliResult};
use super::io::{payload_record, read_payload, write_json_line};

/// Pause between listener poll rounds.
const LISTEN_INTERVAL: Duration = Duration::from_millis(2);

/// Pause between sender steps.
const SEND_INTERVAL: Duration = Duration::from_millis(10);

/// Main CLI entry point
///
/// Parses arguments and dispatches to the appropriate command.
/// This is the only function that main.rs should call.
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Keygen { out } => keygen(&out),
        Command::Listen { config, count } => listen(&config, count),
        Command::Send { config, peer, file } => send(&config, &peer, file.as_deref()),
    }
}

/// Write a fresh random key as base64.
///
/// Refuses to overwrite an existing file.
pub fn keygen(out: &Path) -> CliResult<()> {
    if out.exists() {
        return Err(CliError::config_error(format!(
            "{} already exists; refusing to overwrite a key",
            out.display()
        )));
    }

    let key = SharedKey::generate().map_err(|e| CliError::config_error(e.to_string()))?;
    fs::write(out, format!("{}\n", key.to_base64()))
        .map_err(|e| CliError::io_error(format!("failed to write {}: {}", out.display(), e)))?;
    restrict_permissions(out)?;

    write_json_line(&json!({
        "status": "ok",
        "key_file": out.display().to_string(),
        "fingerprint": key.fingerprint(),
    }))
}

/// Run a node until `count` payloads have arrived (forever when `None`).
pub fn listen(config_path: &Path, count: Option<usize>) -> CliResult<()> {
    let sink = StdoutSink;
    let (config, key) = load(config_path, &sink)?;

    let mut node = Node::from_config(&config, &key, &sink)?;
    let mut delivered = 0usize;

    loop {
        for received in node.poll_once()? {
            write_json_line(&payload_record(&received))?;
            delivered += 1;
            if count.is_some_and(|n| delivered >= n) {
                return Ok(());
            }
        }
        thread::sleep(LISTEN_INTERVAL);
    }
}

/// Send one payload to `peer` and report whether it was acknowledged.
pub fn send(config_path: &Path, peer: &str, file: Option<&Path>) -> CliResult<()> {
    let sink = StdoutSink;
    let (config, key) = load(config_path, &sink)?;
    let payload = read_payload(file)?;

    let mut conn = Connection::connect(peer, config.node_id(), &key, &sink)?
        .with_verbosity(config.verbosity);
    conn.assign_outbound(&payload)?;

    let deadline = Instant::now() + config.idle_timeout();
    while conn.is_connected() {
        match conn.step()? {
            StepOutcome::Failed(e) => return Err(e.into()),
            StepOutcome::Advanced { .. } | StepOutcome::Pending | StepOutcome::Closed => {}
        }
        if Instant::now() > deadline {
            conn.disconnect();
            return Err(CliError::timeout(format!(
                "no progress from {} within {} ms",
                peer, config.idle_timeout_ms
            )));
        }
        thread::sleep(SEND_INTERVAL);
    }

    write_json_line(&json!({
        "status": "ok",
        "acknowledged": conn.was_acknowledged(),
        "bytes": payload.len(),
    }))
}

fn load(config_path: &Path, sink: &dyn LogSink) -> CliResult<(NodeConfig, SharedKey)> {
    let config = NodeConfig::load(config_path)?;
    let key = config.load_key()?;

    if config.verbosity >= Severity::Info.min_verbosity() {
        let path = config_path.display().to_string();
        sink.log(
            Severity::Info,
            Event::ConfigLoaded,
            &[("path", path.as_str()), ("key", key.fingerprint().as_str())],
        );
    }
    Ok((config, key))
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> CliResult<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> CliResult<()> {
    Ok(())
}
