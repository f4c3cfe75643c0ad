//! CLI module for replink
//!
//! Provides command-line interface for:
//! - keygen: Create a pre-shared key file
//! - listen: Run a node and print received payloads
//! - send: Push one payload to a peer

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{keygen, listen, run, run_command, send};
pub use errors::{CliError, CliErrorCode, CliResult};
