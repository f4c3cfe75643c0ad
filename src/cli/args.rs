//! CLI argument definitions using clap
//!
//! Commands:
//! - replink keygen --out <path>
//! - replink listen --config <path> [--count N]
//! - replink send --config <path> --peer <addr> [--file <path>]

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// replink - authenticated point-to-point replication links
#[derive(Parser, Debug)]
#[command(name = "replink")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate a fresh pre-shared key file
    Keygen {
        /// Where to write the base64 key
        #[arg(long)]
        out: PathBuf,
    },

    /// Run a node and print every payload it receives
    Listen {
        /// Path to configuration file
        #[arg(long, default_value = "./replink.json")]
        config: PathBuf,

        /// Exit after this many payloads
        #[arg(long)]
        count: Option<usize>,
    },

    /// Send one payload to a peer and wait for its ack
    Send {
        /// Path to configuration file
        #[arg(long, default_value = "./replink.json")]
        config: PathBuf,

        /// Peer address, host:port
        #[arg(long)]
        peer: String,

        /// Payload file (stdin when omitted)
        #[arg(long)]
        file: Option<PathBuf>,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
