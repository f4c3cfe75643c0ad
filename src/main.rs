//! replink CLI entry point
//!
//! Parses arguments and dispatches via `cli::run`. Errors print
//! `CODE: message` to stderr and exit non-zero.

use replink::cli;

fn main() {
    if let Err(e) = cli::run() {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
