//! replink - authenticated point-to-point replication links
//!
//! Each link is a [`connection::Connection`]: a non-blocking state machine
//! that runs a pre-shared-key mutual handshake and then moves one opaque
//! payload from the initiator to the acceptor, acknowledged.
//!
//! - `protocol`: tag codec, AES-128-CFB envelope, shared key
//! - `transport`: byte-stream abstraction over TCP or in-memory pipes
//! - `connection`: per-peer state machine
//! - `node`: poll loop over a listener and many connections
//! - `config`, `observability`, `cli`: ambient plumbing

pub mod cli;
pub mod config;
pub mod connection;
pub mod node;
pub mod observability;
pub mod protocol;
pub mod transport;
