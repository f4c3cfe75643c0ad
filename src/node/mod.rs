//! Node driver
//!
//! Runs the external poll loop that connections expect: accept, step,
//! deliver, reap.

mod driver;

pub use driver::{Node, ReceivedPayload};
