//! Byte-stream transports
//!
//! A connection only needs a reliable ordered duplex stream that can be
//! polled for readability without blocking. There is no framing at this
//! layer; message boundaries come from the tag codec.

mod memory;
mod tcp;

pub use memory::MemoryTransport;
pub use tcp::TcpTransport;

use std::io;

/// Reliable ordered duplex byte stream.
pub trait Transport {
    /// Whether a read would return immediately.
    ///
    /// Returns true at end-of-stream as well, so the following read can
    /// observe the zero-length result.
    fn has_data(&mut self) -> io::Result<bool>;

    /// Read up to `max` bytes. An empty result means the peer closed.
    fn read_bytes(&mut self, max: usize) -> io::Result<Vec<u8>>;

    /// Write the whole buffer.
    fn write_bytes(&mut self, buf: &[u8]) -> io::Result<()>;

    /// Release the stream. Idempotent.
    fn close(&mut self);

    /// Remote address for diagnostics.
    fn peer_addr(&self) -> String;
}
