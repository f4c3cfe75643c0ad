//! In-process duplex transport
//!
//! Two endpoints share a pair of byte queues. Used to run both ends of a
//! link inside one process (tests, embedding, local replication).

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::Transport;

#[derive(Debug, Default)]
struct Pipe {
    bytes: VecDeque<u8>,
    closed: bool,
}

/// One end of an in-memory duplex stream.
#[derive(Debug)]
pub struct MemoryTransport {
    inbound: Arc<Mutex<Pipe>>,
    outbound: Arc<Mutex<Pipe>>,
    label: String,
    open: bool,
}

impl MemoryTransport {
    /// Create two connected endpoints.
    pub fn pair() -> (MemoryTransport, MemoryTransport) {
        let a_to_b = Arc::new(Mutex::new(Pipe::default()));
        let b_to_a = Arc::new(Mutex::new(Pipe::default()));

        let a = MemoryTransport {
            inbound: Arc::clone(&b_to_a),
            outbound: Arc::clone(&a_to_b),
            label: "memory:a".to_string(),
            open: true,
        };
        let b = MemoryTransport {
            inbound: a_to_b,
            outbound: b_to_a,
            label: "memory:b".to_string(),
            open: true,
        };
        (a, b)
    }

    /// Bytes written by the peer and not yet read.
    pub fn pending(&self) -> usize {
        lock(&self.inbound).bytes.len()
    }

    /// Whether this endpoint is still open.
    pub fn is_open(&self) -> bool {
        self.open
    }

    fn not_connected() -> io::Error {
        io::Error::new(io::ErrorKind::NotConnected, "transport closed")
    }
}

fn lock(pipe: &Mutex<Pipe>) -> MutexGuard<'_, Pipe> {
    pipe.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Transport for MemoryTransport {
    fn has_data(&mut self) -> io::Result<bool> {
        if !self.open {
            return Ok(false);
        }
        let pipe = lock(&self.inbound);
        Ok(!pipe.bytes.is_empty() || pipe.closed)
    }

    fn read_bytes(&mut self, max: usize) -> io::Result<Vec<u8>> {
        if !self.open {
            return Err(Self::not_connected());
        }
        let mut pipe = lock(&self.inbound);
        let n = max.min(pipe.bytes.len());
        Ok(pipe.bytes.drain(..n).collect())
    }

    fn write_bytes(&mut self, buf: &[u8]) -> io::Result<()> {
        if !self.open {
            return Err(Self::not_connected());
        }
        let mut pipe = lock(&self.outbound);
        if pipe.closed {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "peer closed"));
        }
        pipe.bytes.extend(buf.iter().copied());
        Ok(())
    }

    fn close(&mut self) {
        if !self.open {
            return;
        }
        self.open = false;
        lock(&self.inbound).closed = true;
        lock(&self.outbound).closed = true;
    }

    fn peer_addr(&self) -> String {
        self.label.clone()
    }
}

impl Drop for MemoryTransport {
    fn drop(&mut self) {
        self.close();
    }
}
