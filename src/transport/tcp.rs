//! TCP transport over a non-blocking `std::net::TcpStream`

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpListener, TcpStream, ToSocketAddrs};

use super::Transport;

/// Non-blocking TCP stream.
#[derive(Debug)]
pub struct TcpTransport {
    stream: Option<TcpStream>,
    peer: String,
}

impl TcpTransport {
    /// Dial `addr` and switch the socket to non-blocking mode.
    pub fn connect<A: ToSocketAddrs>(addr: A) -> io::Result<Self> {
        Self::from_stream(TcpStream::connect(addr)?)
    }

    /// Accept one pending connection from a listener.
    ///
    /// With a non-blocking listener this fails with `WouldBlock` when nothing
    /// is pending.
    pub fn accept(listener: &TcpListener) -> io::Result<Self> {
        let (stream, _) = listener.accept()?;
        Self::from_stream(stream)
    }

    /// Adopt an already connected stream.
    pub fn from_stream(stream: TcpStream) -> io::Result<Self> {
        stream.set_nonblocking(true)?;
        stream.set_nodelay(true)?;
        let peer = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());
        Ok(Self {
            stream: Some(stream),
            peer,
        })
    }

    fn stream(&mut self) -> io::Result<&mut TcpStream> {
        self.stream
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "transport closed"))
    }
}

impl Transport for TcpTransport {
    fn has_data(&mut self) -> io::Result<bool> {
        let Some(stream) = self.stream.as_mut() else {
            return Ok(false);
        };
        let mut peeked = [0u8; 1];
        match stream.peek(&mut peeked) {
            // Zero bytes is end-of-stream, which the next read must see.
            Ok(_) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn read_bytes(&mut self, max: usize) -> io::Result<Vec<u8>> {
        let stream = self.stream()?;
        let mut buf = vec![0u8; max];
        let n = stream.read(&mut buf)?;
        buf.truncate(n);
        Ok(buf)
    }

    fn write_bytes(&mut self, buf: &[u8]) -> io::Result<()> {
        let stream = self.stream()?;
        // Messages are written whole; blocking only for the duration of the write.
        stream.set_nonblocking(false)?;
        let result = stream.write_all(buf).and_then(|_| stream.flush());
        stream.set_nonblocking(true)?;
        result
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(Shutdown::Both);
        }
    }

    fn peer_addr(&self) -> String {
        self.peer.clone()
    }
}
