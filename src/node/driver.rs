//! Poll loop over many connections
//!
//! The driver owns a non-blocking listener and every live connection. Each
//! `poll_once` accepts whatever is pending, steps each connection exactly
//! once, hands out completed payloads, and reaps links that are finished or
//! silent for too long. Nothing here blocks except message writes.

use std::io;
use std::net::{SocketAddr, TcpListener, ToSocketAddrs};
use std::time::{Duration, Instant};

use crate::config::NodeConfig;
use crate::connection::{Connection, ConnectionError, ConnectionResult, StepOutcome};
use crate::observability::{Event, LogSink, Severity};
use crate::protocol::SharedKey;
use crate::transport::{TcpTransport, Transport};

/// A payload delivered by a finished acceptor connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedPayload {
    /// Sender's node id
    pub from: String,
    /// Application bytes
    pub payload: Vec<u8>,
}

struct Tracked<'k> {
    conn: Connection<'k, TcpTransport>,
    last_activity: Instant,
}

/// A replication node: one listener, many connections.
pub struct Node<'k> {
    listener: TcpListener,
    local_id: String,
    key: &'k SharedKey,
    log: &'k dyn LogSink,
    verbosity: u8,
    idle_timeout: Duration,
    connections: Vec<Tracked<'k>>,
}

impl<'k> Node<'k> {
    /// Bind a non-blocking listener on `addr`.
    pub fn bind<A: ToSocketAddrs>(
        addr: A,
        local_id: impl Into<String>,
        key: &'k SharedKey,
        log: &'k dyn LogSink,
    ) -> ConnectionResult<Self> {
        let listener = TcpListener::bind(addr)
            .and_then(|l| l.set_nonblocking(true).map(|_| l))
            .map_err(|e| ConnectionError::transport_loss(format!("bind failed: {}", e)))?;

        let node = Self {
            listener,
            local_id: local_id.into(),
            key,
            log,
            verbosity: 1,
            idle_timeout: Duration::from_millis(30_000),
            connections: Vec::new(),
        };
        Ok(node)
    }

    /// Bind using the listen address, node id, verbosity and timeout from `config`.
    pub fn from_config(
        config: &NodeConfig,
        key: &'k SharedKey,
        log: &'k dyn LogSink,
    ) -> ConnectionResult<Self> {
        let node = Self::bind(config.listen_address.as_str(), config.node_id(), key, log)?
            .with_verbosity(config.verbosity)
            .with_idle_timeout(config.idle_timeout());
        node.announce();
        Ok(node)
    }

    /// Diagnostic level passed on to every connection.
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// How long a connection may go without a transition.
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Own node id.
    pub fn local_id(&self) -> &str {
        &self.local_id
    }

    /// Live connections, inbound and outbound.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Open an initiator connection to `addr` carrying `payload`.
    ///
    /// The transfer happens over subsequent `poll_once` calls.
    pub fn send_to<A: ToSocketAddrs>(&mut self, addr: A, payload: &[u8]) -> ConnectionResult<()> {
        let mut conn = Connection::connect(addr, self.local_id.clone(), self.key, self.log)?
            .with_verbosity(self.verbosity);
        conn.assign_outbound(payload)?;

        let peer = conn.peer_addr();
        self.emit(Severity::Info, Event::Connected, &[("addr", peer.as_str())]);
        self.track(conn);
        Ok(())
    }

    /// Accept, step every connection once, collect payloads, reap.
    ///
    /// Connection faults are logged and end that connection only. An
    /// invalid-state error is a driver bug and is returned.
    pub fn poll_once(&mut self) -> ConnectionResult<Vec<ReceivedPayload>> {
        self.accept_pending();

        let now = Instant::now();
        let mut received = Vec::new();
        for tracked in &mut self.connections {
            match tracked.conn.step()? {
                StepOutcome::Advanced { .. } => tracked.last_activity = now,
                StepOutcome::Failed(_) | StepOutcome::Pending | StepOutcome::Closed => {}
            }

            if tracked.conn.data_ready() {
                let from = tracked
                    .conn
                    .remote_id()
                    .map(str::to_string)
                    .unwrap_or_else(|| tracked.conn.peer_addr());
                if let Some(payload) = tracked.conn.take_payload() {
                    received.push(ReceivedPayload { from, payload });
                }
            }
        }

        self.reap(now);
        Ok(received)
    }

    /// Close every connection.
    pub fn shutdown(&mut self) {
        for tracked in &mut self.connections {
            tracked.conn.disconnect();
        }
        self.connections.clear();
    }

    fn accept_pending(&mut self) {
        loop {
            match TcpTransport::accept(&self.listener) {
                Ok(transport) => {
                    let peer = transport.peer_addr();
                    let conn =
                        Connection::acceptor(transport, self.local_id.clone(), self.key, self.log)
                            .with_verbosity(self.verbosity);
                    self.emit(Severity::Info, Event::Accepted, &[("addr", peer.as_str())]);
                    self.track(conn);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    let reason = e.to_string();
                    self.emit(Severity::Warn, Event::ConnectionLost, &[("reason", reason.as_str())]);
                    break;
                }
            }
        }
    }

    fn track(&mut self, conn: Connection<'k, TcpTransport>) {
        self.connections.push(Tracked {
            conn,
            last_activity: Instant::now(),
        });
    }

    /// Drop finished links and close ones idle past the timeout.
    fn reap(&mut self, now: Instant) {
        let timeout = self.idle_timeout;
        let mut expired = Vec::new();

        self.connections.retain_mut(|tracked| {
            if !tracked.conn.is_connected() {
                return false;
            }
            if now.duration_since(tracked.last_activity) > timeout {
                expired.push((tracked.conn.peer_addr(), tracked.conn.state().name()));
                tracked.conn.disconnect();
                return false;
            }
            true
        });

        for (peer, state) in expired {
            self.emit(
                Severity::Warn,
                Event::ConnectionReaped,
                &[("addr", peer.as_str()), ("state", state)],
            );
        }
    }

    fn announce(&self) {
        let addr = self
            .local_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());
        let fingerprint = self.key.fingerprint();
        self.emit(
            Severity::Info,
            Event::Listening,
            &[("addr", addr.as_str()), ("key", fingerprint.as_str())],
        );
    }

    fn emit(&self, severity: Severity, event: Event, fields: &[(&str, &str)]) {
        if self.verbosity < severity.min_verbosity() {
            return;
        }
        let mut all: Vec<(&str, &str)> = Vec::with_capacity(fields.len() + 1);
        all.push(("local", self.local_id.as_str()));
        all.extend_from_slice(fields);
        self.log.log(severity, event, &all);
    }
}

impl Drop for Node<'_> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
