//! Replication link connections
//!
//! One [`Connection`] per peer. A driver calls [`Connection::step`]
//! repeatedly; each call performs at most one state transition and never
//! blocks waiting for the network.
//!
//! Message boundaries: a read drains every byte the transport currently has
//! buffered into a per-connection backlog, then takes the first complete
//! frame of the expected tag off its front. Bytes after that frame stay in
//! the backlog for the next step, so two messages that arrive in one read
//! (the initiator sends its sealed response and its own challenge back to
//! back) are still handled one per step. A single message must arrive
//! within one read episode; a frame cut short is a framing fault.
//!
//! Faults (transport loss, framing, authentication) are logged with the
//! remote node id when known and end the connection. They are reported as
//! [`StepOutcome::Failed`], never as `Err`. Only invalid-state errors escape
//! `step`.

mod errors;
mod handshake;
mod state;
mod transfer;

pub use errors::{ConnectionError, ConnectionErrorKind, ConnectionResult};
pub use state::{AcceptorState, ConnectionState, InitiatorState, Role};

use std::net::{TcpListener, ToSocketAddrs};

use crate::observability::{Event, LogSink, Severity};
use crate::protocol::{SharedKey, Tag};
use crate::transport::{TcpTransport, Transport};

/// Bytes requested per transport read.
const READ_CHUNK: usize = 1024;

/// Result of one [`Connection::step`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Nothing to do yet; no state or field changed
    Pending,
    /// Exactly one transition was made
    Advanced {
        /// State before the step
        from: ConnectionState,
        /// State after the step
        to: ConnectionState,
    },
    /// The step hit a connection-level fault and the link was closed
    Failed(ConnectionError),
    /// The link is already closed
    Closed,
}

/// Per-peer protocol engine.
pub struct Connection<'k, T: Transport> {
    transport: T,
    role: Role,
    state: ConnectionState,
    local_id: String,
    remote_id: Option<String>,
    key: &'k SharedKey,
    /// Nonce generated or relayed by the current handshake step.
    challenge: Vec<u8>,
    inbound: Option<Vec<u8>>,
    /// Bytes read from the transport that no step has consumed yet.
    backlog: Vec<u8>,
    /// Staged payload, already wrapped in `REP` tags.
    outbound: Option<Vec<u8>>,
    data_ready: bool,
    acknowledged: bool,
    connected: bool,
    verbosity: u8,
    log: &'k dyn LogSink,
}

impl<'k> Connection<'k, TcpTransport> {
    /// Dial `addr` and start an initiator connection.
    pub fn connect<A: ToSocketAddrs>(
        addr: A,
        local_id: impl Into<String>,
        key: &'k SharedKey,
        log: &'k dyn LogSink,
    ) -> ConnectionResult<Self> {
        let transport = TcpTransport::connect(addr)
            .map_err(|e| ConnectionError::transport_loss(format!("connect failed: {}", e)))?;
        Ok(Self::initiator(transport, local_id, key, log))
    }

    /// Accept one pending inbound connection as the acceptor.
    pub fn accept(
        listener: &TcpListener,
        local_id: impl Into<String>,
        key: &'k SharedKey,
        log: &'k dyn LogSink,
    ) -> ConnectionResult<Self> {
        let transport = TcpTransport::accept(listener)
            .map_err(|e| ConnectionError::transport_loss(format!("accept failed: {}", e)))?;
        Ok(Self::acceptor(transport, local_id, key, log))
    }
}

impl<'k, T: Transport> Connection<'k, T> {
    /// Wrap a freshly connected transport as the initiator.
    pub fn initiator(
        transport: T,
        local_id: impl Into<String>,
        key: &'k SharedKey,
        log: &'k dyn LogSink,
    ) -> Self {
        Self::new(Role::Initiator, transport, local_id.into(), key, log)
    }

    /// Wrap a freshly accepted transport as the acceptor.
    pub fn acceptor(
        transport: T,
        local_id: impl Into<String>,
        key: &'k SharedKey,
        log: &'k dyn LogSink,
    ) -> Self {
        Self::new(Role::Acceptor, transport, local_id.into(), key, log)
    }

    fn new(
        role: Role,
        transport: T,
        local_id: String,
        key: &'k SharedKey,
        log: &'k dyn LogSink,
    ) -> Self {
        Self {
            transport,
            role,
            state: ConnectionState::entry(role),
            local_id,
            remote_id: None,
            key,
            challenge: Vec::new(),
            inbound: None,
            backlog: Vec::new(),
            outbound: None,
            data_ready: false,
            acknowledged: false,
            connected: true,
            verbosity: 1,
            log,
        }
    }

    /// Set the diagnostic detail level (0-3).
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Advance the connection by at most one state.
    pub fn step(&mut self) -> ConnectionResult<StepOutcome> {
        if self.state == ConnectionState::Idle {
            return Err(ConnectionError::invalid_state(
                "step called after the received payload was taken",
            ));
        }
        if !self.connected {
            return Ok(StepOutcome::Closed);
        }

        if self.state.needs_inbound() && self.backlog.is_empty() {
            match self.transport.has_data() {
                Ok(true) => {}
                Ok(false) => return Ok(StepOutcome::Pending),
                Err(e) => return Ok(self.fail(e.into())),
            }
        }

        let from = self.state;
        let result = match from {
            ConnectionState::Initiator(s) => self
                .step_initiator(s)
                .map(|next| next.map(ConnectionState::Initiator)),
            ConnectionState::Acceptor(s) => self
                .step_acceptor(s)
                .map(|next| next.map(ConnectionState::Acceptor)),
            ConnectionState::Idle => Err(ConnectionError::invalid_state("idle connection stepped")),
        };

        match result {
            Ok(Some(to)) => {
                self.advance(to)?;
                Ok(StepOutcome::Advanced { from, to })
            }
            Ok(None) => Ok(StepOutcome::Pending),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => Ok(self.fail(e)),
        }
    }

    fn step_initiator(&mut self, state: InitiatorState) -> ConnectionResult<Option<InitiatorState>> {
        use InitiatorState::*;
        let next = match state {
            Connecting => self.send_greeting()?,
            WaitChallengeB => self.receive_challenge_b()?,
            SendEncryptedChallengeB => self.return_challenge_b()?,
            SendChallengeA => self.issue_challenge_a()?,
            WaitEncryptedChallengeA => self.verify_challenge_a()?,
            TransmitData => return self.transmit(),
            WaitAck => self.await_ack()?,
            Closed => return Ok(None),
        };
        Ok(Some(next))
    }

    fn step_acceptor(&mut self, state: AcceptorState) -> ConnectionResult<Option<AcceptorState>> {
        use AcceptorState::*;
        let next = match state {
            Accepted => self.receive_greeting()?,
            SendChallengeB => self.issue_challenge_b()?,
            WaitEncryptedChallengeB => self.verify_challenge_b()?,
            WaitChallengeA => self.answer_challenge_a()?,
            AwaitConfirmation => self.confirm_peer()?,
            ReceiveData => self.receive()?,
            HasData => return Ok(None),
        };
        Ok(Some(next))
    }

    fn advance(&mut self, to: ConnectionState) -> ConnectionResult<()> {
        if !self.state.can_advance_to(to) {
            return Err(ConnectionError::invalid_state(format!(
                "illegal transition {} -> {}",
                self.state, to
            )));
        }
        let from = self.state;
        self.state = to;
        self.emit(
            Severity::Trace,
            Event::StateAdvanced,
            &[("from", from.name()), ("to", to.name())],
        );
        Ok(())
    }

    /// Log the fault, close the link, and report it.
    fn fail(&mut self, error: ConnectionError) -> StepOutcome {
        let event = match error.kind {
            ConnectionErrorKind::TransportLoss => Event::ConnectionLost,
            ConnectionErrorKind::Framing => Event::FramingRejected,
            ConnectionErrorKind::Authentication => Event::AuthenticationFailed,
            ConnectionErrorKind::InvalidState => Event::Disconnected,
        };
        self.emit(
            Severity::Warn,
            event,
            &[
                ("state", self.state.name()),
                ("code", error.kind.code()),
                ("reason", error.message.as_str()),
            ],
        );
        self.disconnect();
        StepOutcome::Failed(error)
    }

    /// Release the transport. Received payloads stay retrievable.
    pub fn disconnect(&mut self) {
        if !self.connected {
            return;
        }
        self.transport.close();
        self.connected = false;
        self.emit(Severity::Info, Event::Disconnected, &[("state", self.state.name())]);
    }

    /// Whether the link is still open.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Stage the application payload for an initiator.
    ///
    /// Must happen before the transfer step sends it.
    pub fn assign_outbound(&mut self, payload: &[u8]) -> ConnectionResult<()> {
        let staged = matches!(
            self.state,
            ConnectionState::Initiator(InitiatorState::WaitAck | InitiatorState::Closed)
        );
        if self.role != Role::Initiator || staged {
            return Err(ConnectionError::invalid_state(format!(
                "cannot stage outbound payload in state {}",
                self.state
            )));
        }
        self.outbound = Some(Tag::Rep.wrap(payload));
        Ok(())
    }

    /// Take the received payload, if one is ready.
    ///
    /// Clears `data_ready` and moves the connection to `Idle`.
    pub fn take_payload(&mut self) -> Option<Vec<u8>> {
        if !self.data_ready {
            return None;
        }
        self.data_ready = false;
        self.state = ConnectionState::Idle;
        self.inbound.take()
    }

    /// Whether a complete, unread payload is held.
    pub fn data_ready(&self) -> bool {
        self.data_ready
    }

    /// Whether the initiator saw the ack marker before closing.
    pub fn was_acknowledged(&self) -> bool {
        self.acknowledged
    }

    /// Current protocol state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Role fixed at creation.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Own node id.
    pub fn local_id(&self) -> &str {
        &self.local_id
    }

    /// Peer node id, once announced.
    pub fn remote_id(&self) -> Option<&str> {
        self.remote_id.as_deref()
    }

    /// Peer transport address.
    pub fn peer_addr(&self) -> String {
        self.transport.peer_addr()
    }

    // =========================================================================
    // TRANSPORT PRIMITIVES
    // =========================================================================

    /// Move everything the transport has buffered onto the backlog.
    fn fill_backlog(&mut self) -> ConnectionResult<()> {
        while self.transport.has_data()? {
            let chunk = self.transport.read_bytes(READ_CHUNK)?;
            if chunk.is_empty() {
                if self.backlog.is_empty() {
                    return Err(ConnectionError::transport_loss(format!(
                        "connection to {} lost",
                        self.transport.peer_addr()
                    )));
                }
                // Peer closed after its last message; the next read sees the loss.
                break;
            }
            self.backlog.extend_from_slice(&chunk);
        }
        Ok(())
    }

    /// Everything received so far, as one message.
    fn read_message(&mut self) -> ConnectionResult<Vec<u8>> {
        self.fill_backlog()?;
        Ok(std::mem::take(&mut self.backlog))
    }

    /// Payload of the next `tag` frame. Later bytes stay on the backlog.
    fn read_tagged(&mut self, tag: Tag) -> ConnectionResult<Vec<u8>> {
        self.fill_backlog()?;
        let (payload, used) = tag.split_frame(&self.backlog)?;
        let payload = payload.to_vec();
        self.backlog.drain(..used);
        Ok(payload)
    }

    fn send(&mut self, bytes: &[u8]) -> ConnectionResult<()> {
        self.transport.write_bytes(bytes)?;
        let len = bytes.len().to_string();
        self.emit(Severity::Trace, Event::MessageSent, &[("bytes", len.as_str())]);
        Ok(())
    }

    fn send_tagged(&mut self, tag: Tag, payload: &[u8]) -> ConnectionResult<()> {
        self.send(&tag.wrap(payload))
    }

    /// Log with the node ids attached, filtered by verbosity.
    fn emit(&self, severity: Severity, event: Event, fields: &[(&str, &str)]) {
        if self.verbosity < severity.min_verbosity() {
            return;
        }
        let mut all: Vec<(&str, &str)> = Vec::with_capacity(fields.len() + 3);
        all.push(("local", self.local_id.as_str()));
        all.push(("peer", self.remote_id.as_deref().unwrap_or("unknown")));
        all.push(("role", self.role.as_str()));
        all.extend_from_slice(fields);
        self.log.log(severity, event, &all);
    }
}

impl<T: Transport> Drop for Connection<'_, T> {
    fn drop(&mut self) {
        if self.connected {
            self.transport.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::MemorySink;
    use crate::transport::MemoryTransport;

    fn key() -> SharedKey {
        SharedKey::from_bytes(&[5u8; 16]).unwrap()
    }

    #[test]
    fn test_role_selects_entry_state() {
        let k = key();
        let sink = MemorySink::new();
        let (a, b) = MemoryTransport::pair();

        let init = Connection::initiator(a, "nodeA", &k, &sink);
        let acc = Connection::acceptor(b, "nodeB", &k, &sink);

        assert_eq!(init.role(), Role::Initiator);
        assert_eq!(init.state(), ConnectionState::Initiator(InitiatorState::Connecting));
        assert_eq!(acc.state(), ConnectionState::Acceptor(AcceptorState::Accepted));
        assert!(init.is_connected());
        assert!(acc.remote_id().is_none());
    }

    #[test]
    fn test_step_without_data_is_noop() {
        let k = key();
        let sink = MemorySink::new();
        let (_peer, b) = MemoryTransport::pair();
        let mut acc = Connection::acceptor(b, "nodeB", &k, &sink);

        assert_eq!(acc.step().unwrap(), StepOutcome::Pending);
        assert_eq!(acc.state(), ConnectionState::Acceptor(AcceptorState::Accepted));
        assert!(acc.is_connected());
        assert!(!acc.data_ready());
    }

    #[test]
    fn test_send_state_advances_without_data() {
        let k = key();
        let sink = MemorySink::new();
        let (a, mut peer) = MemoryTransport::pair();
        let mut init = Connection::initiator(a, "nodeA", &k, &sink);

        let outcome = init.step().unwrap();
        assert_eq!(
            outcome,
            StepOutcome::Advanced {
                from: ConnectionState::Initiator(InitiatorState::Connecting),
                to: ConnectionState::Initiator(InitiatorState::WaitChallengeB),
            }
        );
        assert_eq!(peer.read_bytes(1024).unwrap(), b"<SID>nodeA</SID>");
    }

    #[test]
    fn test_peer_close_is_transport_loss() {
        let k = key();
        let sink = MemorySink::new();
        let (mut peer, b) = MemoryTransport::pair();
        let mut acc = Connection::acceptor(b, "nodeB", &k, &sink);

        peer.close();
        match acc.step().unwrap() {
            StepOutcome::Failed(e) => assert_eq!(e.kind, ConnectionErrorKind::TransportLoss),
            other => panic!("unexpected outcome {:?}", other),
        }
        assert!(!acc.is_connected());
        assert!(sink.contains_event(Event::ConnectionLost));
        assert_eq!(acc.step().unwrap(), StepOutcome::Closed);
    }

    #[test]
    fn test_disconnect_is_idempotent() {
        let k = key();
        let sink = MemorySink::new();
        let (a, _peer) = MemoryTransport::pair();
        let mut init = Connection::initiator(a, "nodeA", &k, &sink).with_verbosity(2);

        init.disconnect();
        init.disconnect();
        assert!(!init.is_connected());
        let disconnects = sink
            .lines()
            .iter()
            .filter(|l| l.contains("\"DISCONNECTED\""))
            .count();
        assert_eq!(disconnects, 1);
    }

    #[test]
    fn test_acceptor_cannot_stage_outbound() {
        let k = key();
        let sink = MemorySink::new();
        let (_a, b) = MemoryTransport::pair();
        let mut acc = Connection::acceptor(b, "nodeB", &k, &sink);

        let err = acc.assign_outbound(b"data").unwrap_err();
        assert_eq!(err.kind, ConnectionErrorKind::InvalidState);
    }

    #[test]
    fn test_take_payload_when_not_ready() {
        let k = key();
        let sink = MemorySink::new();
        let (_a, b) = MemoryTransport::pair();
        let mut acc = Connection::acceptor(b, "nodeB", &k, &sink);

        assert!(acc.take_payload().is_none());
        assert_eq!(acc.state(), ConnectionState::Acceptor(AcceptorState::Accepted));
    }

    #[test]
    fn test_verbosity_filters_detail() {
        let k = key();
        let quiet = MemorySink::new();
        let loud = MemorySink::new();
        let (a, _pa) = MemoryTransport::pair();
        let (b, _pb) = MemoryTransport::pair();

        let mut q = Connection::initiator(a, "nodeA", &k, &quiet).with_verbosity(0);
        let mut l = Connection::initiator(b, "nodeA", &k, &loud).with_verbosity(3);
        q.step().unwrap();
        l.step().unwrap();
        q.disconnect();
        l.disconnect();

        assert!(quiet.lines().is_empty());
        assert!(loud.contains_event(Event::StateAdvanced));
        assert!(loud.contains_event(Event::MessageSent));
        assert!(loud.contains_event(Event::Disconnected));
    }

    #[test]
    fn test_back_to_back_messages_handled_one_per_step() {
        let k = key();
        let sink = MemorySink::new();
        let (mut peer, b) = MemoryTransport::pair();
        let mut acc = Connection::acceptor(b, "nodeB", &k, &sink);

        peer.write_bytes(b"<SID>nodeA</SID>").unwrap();
        acc.step().unwrap();
        acc.step().unwrap();
        let msg = peer.read_bytes(4096).unwrap();
        let challenge_b = Tag::Aut.extract(&msg).unwrap().to_vec();

        let mut burst = Tag::Aut.wrap(&crate::protocol::seal(&challenge_b, &k).unwrap());
        burst.extend_from_slice(&Tag::Aut.wrap(b"AAAAAAAAAAAAAAAA"));
        peer.write_bytes(&burst).unwrap();

        acc.step().unwrap();
        assert_eq!(acc.state(), ConnectionState::Acceptor(AcceptorState::WaitChallengeA));
        assert_eq!(peer.pending(), 0);

        // The challenge is already held, so this step needs no new bytes.
        acc.step().unwrap();
        assert_eq!(
            acc.state(),
            ConnectionState::Acceptor(AcceptorState::AwaitConfirmation)
        );
        let sealed_a = peer.read_bytes(4096).unwrap();
        let sealed_a = Tag::Aut.extract(&sealed_a).unwrap();
        assert_eq!(crate::protocol::open(sealed_a, &k).unwrap(), b"AAAAAAAAAAAAAAAA");
        assert!(acc.is_connected());
        assert_eq!(sink.count_at_least(Severity::Warn), 0);
    }

    #[test]
    fn test_faults_logged_at_any_verbosity() {
        let k = key();
        let sink = MemorySink::new();
        let (mut peer, b) = MemoryTransport::pair();
        let mut acc = Connection::acceptor(b, "nodeB", &k, &sink).with_verbosity(0);

        peer.write_bytes(b"no tags here").unwrap();
        assert!(matches!(acc.step().unwrap(), StepOutcome::Failed(_)));
        assert!(sink.contains_event(Event::FramingRejected));
        assert_eq!(sink.count_at_least(Severity::Warn), 1);
    }
}
