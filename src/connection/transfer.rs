//! Replication Transfer Protocol
//!
//! After authentication the initiator sends exactly one `REP` message and
//! the acceptor answers with the bare `<ACK>` marker. Both sides then
//! disconnect. The acceptor keeps the payload until the caller takes it.

use super::errors::{ConnectionError, ConnectionResult};
use super::state::{AcceptorState, InitiatorState};
use super::Connection;
use crate::observability::{Event, Severity};
use crate::protocol::{tags, Tag, ACK};
use crate::transport::Transport;

impl<'k, T: Transport> Connection<'k, T> {
    /// TransmitData: wait for the acceptor's SID echo, then send the payload.
    ///
    /// Stays pending, without consuming input, until a payload is staged.
    pub(super) fn transmit(&mut self) -> ConnectionResult<Option<InitiatorState>> {
        if self.outbound.is_none() {
            return Ok(None);
        }

        let id = self.read_node_id()?;
        self.remote_id = Some(id);

        let payload = self
            .outbound
            .take()
            .ok_or_else(|| ConnectionError::invalid_state("outbound payload vanished"))?;
        self.send(&payload)?;

        let size = payload.len().to_string();
        self.emit(Severity::Info, Event::PayloadSent, &[("bytes", size.as_str())]);
        Ok(Some(InitiatorState::WaitAck))
    }

    /// WaitAck: any inbound data ends the exchange.
    pub(super) fn await_ack(&mut self) -> ConnectionResult<InitiatorState> {
        let message = self.read_message()?;

        self.acknowledged = tags::contains(&message, ACK);
        if self.acknowledged {
            self.emit(Severity::Info, Event::AckReceived, &[]);
        } else {
            self.emit(Severity::Warn, Event::AckMissing, &[]);
        }

        self.disconnect();
        Ok(InitiatorState::Closed)
    }

    /// ReceiveData: store the payload, acknowledge, close.
    pub(super) fn receive(&mut self) -> ConnectionResult<AcceptorState> {
        let payload = self.read_tagged(Tag::Rep)?;
        let size = payload.len().to_string();

        self.inbound = Some(payload);
        self.data_ready = true;

        if let Err(e) = self.send(ACK) {
            // The payload is already complete; a lost ack only costs the peer a log line.
            self.emit(
                Severity::Warn,
                Event::ConnectionLost,
                &[("reason", e.message.as_str())],
            );
        }
        self.emit(Severity::Info, Event::PayloadReceived, &[("bytes", size.as_str())]);

        self.disconnect();
        Ok(AcceptorState::HasData)
    }
}
