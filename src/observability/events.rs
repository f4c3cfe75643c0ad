//! Observable connection events
//!
//! Events are explicit and typed.

use std::fmt;

/// Observable events in a replication link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Lifecycle
    /// Outbound connection established
    Connected,
    /// Inbound connection accepted
    Accepted,
    /// Connection closed by this side
    Disconnected,
    /// Peer closed the stream or the socket failed mid-read
    ConnectionLost,

    // Handshake
    /// A protocol message was sent
    MessageSent,
    /// State machine advanced one step
    StateAdvanced,
    /// Expected tag pair missing or malformed
    FramingRejected,
    /// Challenge response did not match
    AuthenticationFailed,
    /// Both sides proved the shared key
    Authenticated,

    // Transfer
    /// Replication payload sent, waiting for ack
    PayloadSent,
    /// Replication payload received and acknowledged
    PayloadReceived,
    /// Ack marker observed
    AckReceived,
    /// Something other than the ack marker arrived
    AckMissing,

    // Node driver
    /// Listener bound and polling
    Listening,
    /// Connection reaped after idling too long
    ConnectionReaped,
    /// Configuration loaded
    ConfigLoaded,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::Connected => "CONNECTED",
            Event::Accepted => "ACCEPTED",
            Event::Disconnected => "DISCONNECTED",
            Event::ConnectionLost => "CONNECTION_LOST",
            Event::MessageSent => "MESSAGE_SENT",
            Event::StateAdvanced => "STATE_ADVANCED",
            Event::FramingRejected => "FRAMING_REJECTED",
            Event::AuthenticationFailed => "AUTHENTICATION_FAILED",
            Event::Authenticated => "AUTHENTICATED",
            Event::PayloadSent => "PAYLOAD_SENT",
            Event::PayloadReceived => "PAYLOAD_RECEIVED",
            Event::AckReceived => "ACK_RECEIVED",
            Event::AckMissing => "ACK_MISSING",
            Event::Listening => "LISTENING",
            Event::ConnectionReaped => "CONNECTION_REAPED",
            Event::ConfigLoaded => "CONFIG_LOADED",
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names_are_screaming_snake() {
        for event in [Event::AuthenticationFailed, Event::PayloadReceived, Event::AckMissing] {
            let name = event.as_str();
            assert!(name.chars().all(|c| c.is_ascii_uppercase() || c == '_'));
        }
    }
}
