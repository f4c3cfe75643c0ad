//! Connection State Machine
//!
//! Two progressions share one step function. Each role has its own state
//! enum, so a cross-role transition cannot be expressed, and each enum owns
//! its successor table.
//!
//! ```text
//! Initiator: Connecting -> WaitChallengeB -> SendEncryptedChallengeB -> SendChallengeA
//!            -> WaitEncryptedChallengeA -> TransmitData -> WaitAck -> Closed
//! Acceptor:  Accepted -> SendChallengeB -> WaitEncryptedChallengeB -> WaitChallengeA
//!            -> AwaitConfirmation -> ReceiveData -> HasData
//! ```
//!
//! `Idle` is entered only when the caller takes a received payload.

use std::fmt;

/// Which side of the link this connection plays. Fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Dialed out; proves itself first, then sends the payload
    Initiator,
    /// Accepted an inbound link; receives the payload
    Acceptor,
}

impl Role {
    /// Lowercase name for logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Initiator => "initiator",
            Role::Acceptor => "acceptor",
        }
    }
}

/// Initiator progression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitiatorState {
    /// Just connected; send own SID
    Connecting,
    /// Waiting for the acceptor's plaintext challenge B
    WaitChallengeB,
    /// Holding challenge B; seal and return it
    SendEncryptedChallengeB,
    /// Issue own challenge A
    SendChallengeA,
    /// Waiting for the sealed challenge A
    WaitEncryptedChallengeA,
    /// Authenticated; waiting for the acceptor's SID echo before sending
    TransmitData,
    /// Payload sent; waiting for the ack marker
    WaitAck,
    /// Transfer finished and link closed
    Closed,
}

impl InitiatorState {
    /// The only state this one may advance to.
    pub fn next(self) -> Option<Self> {
        use InitiatorState::*;
        match self {
            Connecting => Some(WaitChallengeB),
            WaitChallengeB => Some(SendEncryptedChallengeB),
            SendEncryptedChallengeB => Some(SendChallengeA),
            SendChallengeA => Some(WaitEncryptedChallengeA),
            WaitEncryptedChallengeA => Some(TransmitData),
            TransmitData => Some(WaitAck),
            WaitAck => Some(Closed),
            Closed => None,
        }
    }

    fn name(self) -> &'static str {
        use InitiatorState::*;
        match self {
            Connecting => "Connecting",
            WaitChallengeB => "WaitChallengeB",
            SendEncryptedChallengeB => "SendEncryptedChallengeB",
            SendChallengeA => "SendChallengeA",
            WaitEncryptedChallengeA => "WaitEncryptedChallengeA",
            TransmitData => "TransmitData",
            WaitAck => "WaitAck",
            Closed => "Closed",
        }
    }

    fn needs_inbound(self) -> bool {
        use InitiatorState::*;
        matches!(
            self,
            WaitChallengeB | WaitEncryptedChallengeA | TransmitData | WaitAck
        )
    }
}

/// Acceptor progression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptorState {
    /// Just accepted; waiting for the initiator's SID
    Accepted,
    /// Issue challenge B
    SendChallengeB,
    /// Waiting for the sealed challenge B
    WaitEncryptedChallengeB,
    /// Waiting for the initiator's plaintext challenge A
    WaitChallengeA,
    /// Waiting for the initiator's SID confirmation; echoes own SID
    AwaitConfirmation,
    /// Authenticated; waiting for the payload
    ReceiveData,
    /// Payload held until the caller takes it
    HasData,
}

impl AcceptorState {
    /// The only state this one may advance to.
    pub fn next(self) -> Option<Self> {
        use AcceptorState::*;
        match self {
            Accepted => Some(SendChallengeB),
            SendChallengeB => Some(WaitEncryptedChallengeB),
            WaitEncryptedChallengeB => Some(WaitChallengeA),
            WaitChallengeA => Some(AwaitConfirmation),
            AwaitConfirmation => Some(ReceiveData),
            ReceiveData => Some(HasData),
            HasData => None,
        }
    }

    fn name(self) -> &'static str {
        use AcceptorState::*;
        match self {
            Accepted => "Accepted",
            SendChallengeB => "SendChallengeB",
            WaitEncryptedChallengeB => "WaitEncryptedChallengeB",
            WaitChallengeA => "WaitChallengeA",
            AwaitConfirmation => "AwaitConfirmation",
            ReceiveData => "ReceiveData",
            HasData => "HasData",
        }
    }

    fn needs_inbound(self) -> bool {
        use AcceptorState::*;
        matches!(
            self,
            Accepted | WaitEncryptedChallengeB | WaitChallengeA | AwaitConfirmation | ReceiveData
        )
    }
}

/// Current protocol state of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Initiator progression
    Initiator(InitiatorState),
    /// Acceptor progression
    Acceptor(AcceptorState),
    /// Received payload consumed; nothing left to do
    Idle,
}

impl ConnectionState {
    /// Entry state for a role.
    pub fn entry(role: Role) -> Self {
        match role {
            Role::Initiator => Self::Initiator(InitiatorState::Connecting),
            Role::Acceptor => Self::Acceptor(AcceptorState::Accepted),
        }
    }

    /// State name for observability.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Initiator(s) => s.name(),
            Self::Acceptor(s) => s.name(),
            Self::Idle => "Idle",
        }
    }

    /// Whether a step in this state consumes an inbound message.
    pub fn needs_inbound(&self) -> bool {
        match self {
            Self::Initiator(s) => s.needs_inbound(),
            Self::Acceptor(s) => s.needs_inbound(),
            Self::Idle => false,
        }
    }

    /// Whether `to` is the successor of this state.
    pub fn can_advance_to(&self, to: ConnectionState) -> bool {
        match (self, to) {
            (Self::Initiator(from), Self::Initiator(to)) => from.next() == Some(to),
            (Self::Acceptor(from), Self::Acceptor(to)) => from.next() == Some(to),
            _ => false,
        }
    }

    /// Whether both sides have proved the shared key.
    pub fn is_authenticated(&self) -> bool {
        matches!(
            self,
            Self::Initiator(InitiatorState::TransmitData | InitiatorState::WaitAck | InitiatorState::Closed)
                | Self::Acceptor(
                    AcceptorState::AwaitConfirmation
                        | AcceptorState::ReceiveData
                        | AcceptorState::HasData
                )
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn walk(mut state: ConnectionState) -> Vec<ConnectionState> {
        let mut seen = vec![state];
        loop {
            let next = match state {
                ConnectionState::Initiator(s) => s.next().map(ConnectionState::Initiator),
                ConnectionState::Acceptor(s) => s.next().map(ConnectionState::Acceptor),
                ConnectionState::Idle => None,
            };
            match next {
                Some(n) => {
                    assert!(state.can_advance_to(n));
                    seen.push(n);
                    state = n;
                }
                None => return seen,
            }
        }
    }

    #[test]
    fn test_initiator_progression() {
        let path = walk(ConnectionState::entry(Role::Initiator));
        let names: Vec<_> = path.iter().map(|s| s.name()).collect();
        assert_eq!(
            names,
            [
                "Connecting",
                "WaitChallengeB",
                "SendEncryptedChallengeB",
                "SendChallengeA",
                "WaitEncryptedChallengeA",
                "TransmitData",
                "WaitAck",
                "Closed"
            ]
        );
    }

    #[test]
    fn test_acceptor_progression() {
        let path = walk(ConnectionState::entry(Role::Acceptor));
        assert_eq!(path.len(), 7);
        assert_eq!(path.last(), Some(&ConnectionState::Acceptor(AcceptorState::HasData)));
    }

    #[test]
    fn test_no_backward_or_cross_role_transitions() {
        let wait_a = ConnectionState::Acceptor(AcceptorState::WaitChallengeA);
        assert!(!wait_a.can_advance_to(ConnectionState::Acceptor(AcceptorState::Accepted)));
        assert!(!wait_a.can_advance_to(ConnectionState::Initiator(InitiatorState::TransmitData)));
        assert!(!wait_a.can_advance_to(ConnectionState::Idle));
        assert!(!ConnectionState::Idle.can_advance_to(wait_a));
    }

    #[test]
    fn test_send_states_do_not_wait() {
        assert!(!ConnectionState::Initiator(InitiatorState::Connecting).needs_inbound());
        assert!(!ConnectionState::Initiator(InitiatorState::SendChallengeA).needs_inbound());
        assert!(!ConnectionState::Acceptor(AcceptorState::SendChallengeB).needs_inbound());
        assert!(ConnectionState::Acceptor(AcceptorState::ReceiveData).needs_inbound());
    }

    #[test]
    fn test_authenticated_states() {
        assert!(!ConnectionState::Acceptor(AcceptorState::WaitChallengeA).is_authenticated());
        assert!(ConnectionState::Acceptor(AcceptorState::ReceiveData).is_authenticated());
        assert!(!ConnectionState::Initiator(InitiatorState::WaitEncryptedChallengeA).is_authenticated());
        assert!(ConnectionState::Initiator(InitiatorState::TransmitData).is_authenticated());
    }
}
