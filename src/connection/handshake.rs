//! Mutual challenge/response handshake
//!
//! Wire order:
//!
//! ```text
//! 1. I -> A  <SID>initiator</SID>
//! 2. A -> I  <AUT>challenge B</AUT>
//! 3. I -> A  <AUT>IV ‖ K(challenge B)</AUT>
//! 4. I -> A  <AUT>challenge A</AUT>
//! 5. A -> I  <AUT>IV ‖ K(challenge A)</AUT>
//! 6. I -> A  <SID>initiator</SID>      (authentication confirmed)
//! 7. A -> I  <SID>acceptor</SID>       (ready to receive)
//! ```
//!
//! Challenges are sealed raw; the envelope travels inside `AUT` tags and is
//! compared after the tags are stripped and the envelope opened. Both roles
//! use the same convention.

use subtle::ConstantTimeEq;

use super::errors::{ConnectionError, ConnectionResult};
use super::state::{AcceptorState, InitiatorState};
use super::Connection;
use crate::observability::{Event, Severity};
use crate::protocol::{self, is_valid_node_id, Tag};
use crate::transport::Transport;

impl<'k, T: Transport> Connection<'k, T> {
    // =========================================================================
    // INITIATOR
    // =========================================================================

    /// Connecting: announce ourselves.
    pub(super) fn send_greeting(&mut self) -> ConnectionResult<InitiatorState> {
        let id = self.local_id.clone();
        self.send_tagged(Tag::Sid, id.as_bytes())?;
        Ok(InitiatorState::WaitChallengeB)
    }

    /// WaitChallengeB: hold the acceptor's plaintext challenge.
    pub(super) fn receive_challenge_b(&mut self) -> ConnectionResult<InitiatorState> {
        self.challenge = self.read_challenge()?;
        Ok(InitiatorState::SendEncryptedChallengeB)
    }

    /// SendEncryptedChallengeB: prove the key by sealing challenge B.
    pub(super) fn return_challenge_b(&mut self) -> ConnectionResult<InitiatorState> {
        let challenge = std::mem::take(&mut self.challenge);
        self.send_sealed(&challenge)?;
        Ok(InitiatorState::SendChallengeA)
    }

    /// SendChallengeA: issue our own challenge.
    pub(super) fn issue_challenge_a(&mut self) -> ConnectionResult<InitiatorState> {
        self.issue_challenge()?;
        Ok(InitiatorState::WaitEncryptedChallengeA)
    }

    /// WaitEncryptedChallengeA: check the acceptor's proof, then confirm with our SID.
    pub(super) fn verify_challenge_a(&mut self) -> ConnectionResult<InitiatorState> {
        self.verify_response()?;
        self.emit(Severity::Info, Event::Authenticated, &[]);

        let id = self.local_id.clone();
        self.send_tagged(Tag::Sid, id.as_bytes())?;
        Ok(InitiatorState::TransmitData)
    }

    // =========================================================================
    // ACCEPTOR
    // =========================================================================

    /// Accepted: learn who dialed in.
    pub(super) fn receive_greeting(&mut self) -> ConnectionResult<AcceptorState> {
        let id = self.read_node_id()?;
        self.remote_id = Some(id);
        Ok(AcceptorState::SendChallengeB)
    }

    /// SendChallengeB: issue our challenge in plaintext.
    pub(super) fn issue_challenge_b(&mut self) -> ConnectionResult<AcceptorState> {
        self.issue_challenge()?;
        Ok(AcceptorState::WaitEncryptedChallengeB)
    }

    /// WaitEncryptedChallengeB: check the initiator's proof.
    pub(super) fn verify_challenge_b(&mut self) -> ConnectionResult<AcceptorState> {
        self.verify_response()?;
        Ok(AcceptorState::WaitChallengeA)
    }

    /// WaitChallengeA: seal the initiator's challenge and send it back.
    pub(super) fn answer_challenge_a(&mut self) -> ConnectionResult<AcceptorState> {
        let challenge = self.read_challenge()?;
        self.send_sealed(&challenge)?;
        Ok(AcceptorState::AwaitConfirmation)
    }

    /// AwaitConfirmation: the initiator re-sends its SID; echo ours.
    pub(super) fn confirm_peer(&mut self) -> ConnectionResult<AcceptorState> {
        let id = self.read_node_id()?;
        if self.remote_id.as_deref() != Some(id.as_str()) {
            return Err(ConnectionError::authentication(format!(
                "peer changed identity to '{}' during handshake",
                id
            )));
        }
        self.emit(Severity::Info, Event::Authenticated, &[]);

        let own = self.local_id.clone();
        self.send_tagged(Tag::Sid, own.as_bytes())?;
        Ok(AcceptorState::ReceiveData)
    }

    // =========================================================================
    // SHARED
    // =========================================================================

    fn issue_challenge(&mut self) -> ConnectionResult<()> {
        self.challenge = protocol::generate_challenge();
        let challenge = self.challenge.clone();
        self.send_tagged(Tag::Aut, &challenge)
    }

    fn read_challenge(&mut self) -> ConnectionResult<Vec<u8>> {
        let challenge = self.read_tagged(Tag::Aut)?;
        if challenge.is_empty() {
            return Err(ConnectionError::framing("empty challenge"));
        }
        Ok(challenge)
    }

    fn send_sealed(&mut self, challenge: &[u8]) -> ConnectionResult<()> {
        let envelope = protocol::seal(challenge, self.key)?;
        self.send_tagged(Tag::Aut, &envelope)
    }

    /// Open the peer's envelope and compare it with our outstanding challenge.
    fn verify_response(&mut self) -> ConnectionResult<()> {
        let envelope = self.read_tagged(Tag::Aut)?;
        let recovered = protocol::open(&envelope, self.key)?;
        let expected = std::mem::take(&mut self.challenge);

        let matches: bool = recovered.ct_eq(&expected).into();
        if expected.is_empty() || !matches {
            return Err(ConnectionError::authentication(
                "challenge response does not match; peer does not hold the shared key",
            ));
        }
        Ok(())
    }

    pub(super) fn read_node_id(&mut self) -> ConnectionResult<String> {
        let raw = self.read_tagged(Tag::Sid)?;
        let id = String::from_utf8(raw)
            .map_err(|_| ConnectionError::framing("node id is not valid UTF-8"))?;
        if !is_valid_node_id(&id) {
            return Err(ConnectionError::framing(format!("invalid node id '{}'", id)));
        }
        Ok(id)
    }
}
