//! Connection Error Types
//!
//! - Transport loss, framing and authentication faults end one connection
//! - Invalid-state errors are programming faults and are fatal
//! - Nothing is retried automatically

use std::fmt;
use std::io;

use crate::protocol::{EnvelopeError, TagError};

/// Connection error type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionError {
    /// Error kind
    pub kind: ConnectionErrorKind,
    /// Error message
    pub message: String,
}

/// Connection error kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionErrorKind {
    /// Peer closed mid-read, socket failed, or connect/accept failed
    TransportLoss,

    /// Expected tag pair absent or malformed
    Framing,

    /// Challenge response did not match, or the peer changed identity
    Authentication,

    /// Step or operation invoked in a state that does not allow it
    InvalidState,
}

impl ConnectionErrorKind {
    /// Stable error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::TransportLoss => "REPLINK_TRANSPORT_LOSS",
            Self::Framing => "REPLINK_FRAMING",
            Self::Authentication => "REPLINK_AUTHENTICATION",
            Self::InvalidState => "REPLINK_INVALID_STATE",
        }
    }
}

impl ConnectionError {
    /// Create a new connection error.
    pub fn new(kind: ConnectionErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Create a transport loss error.
    pub fn transport_loss(message: impl Into<String>) -> Self {
        Self::new(ConnectionErrorKind::TransportLoss, message)
    }

    /// Create a framing error.
    pub fn framing(message: impl Into<String>) -> Self {
        Self::new(ConnectionErrorKind::Framing, message)
    }

    /// Create an authentication error.
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(ConnectionErrorKind::Authentication, message)
    }

    /// Create an invalid state error.
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::new(ConnectionErrorKind::InvalidState, message)
    }

    /// Only invalid-state errors escape a connection.
    pub fn is_fatal(&self) -> bool {
        matches!(self.kind, ConnectionErrorKind::InvalidState)
    }
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.code(), self.message)
    }
}

impl std::error::Error for ConnectionError {}

impl From<io::Error> for ConnectionError {
    fn from(e: io::Error) -> Self {
        Self::transport_loss(e.to_string())
    }
}

impl From<TagError> for ConnectionError {
    fn from(e: TagError) -> Self {
        Self::framing(e.to_string())
    }
}

impl From<EnvelopeError> for ConnectionError {
    fn from(e: EnvelopeError) -> Self {
        match e {
            EnvelopeError::Truncated { .. } => Self::framing(e.to_string()),
            _ => Self::authentication(e.to_string()),
        }
    }
}

/// Result type for connection operations
pub type ConnectionResult<T> = Result<T, ConnectionError>;
