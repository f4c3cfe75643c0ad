//! # Protocol Errors
//!
//! Leaf errors for the tag codec, the encryption envelope and key material.

use thiserror::Error;

/// Result type for tag codec operations
pub type TagResult<T> = Result<T, TagError>;

/// Result type for envelope and key operations
pub type EnvelopeResult<T> = Result<T, EnvelopeError>;

/// Tag framing errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TagError {
    /// Opening tag not present in the buffer
    #[error("opening tag {0} not found")]
    MissingOpen(&'static str),

    /// Closing tag not present in the buffer
    #[error("closing tag {0} not found")]
    MissingClose(&'static str),

    /// Closing tag only occurs before the opening tag
    #[error("closing tag {0} precedes opening tag")]
    CloseBeforeOpen(&'static str),
}

/// Envelope and key errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvelopeError {
    /// Envelope shorter than one IV
    #[error("envelope of {actual} bytes is shorter than the {expected}-byte IV")]
    Truncated { expected: usize, actual: usize },

    /// Key material of the wrong size
    #[error("shared key must be {expected} bytes, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    /// Key text is not valid base64
    #[error("shared key is not valid base64: {0}")]
    InvalidKeyEncoding(String),

    /// The OS random source failed
    #[error("secure random source failed: {0}")]
    RandomSource(String),
}
