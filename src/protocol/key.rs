//! Pre-shared key material
//!
//! The key is loaded once at boot and borrowed read-only by every
//! connection.

use std::fmt;

use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use super::errors::{EnvelopeError, EnvelopeResult};

/// AES-128 key length in bytes.
pub const KEY_SIZE: usize = 16;

/// Symmetric key shared by every node of the network.
#[derive(Clone)]
pub struct SharedKey([u8; KEY_SIZE]);

impl SharedKey {
    /// Wrap raw key bytes.
    pub fn from_bytes(bytes: &[u8]) -> EnvelopeResult<Self> {
        let key: [u8; KEY_SIZE] = bytes.try_into().map_err(|_| EnvelopeError::InvalidKeyLength {
            expected: KEY_SIZE,
            actual: bytes.len(),
        })?;
        Ok(Self(key))
    }

    /// Decode a base64 key (surrounding whitespace ignored).
    pub fn from_base64(text: &str) -> EnvelopeResult<Self> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(text.trim())
            .map_err(|e| EnvelopeError::InvalidKeyEncoding(e.to_string()))?;
        Self::from_bytes(&bytes)
    }

    /// Draw a fresh key from the OS random source.
    pub fn generate() -> EnvelopeResult<Self> {
        let mut key = [0u8; KEY_SIZE];
        OsRng
            .try_fill_bytes(&mut key)
            .map_err(|e| EnvelopeError::RandomSource(e.to_string()))?;
        Ok(Self(key))
    }

    /// Base64 text form, as stored in key files.
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(self.0)
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }

    /// Short non-reversible identifier, safe to log.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.0);
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(&digest[..8])
    }
}

impl PartialEq for SharedKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.ct_eq(&other.0).into()
    }
}

impl Eq for SharedKey {}

impl fmt::Debug for SharedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SharedKey({})", self.fingerprint())
    }
}
