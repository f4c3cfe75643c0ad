//! Encryption Envelope
//!
//! Wire layout: `[IV: 16 bytes][ciphertext: len(plaintext)]`.
//!
//! AES-128 in full-block CFB mode, no padding, no authentication tag. The IV
//! is drawn from the OS CSPRNG on every [`seal`] call and travels in the
//! clear at the head of the envelope.

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{AsyncStreamCipher, KeyIvInit};
use aes::Aes128;
use rand::distributions::Alphanumeric;
use rand::rngs::OsRng;
use rand::{Rng, RngCore};

use super::errors::{EnvelopeError, EnvelopeResult};
use super::key::SharedKey;

type Aes128CfbEnc = cfb_mode::Encryptor<Aes128>;
type Aes128CfbDec = cfb_mode::Decryptor<Aes128>;

/// AES block size, which is also the IV size.
pub const IV_SIZE: usize = 16;

/// Length of handshake challenges.
pub const CHALLENGE_SIZE: usize = 16;

/// Encrypt `plaintext` under `key` with a fresh IV, returning `IV ‖ ciphertext`.
pub fn seal(plaintext: &[u8], key: &SharedKey) -> EnvelopeResult<Vec<u8>> {
    let mut iv = [0u8; IV_SIZE];
    OsRng
        .try_fill_bytes(&mut iv)
        .map_err(|e| EnvelopeError::RandomSource(e.to_string()))?;

    let mut envelope = Vec::with_capacity(IV_SIZE + plaintext.len());
    envelope.extend_from_slice(&iv);
    envelope.extend_from_slice(plaintext);

    Aes128CfbEnc::new(
        GenericArray::from_slice(key.as_bytes()),
        GenericArray::from_slice(&iv),
    )
    .encrypt(&mut envelope[IV_SIZE..]);

    Ok(envelope)
}

/// Split the leading IV off `envelope` and decrypt the remainder.
pub fn open(envelope: &[u8], key: &SharedKey) -> EnvelopeResult<Vec<u8>> {
    if envelope.len() < IV_SIZE {
        return Err(EnvelopeError::Truncated {
            expected: IV_SIZE,
            actual: envelope.len(),
        });
    }

    let (iv, ciphertext) = envelope.split_at(IV_SIZE);
    let mut plaintext = ciphertext.to_vec();

    Aes128CfbDec::new(
        GenericArray::from_slice(key.as_bytes()),
        GenericArray::from_slice(iv),
    )
    .decrypt(&mut plaintext);

    Ok(plaintext)
}

/// Fresh random alphanumeric challenge.
pub fn generate_challenge() -> Vec<u8> {
    OsRng
        .sample_iter(&Alphanumeric)
        .take(CHALLENGE_SIZE)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn key(byte: u8) -> SharedKey {
        SharedKey::from_bytes(&[byte; 16]).unwrap()
    }

    #[test]
    fn test_open_inverts_seal() {
        let k = key(7);
        for plaintext in [&b""[..], b"x", b"0123456789abcdef", b"a longer payload spanning blocks"] {
            let envelope = seal(plaintext, &k).unwrap();
            assert_eq!(envelope.len(), IV_SIZE + plaintext.len());
            assert_eq!(open(&envelope, &k).unwrap(), plaintext);
        }
    }

    #[test]
    fn test_ciphertext_differs_from_plaintext() {
        let envelope = seal(b"challenge-bytes!", &key(1)).unwrap();
        assert_ne!(&envelope[IV_SIZE..], b"challenge-bytes!");
    }

    #[test]
    fn test_iv_never_repeats() {
        let k = key(3);
        let mut seen = HashSet::new();
        for _ in 0..10_000 {
            let envelope = seal(b"same plaintext", &k).unwrap();
            assert!(seen.insert(envelope[..IV_SIZE].to_vec()));
        }
    }

    #[test]
    fn test_wrong_key_does_not_recover_plaintext() {
        let envelope = seal(b"0123456789abcdef", &key(1)).unwrap();
        assert_ne!(open(&envelope, &key(2)).unwrap(), b"0123456789abcdef");
    }

    #[test]
    fn test_truncated_envelope() {
        assert_eq!(
            open(&[0u8; 15], &key(1)),
            Err(EnvelopeError::Truncated { expected: 16, actual: 15 })
        );
        // A bare IV is a valid envelope of an empty plaintext.
        assert_eq!(open(&[0u8; 16], &key(1)).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_bit_flip_changes_plaintext() {
        let k = key(9);
        let mut envelope = seal(b"0123456789abcdef", &k).unwrap();
        envelope[IV_SIZE + 3] ^= 0x01;
        assert_ne!(open(&envelope, &k).unwrap(), b"0123456789abcdef");
    }

    #[test]
    fn test_challenge_shape() {
        let a = generate_challenge();
        let b = generate_challenge();
        assert_eq!(a.len(), CHALLENGE_SIZE);
        assert!(a.iter().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
    }
}
