//! Wire protocol building blocks
//!
//! - Tag codec: delimiter-tagged segments over a byte stream
//! - Encryption envelope: `IV ‖ ciphertext` under the pre-shared key
//! - Shared key material
//!
//! Nothing in here performs I/O.

mod envelope;
mod errors;
mod key;
pub mod tags;

pub use envelope::{generate_challenge, open, seal, CHALLENGE_SIZE, IV_SIZE};
pub use errors::{EnvelopeError, EnvelopeResult, TagError, TagResult};
pub use key::{SharedKey, KEY_SIZE};
pub use tags::{is_valid_node_id, Tag, ACK};
