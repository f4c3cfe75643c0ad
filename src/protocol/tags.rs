//! Tag Codec
//!
//! In-band framing over a raw byte stream. A message is an opening tag
//! (`<` + mnemonic + `>`), the payload, and the matching closing tag with
//! `/` after `<`. The acknowledgment is a bare `<ACK>` marker.
//!
//! | Tag   | Open    | Close    | Payload               |
//! |-------|---------|----------|-----------------------|
//! | `SID` | `<SID>` | `</SID>` | node identifier       |
//! | `AUT` | `<AUT>` | `</AUT>` | nonce or `IV ‖ ct`    |
//! | `REP` | `<REP>` | `</REP>` | replication payload   |
//! | `ACK` | `<ACK>` | none     | none                  |

use super::errors::{TagError, TagResult};

/// Bare acknowledgment marker.
pub const ACK: &[u8] = b"<ACK>";

/// Paired message tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    /// Node identity
    Sid,
    /// Authentication challenge or response
    Aut,
    /// Replication payload
    Rep,
}

impl Tag {
    /// Three-letter mnemonic.
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Tag::Sid => "SID",
            Tag::Aut => "AUT",
            Tag::Rep => "REP",
        }
    }

    /// Opening tag bytes.
    pub fn open(&self) -> &'static [u8] {
        match self {
            Tag::Sid => b"<SID>",
            Tag::Aut => b"<AUT>",
            Tag::Rep => b"<REP>",
        }
    }

    /// Closing tag bytes.
    pub fn close(&self) -> &'static [u8] {
        match self {
            Tag::Sid => b"</SID>",
            Tag::Aut => b"</AUT>",
            Tag::Rep => b"</REP>",
        }
    }

    /// `open ‖ payload ‖ close`
    pub fn wrap(&self, payload: &[u8]) -> Vec<u8> {
        wrap(payload, self.open(), self.close())
    }

    /// Payload between this tag pair. See [`extract`].
    pub fn extract<'a>(&self, buffer: &'a [u8]) -> TagResult<&'a [u8]> {
        extract(buffer, self.open(), self.close()).map_err(|e| match e {
            TagError::MissingOpen(_) => TagError::MissingOpen(self.mnemonic()),
            TagError::MissingClose(_) => TagError::MissingClose(self.mnemonic()),
            TagError::CloseBeforeOpen(_) => TagError::CloseBeforeOpen(self.mnemonic()),
        })
    }

    /// Split the first complete frame of this tag off the front of `buffer`.
    ///
    /// Returns the payload and how many bytes of `buffer` the frame used,
    /// so the caller can keep whatever follows for the next read. See
    /// [`split_frame`].
    pub fn split_frame<'a>(&self, buffer: &'a [u8]) -> TagResult<(&'a [u8], usize)> {
        let found = match self {
            Tag::Rep => extract(buffer, self.open(), self.close()).map(|p| (p, buffer.len())),
            Tag::Sid | Tag::Aut => split_frame(buffer, self.open(), self.close()),
        };
        found.map_err(|e| match e {
            TagError::MissingOpen(_) => TagError::MissingOpen(self.mnemonic()),
            TagError::MissingClose(_) => TagError::MissingClose(self.mnemonic()),
            TagError::CloseBeforeOpen(_) => TagError::CloseBeforeOpen(self.mnemonic()),
        })
    }
}

/// Opening bytes of every message the protocol sends.
const FRAME_STARTS: [&[u8]; 4] = [b"<SID>", b"<AUT>", b"<REP>", ACK];

/// Concatenate `open_tag ‖ payload ‖ close_tag`.
pub fn wrap(payload: &[u8], open_tag: &[u8], close_tag: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(open_tag.len() + payload.len() + close_tag.len());
    buf.extend_from_slice(open_tag);
    buf.extend_from_slice(payload);
    buf.extend_from_slice(close_tag);
    buf
}

/// Bytes between the first `open_tag` and the last `close_tag` after it.
///
/// Leading bytes before the opening tag are ignored. Anchoring on the last
/// closing tag keeps payloads that themselves contain tag bytes intact.
pub fn extract<'a>(buffer: &'a [u8], open_tag: &[u8], close_tag: &[u8]) -> TagResult<&'a [u8]> {
    let start = find(buffer, open_tag).ok_or(TagError::MissingOpen("tag"))?;
    let body_start = start + open_tag.len();

    match rfind(buffer, close_tag) {
        Some(end) if end >= body_start => Ok(&buffer[body_start..end]),
        Some(_) => Err(TagError::CloseBeforeOpen("tag")),
        None => Err(TagError::MissingClose("tag")),
    }
}

/// First frame in `buffer` and the number of bytes it spans.
///
/// The frame ends at the first `close_tag` that is followed by nothing or by
/// the start of another message. With no such boundary the last `close_tag`
/// wins, as in [`extract`]. `REP` frames never go through here: a payload
/// may carry tag bytes anywhere, and nothing follows it on the wire.
pub fn split_frame<'a>(
    buffer: &'a [u8],
    open_tag: &[u8],
    close_tag: &[u8],
) -> TagResult<(&'a [u8], usize)> {
    let start = find(buffer, open_tag).ok_or(TagError::MissingOpen("tag"))?;
    let body_start = start + open_tag.len();

    let mut from = body_start;
    while let Some(offset) = find(&buffer[from..], close_tag) {
        let end = from + offset;
        let rest = &buffer[end + close_tag.len()..];
        if rest.is_empty() || FRAME_STARTS.iter().any(|s| rest.starts_with(s)) {
            return Ok((&buffer[body_start..end], end + close_tag.len()));
        }
        from = end + 1;
    }

    extract(buffer, open_tag, close_tag).map(|payload| (payload, buffer.len()))
}

/// Whether `id` can travel inside `SID` tags.
///
/// Node ids must be non-empty and free of `<` and `>`.
pub fn is_valid_node_id(id: &str) -> bool {
    !id.is_empty() && !id.contains(['<', '>'])
}

/// Exact subsequence search.
pub fn contains(buffer: &[u8], marker: &[u8]) -> bool {
    find(buffer, marker).is_some()
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).rposition(|w| w == needle)
}
