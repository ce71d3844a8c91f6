//! On-disk framing for cache entries.
//!
//! ```text
//! ┌──────────┬──────────────┬─────────────┬──────────────┐
//! │ "ACE1"   │ label len    │ label       │ payload      │
//! │ 4 bytes  │ u16 BE       │ UTF-8       │ rest of file │
//! └──────────┴──────────────┴─────────────┴──────────────┘
//! ```
//!
//! Anything that does not parse is reported as [`EntryError`] and the caller
//! treats the file as a miss.

use bytes::{BufMut, Bytes, BytesMut};

/// Magic bytes at the start of every entry file.
pub const ENTRY_MAGIC: &[u8; 4] = b"ACE1";

/// Size of the fixed header (magic + label length).
pub const ENTRY_HEADER_SIZE: usize = 6;

/// A decoded cache entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Optional label describing how the payload was produced
    pub label: Option<String>,
    /// Stored bytes
    pub data: Bytes,
}

/// Reasons an entry file failed to decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryError {
    Truncated,
    BadMagic,
    BadLabel,
}

impl std::fmt::Display for EntryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryError::Truncated => write!(f, "entry truncated"),
            EntryError::BadMagic => write!(f, "entry has bad magic bytes"),
            EntryError::BadLabel => write!(f, "entry label is not valid UTF-8"),
        }
    }
}

/// Frame an entry for storage.
pub fn encode(label: Option<&str>, data: &[u8]) -> Bytes {
    // Labels longer than u16::MAX are cut at a char boundary
    let label = label.unwrap_or("");
    let mut end = label.len().min(u16::MAX as usize);
    while !label.is_char_boundary(end) {
        end -= 1;
    }
    let label = &label[..end];

    let mut buf = BytesMut::with_capacity(ENTRY_HEADER_SIZE + label.len() + data.len());
    buf.put_slice(ENTRY_MAGIC);
    buf.put_u16(label.len() as u16);
    buf.put_slice(label.as_bytes());
    buf.put_slice(data);
    buf.freeze()
}

/// Parse a framed entry.
pub fn decode(raw: Bytes) -> Result<Entry, EntryError> {
    if raw.len() < ENTRY_HEADER_SIZE {
        return Err(EntryError::Truncated);
    }
    if &raw[..4] != ENTRY_MAGIC {
        return Err(EntryError::BadMagic);
    }

    let label_len = u16::from_be_bytes([raw[4], raw[5]]) as usize;
    let payload_start = ENTRY_HEADER_SIZE + label_len;
    if raw.len() < payload_start {
        return Err(EntryError::Truncated);
    }

    let label = match label_len {
        0 => None,
        _ => Some(
            std::str::from_utf8(&raw[ENTRY_HEADER_SIZE..payload_start])
                .map_err(|_| EntryError::BadLabel)?
                .to_string(),
        ),
    };

    Ok(Entry {
        label,
        data: raw.slice(payload_start..),
    })
}
