//! Header block codec.
//!
//! Each header entry is laid out as:
//!
//! ```text
//! [name_len:1][name:name_len][value_type:1][value_len:2][value:value_len]
//! ```
//!
//! `value_len` is big-endian.  Every value is read as text regardless of its
//! type tag, and every tag is assumed to carry a 2-byte length prefix.  Typed
//! values (booleans, integers, timestamps, UUIDs) therefore come out as their
//! raw bytes converted to text, which keeps header values identical to what
//! existing consumers already observe.
//!
//! Decoding never fails: a truncated entry ends the walk and the headers read
//! so far are returned.

use std::collections::BTreeMap;

use tracing::trace;

use crate::protocol::codec::ProtocolError;

/// Decoded headers, `name → value`.
///
/// A `BTreeMap` keeps iteration (and therefore logging and serialization)
/// order stable.
pub type HeaderMap = BTreeMap<String, String>;

/// Maximum header name length (1-byte length prefix).
pub const MAX_HEADER_NAME_LEN: usize = u8::MAX as usize;

/// Maximum header value length (2-byte length prefix).
pub const MAX_HEADER_VALUE_LEN: usize = u16::MAX as usize;

// ── Value type tags ───────────────────────────────────────────────────────────

/// Header value type tags defined by the framing format.
///
/// Only [`HeaderValueType::String`] is produced by [`encode_headers`].  The
/// others are recognised for diagnostics but decoded like strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum HeaderValueType {
    BoolTrue = 0,
    BoolFalse = 1,
    Byte = 2,
    Short = 3,
    Integer = 4,
    Long = 5,
    ByteArray = 6,
    String = 7,
    Timestamp = 8,
    Uuid = 9,
}

impl TryFrom<u8> for HeaderValueType {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(HeaderValueType::BoolTrue),
            1 => Ok(HeaderValueType::BoolFalse),
            2 => Ok(HeaderValueType::Byte),
            3 => Ok(HeaderValueType::Short),
            4 => Ok(HeaderValueType::Integer),
            5 => Ok(HeaderValueType::Long),
            6 => Ok(HeaderValueType::ByteArray),
            7 => Ok(HeaderValueType::String),
            8 => Ok(HeaderValueType::Timestamp),
            9 => Ok(HeaderValueType::Uuid),
            _ => Err(()),
        }
    }
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Decodes a header block into a [`HeaderMap`].
///
/// Walks the block left to right.  If the remaining bytes cannot satisfy the
/// next field, decoding stops and the headers decoded so far are returned.
/// A later entry with the same name replaces an earlier one.
///
/// # Examples
///
/// ```rust
/// use evstream_core::protocol::headers::{decode_headers, encode_headers};
///
/// let block = encode_headers(&[(":event-type", "toolUseEvent")]).unwrap();
/// let headers = decode_headers(&block);
/// assert_eq!(headers[":event-type"], "toolUseEvent");
/// ```
pub fn decode_headers(block: &[u8]) -> HeaderMap {
    let mut headers = HeaderMap::new();
    let mut offset = 0usize;

    while offset < block.len() {
        let name_len = block[offset] as usize;
        offset += 1;

        let Some(name) = block.get(offset..offset + name_len) else {
            trace!("header block truncated in name at offset {offset}");
            break;
        };
        offset += name_len;

        let Some(&type_tag) = block.get(offset) else {
            trace!("header block truncated before value type at offset {offset}");
            break;
        };
        offset += 1;

        let Some(len_bytes) = block.get(offset..offset + 2) else {
            trace!("header block truncated in value length at offset {offset}");
            break;
        };
        let value_len = u16::from_be_bytes([len_bytes[0], len_bytes[1]]) as usize;
        offset += 2;

        let Some(value) = block.get(offset..offset + value_len) else {
            trace!("header value of {value_len} bytes at offset {offset} exceeds block");
            break;
        };
        offset += value_len;

        if HeaderValueType::try_from(type_tag) != Ok(HeaderValueType::String) {
            trace!("header value type {type_tag} decoded as text");
        }

        headers.insert(
            String::from_utf8_lossy(name).into_owned(),
            String::from_utf8_lossy(value).into_owned(),
        );
    }

    headers
}

/// Encodes `(name, value)` pairs as string-typed header entries.
///
/// Entries are written in slice order.
///
/// # Errors
///
/// Returns [`ProtocolError::HeaderNameTooLong`] for a name over 255 bytes and
/// [`ProtocolError::HeaderValueTooLong`] for a value over 65535 bytes.
pub fn encode_headers(headers: &[(&str, &str)]) -> Result<Vec<u8>, ProtocolError> {
    let mut buf = Vec::new();
    for (name, value) in headers {
        if name.len() > MAX_HEADER_NAME_LEN {
            return Err(ProtocolError::HeaderNameTooLong(name.len()));
        }
        if value.len() > MAX_HEADER_VALUE_LEN {
            return Err(ProtocolError::HeaderValueTooLong {
                name: (*name).to_string(),
                len: value.len(),
            });
        }
        buf.push(name.len() as u8);
        buf.extend_from_slice(name.as_bytes());
        buf.push(HeaderValueType::String as u8);
        buf.extend_from_slice(&(value.len() as u16).to_be_bytes());
        buf.extend_from_slice(value.as_bytes());
    }
    Ok(buf)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
