//! Decoded event-stream message types.
//!
//! A [`DecodedMessage`] is what the frame decoder produces for every complete
//! frame it accepts.  It is immutable once built; the stream decoder hands it
//! to exactly one consumer.

use serde::Serialize;
use serde_json::Value;

use crate::protocol::headers::HeaderMap;

// ── Wire constants ────────────────────────────────────────────────────────────

/// Size of the fixed prelude: total length (4) + headers length (4) +
/// prelude checksum (4).
pub const PRELUDE_SIZE: usize = 12;

/// Size of the trailing message checksum.
pub const MESSAGE_CRC_SIZE: usize = 4;

/// Smallest legal frame: a prelude followed directly by the message checksum.
pub const MIN_FRAME_SIZE: usize = PRELUDE_SIZE + MESSAGE_CRC_SIZE;

/// Size of the big-endian total-length field at the start of every frame.
pub const LENGTH_FIELD_SIZE: usize = 4;

// ── Payload ───────────────────────────────────────────────────────────────────

/// The body of a frame after the header block.
///
/// The backend usually sends JSON, but nothing guarantees it: diagnostic
/// frames may carry plain text.  A payload that fails to parse as JSON is kept
/// as [`Payload::Raw`] instead of failing the whole message.
///
/// # Serde representation
///
/// Untagged: `Empty` serializes as `null`, `Json` as the value itself and
/// `Raw` as a JSON string.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Payload {
    /// The frame carried no payload bytes.
    Empty,
    /// The payload parsed as a UTF-8 JSON document.
    Json(Value),
    /// The payload bytes, lossily converted to text.
    Raw(String),
}

impl Payload {
    /// Parses payload bytes, falling back to raw text when they are not JSON.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        if bytes.is_empty() {
            return Payload::Empty;
        }
        match serde_json::from_slice::<Value>(bytes) {
            Ok(value) => Payload::Json(value),
            Err(_) => Payload::Raw(String::from_utf8_lossy(bytes).into_owned()),
        }
    }

    /// Returns the JSON value when the payload parsed as JSON.
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Payload::Json(value) => Some(value),
            _ => None,
        }
    }

    /// Looks up a string field of a JSON-object payload.
    ///
    /// Returns `None` for raw or empty payloads, missing fields, and fields
    /// that are not strings.
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.as_json()?.get(key)?.as_str()
    }

    /// `true` when there is nothing to act on: no bytes, `null`, or an empty
    /// string/object/array.
    pub fn is_empty(&self) -> bool {
        match self {
            Payload::Empty => true,
            Payload::Raw(text) => text.is_empty(),
            Payload::Json(Value::Null) => true,
            Payload::Json(Value::String(s)) => s.is_empty(),
            Payload::Json(Value::Object(map)) => map.is_empty(),
            Payload::Json(Value::Array(items)) => items.is_empty(),
            Payload::Json(_) => false,
        }
    }
}

// ── Decoded message ───────────────────────────────────────────────────────────

/// One fully decoded frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodedMessage {
    /// Header block, `name → value`.  Every value is text, whatever its tag.
    pub headers: HeaderMap,
    /// The payload after JSON decoding (or raw-text fallback).
    pub payload: Payload,
    /// The frame's declared total length in bytes.
    pub total_length: u32,
}

impl DecodedMessage {
    /// Returns a header value by exact name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
