//! Event classification: headers → backend event metadata.
//!
//! The backend marks each frame with up to three descriptive headers.  Most
//! frames use the colon-prefixed names (`:event-type`); some use the bare
//! names (`event-type`).  The prefixed name wins when both are present and
//! non-empty.

use serde::Serialize;

use crate::protocol::messages::{DecodedMessage, Payload};

/// Backend event metadata for one decoded message.
///
/// Missing headers become empty strings.  The payload is carried over
/// unchanged.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventInfo {
    /// e.g. `initial-response`, `assistantResponseEvent`, `toolUseEvent`.
    pub event_type: String,
    /// Usually `application/json`.
    pub content_type: String,
    /// `event`, `exception` or `error`.
    pub message_type: String,
    pub payload: Payload,
}

/// Projects a decoded message into [`EventInfo`].
///
/// Consumes the message so the payload moves instead of being cloned.
///
/// # Examples
///
/// ```rust
/// use evstream_core::{classify, decode_message, encode_frame};
///
/// let frame = encode_frame(&[("event-type", "assistantResponseEvent")], b"{}").unwrap();
/// let info = classify(decode_message(&frame).unwrap());
/// assert_eq!(info.event_type, "assistantResponseEvent");
/// assert_eq!(info.message_type, "");
/// ```
pub fn classify(message: DecodedMessage) -> EventInfo {
    EventInfo {
        event_type: lookup(&message, "event-type"),
        content_type: lookup(&message, "content-type"),
        message_type: lookup(&message, "message-type"),
        payload: message.payload,
    }
}

impl From<DecodedMessage> for EventInfo {
    fn from(message: DecodedMessage) -> Self {
        classify(message)
    }
}

impl EventInfo {
    /// `true` for frames the backend flags as exceptions or errors rather
    /// than regular events.
    pub fn is_exception(&self) -> bool {
        matches!(self.message_type.as_str(), "exception" | "error")
    }
}

fn lookup(message: &DecodedMessage, name: &str) -> String {
    let prefixed = format!(":{name}");
    message
        .header(&prefixed)
        .filter(|value| !value.is_empty())
        .or_else(|| message.header(name))
        .unwrap_or_default()
        .to_string()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
