//! Frame codec for the binary event-stream format.
//!
//! Wire format:
//! ```text
//! [total_len:4][headers_len:4][prelude_crc:4][headers:headers_len][payload:N][message_crc:4]
//! ```
//! All multi-byte integers are big-endian.  `total_len` counts every byte of
//! the frame including itself, so `N = total_len - 12 - headers_len - 4`.
//!
//! Two steps turn an accumulating byte buffer into messages:
//!
//! 1. [`extract_frame`] checks whether the buffer starts with a complete frame
//!    and, if so, splits it off.
//! 2. [`decode_message`] validates one frame's bounds, decodes its header
//!    block and parses its payload.
//!
//! [`encode_frame`] is the inverse, used to build fixtures for tests, benches
//! and recorded streams.  It writes real CRC-32 checksums even though the
//! decoder never checks them.

use thiserror::Error;
use tracing::trace;

use crate::protocol::headers::{decode_headers, encode_headers};
use crate::protocol::messages::{
    DecodedMessage, Payload, LENGTH_FIELD_SIZE, MESSAGE_CRC_SIZE, MIN_FRAME_SIZE, PRELUDE_SIZE,
};

/// Errors that can occur during frame encoding or decoding.
#[derive(Debug, Error, PartialEq)]
pub enum ProtocolError {
    /// The frame is shorter than the minimum frame size or than its own
    /// declared total length.
    #[error("incomplete message: need {needed} bytes, got {available}")]
    IncompleteMessage { needed: usize, available: usize },

    /// The prelude lengths describe header or payload bounds that do not fit
    /// inside the declared frame.
    #[error("malformed frame: total length {total_length}, headers length {headers_length}")]
    MalformedFrame {
        total_length: u32,
        headers_length: u32,
    },

    /// A header name does not fit the 1-byte length prefix.
    #[error("header name of {0} bytes exceeds 255")]
    HeaderNameTooLong(usize),

    /// A header value does not fit the 2-byte length prefix.
    #[error("header '{name}' value of {len} bytes exceeds 65535")]
    HeaderValueTooLong { name: String, len: usize },

    /// The encoded frame would not fit the 4-byte total length field.
    #[error("frame of {0} bytes exceeds u32::MAX")]
    FrameTooLarge(usize),
}

// ── Frame extraction ──────────────────────────────────────────────────────────

/// Splits one complete frame off the front of `buf`.
///
/// Returns `Some((frame, rest))` when `buf` holds at least as many bytes as
/// the big-endian total length in `buf[0..4]` declares.  Returns `None` when
/// fewer than 4 bytes are buffered or the frame is not complete yet; the
/// caller keeps its buffer and reads more.
///
/// The function never copies and never drops bytes: `frame` and `rest` are
/// subslices of `buf` and together cover it exactly.
///
/// A declared length below 4 cannot describe even its own length field.  It
/// is treated as a 4-byte frame so repeated calls always make progress; the
/// decoder then rejects that frame as incomplete.
///
/// # Examples
///
/// ```rust
/// use evstream_core::protocol::codec::{encode_frame, extract_frame};
///
/// let mut buf = encode_frame(&[], br#"{"a":1}"#).unwrap();
/// let frame_len = buf.len();
/// buf.extend_from_slice(b"next");
///
/// let (frame, rest) = extract_frame(&buf).unwrap();
/// assert_eq!(frame.len(), frame_len);
/// assert_eq!(rest, b"next");
/// assert!(extract_frame(&buf[..frame_len - 1]).is_none());
/// ```
pub fn extract_frame(buf: &[u8]) -> Option<(&[u8], &[u8])> {
    let declared = read_u32(buf, 0)? as usize;
    let frame_len = declared.max(LENGTH_FIELD_SIZE);
    if buf.len() < frame_len {
        return None;
    }
    Some(buf.split_at(frame_len))
}

// ── Frame decoding ────────────────────────────────────────────────────────────

/// Decodes exactly one frame into a [`DecodedMessage`].
///
/// Bytes past the declared total length are ignored.  The header block is
/// decoded leniently (see [`decode_headers`]) and a payload that is not JSON
/// is kept as raw text, so the only failures are structural.
///
/// # Errors
///
/// - [`ProtocolError::IncompleteMessage`] if `frame` is shorter than 16 bytes
///   or shorter than its declared total length.
/// - [`ProtocolError::MalformedFrame`] if the declared lengths put the header
///   block or payload outside the frame.
///
/// # Examples
///
/// ```rust
/// use evstream_core::protocol::codec::{decode_message, encode_frame};
/// use evstream_core::Payload;
///
/// let bytes = encode_frame(&[(":event-type", "initial-response")], b"{}").unwrap();
/// let msg = decode_message(&bytes).unwrap();
/// assert_eq!(msg.header(":event-type"), Some("initial-response"));
/// assert_eq!(msg.payload, Payload::Json(serde_json::json!({})));
/// ```
pub fn decode_message(frame: &[u8]) -> Result<DecodedMessage, ProtocolError> {
    if frame.len() < MIN_FRAME_SIZE {
        return Err(ProtocolError::IncompleteMessage {
            needed: MIN_FRAME_SIZE,
            available: frame.len(),
        });
    }

    // Both reads are in bounds: the frame holds at least 16 bytes.
    let total_length = read_u32(frame, 0).unwrap_or_default();
    let headers_length = read_u32(frame, 4).unwrap_or_default();

    let total = total_length as usize;
    if frame.len() < total {
        return Err(ProtocolError::IncompleteMessage {
            needed: total,
            available: frame.len(),
        });
    }

    // bytes[8..12] hold the prelude checksum; it is not verified.

    let headers_end = PRELUDE_SIZE + headers_length as usize;
    let payload_end = total.saturating_sub(MESSAGE_CRC_SIZE);
    if total < MIN_FRAME_SIZE || headers_end > payload_end {
        return Err(ProtocolError::MalformedFrame {
            total_length,
            headers_length,
        });
    }

    let headers = decode_headers(&frame[PRELUDE_SIZE..headers_end]);
    let payload = Payload::from_bytes(&frame[headers_end..payload_end]);

    trace!(
        "decoded frame: {total_length} bytes, {} headers, payload {}",
        headers.len(),
        payload_kind(&payload)
    );

    Ok(DecodedMessage {
        headers,
        payload,
        total_length,
    })
}

// ── Frame encoding ────────────────────────────────────────────────────────────

/// Encodes a complete frame from string headers and raw payload bytes.
///
/// # Errors
///
/// Returns [`ProtocolError`] if a header does not fit its length prefix or
/// the frame exceeds `u32::MAX` bytes.
pub fn encode_frame(headers: &[(&str, &str)], payload: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    let header_block = encode_headers(headers)?;
    let total = MIN_FRAME_SIZE + header_block.len() + payload.len();
    let total_length = u32::try_from(total).map_err(|_| ProtocolError::FrameTooLarge(total))?;
    // header_block.len() < total, so it fits as well.
    let headers_length = header_block.len() as u32;

    let mut buf = Vec::with_capacity(total);

    // Prelude: total_len (4) + headers_len (4) + prelude_crc (4) = 12 bytes
    buf.extend_from_slice(&total_length.to_be_bytes());
    buf.extend_from_slice(&headers_length.to_be_bytes());
    let prelude_crc = crc32fast::hash(&buf);
    buf.extend_from_slice(&prelude_crc.to_be_bytes());

    buf.extend_from_slice(&header_block);
    buf.extend_from_slice(payload);

    let message_crc = crc32fast::hash(&buf);
    buf.extend_from_slice(&message_crc.to_be_bytes());
    Ok(buf)
}

// ── Utility helpers ───────────────────────────────────────────────────────────

fn read_u32(buf: &[u8], offset: usize) -> Option<u32> {
    let bytes = buf.get(offset..offset + 4)?;
    Some(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

fn payload_kind(payload: &Payload) -> &'static str {
    match payload {
        Payload::Empty => "empty",
        Payload::Json(_) => "json",
        Payload::Raw(_) => "raw",
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Builds a frame by hand so tests do not depend on `encode_frame`.
    fn raw_frame(header_block: &[u8], payload: &[u8]) -> Vec<u8> {
        let total = (16 + header_block.len() + payload.len()) as u32;
        let mut buf = Vec::new();
        buf.extend_from_slice(&total.to_be_bytes());
        buf.extend_from_slice(&(header_block.len() as u32).to_be_bytes());
        buf.extend_from_slice(&[0u8; 4]);
        buf.extend_from_slice(header_block);
        buf.extend_from_slice(payload);
        buf.extend_from_slice(&[0u8; 4]);
        buf
    }

    // ── extract_frame ─────────────────────────────────────────────────────────

    #[test]
    fn test_extract_returns_frame_and_tail_unchanged() {
        // Arrange
        let frame = encode_frame(&[(":event-type", "x")], b"{}").unwrap();
        let tail = b"\x00\x00\x01\x00partial".to_vec();
        let mut buf = frame.clone();
        buf.extend_from_slice(&tail);

        // Act
        let (got_frame, got_rest) = extract_frame(&buf).unwrap();

        // Assert
        assert_eq!(got_frame, frame.as_slice());
        assert_eq!(got_rest, tail.as_slice());
    }

    #[test]
    fn test_extract_exact_frame_leaves_empty_rest() {
        let frame = encode_frame(&[], b"").unwrap();
        let (got, rest) = extract_frame(&frame).unwrap();
        assert_eq!(got.len(), 16);
        assert!(rest.is_empty());
    }

    #[test]
    fn test_extract_with_fewer_than_four_bytes_is_not_ready() {
        assert!(extract_frame(&[]).is_none());
        assert!(extract_frame(&[0, 0, 0]).is_none());
    }

    #[test]
    fn test_extract_partial_frame_is_not_ready() {
        let frame = encode_frame(&[("a", "b")], b"payload").unwrap();
        for cut in 0..frame.len() {
            assert!(extract_frame(&frame[..cut]).is_none(), "cut at {cut}");
        }
    }

    #[test]
    fn test_extract_tiny_declared_length_still_makes_progress() {
        // Arrange: declared total length of zero
        let buf = [0u8, 0, 0, 0, 0xAA, 0xBB];

        // Act
        let (frame, rest) = extract_frame(&buf).unwrap();

        // Assert: the length field itself is consumed
        assert_eq!(frame, &[0, 0, 0, 0]);
        assert_eq!(rest, &[0xAA, 0xBB]);
    }

    // ── decode_message ────────────────────────────────────────────────────────

    #[test]
    fn test_decode_json_frame_without_headers() {
        // Arrange: 16 bytes of framing + 7 payload bytes
        let frame = raw_frame(&[], br#"{"a":1}"#);

        // Act
        let msg = decode_message(&frame).unwrap();

        // Assert
        assert!(msg.headers.is_empty());
        assert_eq!(msg.payload, Payload::Json(json!({"a": 1})));
        assert_eq!(msg.total_length as usize, frame.len());
    }

    #[test]
    fn test_decode_non_json_payload_keeps_raw_text() {
        let frame = raw_frame(&[], b"not json at all");
        let msg = decode_message(&frame).unwrap();
        assert_eq!(msg.payload, Payload::Raw("not json at all".to_string()));
    }

    #[test]
    fn test_decode_empty_payload_is_empty() {
        let frame = raw_frame(&[], b"");
        let msg = decode_message(&frame).unwrap();
        assert_eq!(msg.payload, Payload::Empty);
        assert_eq!(msg.total_length, 16);
    }

    #[test]
    fn test_decode_reads_headers() {
        let block = encode_headers(&[(":event-type", "toolUseEvent"), (":message-type", "event")])
            .unwrap();
        let frame = raw_frame(&block, br#"{"stop":true}"#);
        let msg = decode_message(&frame).unwrap();
        assert_eq!(msg.header(":event-type"), Some("toolUseEvent"));
        assert_eq!(msg.header(":message-type"), Some("event"));
    }

    #[test]
    fn test_decode_short_frame_is_incomplete() {
        let result = decode_message(&[0u8; 15]);
        assert_eq!(
            result,
            Err(ProtocolError::IncompleteMessage {
                needed: 16,
                available: 15
            })
        );
    }

    #[test]
    fn test_decode_frame_shorter_than_declared_is_incomplete() {
        let frame = raw_frame(&[], b"abcdef");
        let result = decode_message(&frame[..frame.len() - 1]);
        assert!(matches!(
            result,
            Err(ProtocolError::IncompleteMessage { needed, .. }) if needed == frame.len()
        ));
    }

    #[test]
    fn test_decode_headers_length_past_payload_end_is_malformed() {
        // Arrange: claim a 100-byte header block inside a 20-byte frame
        let mut frame = raw_frame(&[], b"abcd");
        frame[4..8].copy_from_slice(&100u32.to_be_bytes());

        // Act
        let result = decode_message(&frame);

        // Assert
        assert_eq!(
            result,
            Err(ProtocolError::MalformedFrame {
                total_length: 20,
                headers_length: 100
            })
        );
    }

    #[test]
    fn test_decode_declared_length_below_minimum_is_malformed() {
        // 16 bytes present but the frame claims to be only 8 long.
        let mut frame = raw_frame(&[], b"");
        frame[0..4].copy_from_slice(&8u32.to_be_bytes());
        assert!(matches!(
            decode_message(&frame),
            Err(ProtocolError::MalformedFrame { total_length: 8, .. })
        ));
    }

    #[test]
    fn test_decode_ignores_trailing_bytes_past_total_length() {
        let mut frame = raw_frame(&[], br#"[1,2]"#);
        frame.extend_from_slice(b"garbage");
        let msg = decode_message(&frame).unwrap();
        assert_eq!(msg.payload, Payload::Json(json!([1, 2])));
    }

    #[test]
    fn test_decode_does_not_verify_checksums() {
        // raw_frame writes zero checksums; decoding must still succeed.
        let frame = raw_frame(&[], b"{}");
        assert!(decode_message(&frame).is_ok());
    }

    // ── encode_frame ──────────────────────────────────────────────────────────

    #[test]
    fn test_encode_frame_layout() {
        // Arrange
        let frame = encode_frame(&[("k", "v")], b"xy").unwrap();
        // header entry: 1 + 1 + 1 + 2 + 1 = 6 bytes
        let expected_total = 16 + 6 + 2;

        // Assert
        assert_eq!(frame.len(), expected_total);
        assert_eq!(read_u32(&frame, 0), Some(expected_total as u32));
        assert_eq!(read_u32(&frame, 4), Some(6));
        assert_eq!(&frame[18..20], b"xy");
    }

    #[test]
    fn test_encode_frame_writes_crc32_checksums() {
        let frame = encode_frame(&[(":event-type", "initial-response")], b"{}").unwrap();
        let n = frame.len();
        assert_eq!(read_u32(&frame, 8), Some(crc32fast::hash(&frame[..8])));
        assert_eq!(read_u32(&frame, n - 4), Some(crc32fast::hash(&frame[..n - 4])));
    }

    #[test]
    fn test_encode_then_decode_preserves_headers_and_payload() {
        let frame = encode_frame(
            &[(":event-type", "assistantResponseEvent"), (":content-type", "application/json")],
            br#"{"content":"hello"}"#,
        )
        .unwrap();
        let msg = decode_message(&frame).unwrap();
        assert_eq!(msg.headers.len(), 2);
        assert_eq!(msg.payload.str_field("content"), Some("hello"));
    }

    #[test]
    fn test_encode_frame_propagates_header_errors() {
        let name = "x".repeat(300);
        assert_eq!(
            encode_frame(&[(name.as_str(), "v")], b""),
            Err(ProtocolError::HeaderNameTooLong(300))
        );
    }
}
