//! Integration tests for the evstream-core frame codec.
//!
//! These tests drive the public API the way the bridge's stream decoder does:
//! accumulate bytes, split complete frames off the front, decode each one and
//! classify it.

use evstream_core::{
    classify, decode_message, encode_frame, extract_frame, DecodedMessage, Payload,
};
use serde_json::json;

/// Repeatedly extracts and decodes frames from `buf`, returning the decoded
/// messages and the number of bytes left over.
fn drain_frames(buf: &[u8]) -> (Vec<DecodedMessage>, usize) {
    let mut messages = Vec::new();
    let mut rest = buf;
    while let Some((frame, tail)) = extract_frame(rest) {
        if let Ok(msg) = decode_message(frame) {
            messages.push(msg);
        }
        rest = tail;
    }
    (messages, rest.len())
}

fn event_frame(event_type: &str, payload: &str) -> Vec<u8> {
    encode_frame(
        &[
            (":event-type", event_type),
            (":content-type", "application/json"),
            (":message-type", "event"),
        ],
        payload.as_bytes(),
    )
    .expect("encode must succeed")
}

#[test]
fn test_three_concatenated_frames_decode_in_order() {
    // Arrange
    let mut buf = event_frame("initial-response", r#"{"conversationId":"c-1"}"#);
    buf.extend(event_frame("assistantResponseEvent", r#"{"content":"Hel"}"#));
    buf.extend(event_frame("assistantResponseEvent", r#"{"content":"lo"}"#));

    // Act
    let (messages, leftover) = drain_frames(&buf);

    // Assert
    assert_eq!(leftover, 0);
    let events: Vec<_> = messages.into_iter().map(classify).collect();
    assert_eq!(events.len(), 3);
    assert_eq!(events[0].event_type, "initial-response");
    assert_eq!(events[1].payload.str_field("content"), Some("Hel"));
    assert_eq!(events[2].payload.str_field("content"), Some("lo"));
}

#[test]
fn test_partial_trailing_frame_is_left_in_buffer() {
    let first = event_frame("assistantResponseEvent", r#"{"content":"a"}"#);
    let second = event_frame("assistantResponseEvent", r#"{"content":"b"}"#);
    let mut buf = first.clone();
    buf.extend_from_slice(&second[..second.len() / 2]);

    let (messages, leftover) = drain_frames(&buf);

    assert_eq!(messages.len(), 1);
    assert_eq!(leftover, second.len() / 2);
}

#[test]
fn test_malformed_frame_is_skipped_and_following_frame_decodes() {
    // Arrange: a frame whose headers length overruns the payload bounds
    let mut bad = event_frame("assistantResponseEvent", r#"{"content":"bad"}"#);
    bad[4..8].copy_from_slice(&0xFFFFu32.to_be_bytes());
    let good = event_frame("assistantResponseEvent", r#"{"content":"good"}"#);
    let mut buf = bad;
    buf.extend(good);

    // Act
    let (messages, leftover) = drain_frames(&buf);

    // Assert
    assert_eq!(leftover, 0);
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].payload.str_field("content"), Some("good"));
}

#[test]
fn test_plain_text_exception_payload_survives() {
    let frame = encode_frame(
        &[(":message-type", "exception"), (":exception-type", "ThrottlingException")],
        b"Rate exceeded",
    )
    .unwrap();

    let info = classify(decode_message(&frame).unwrap());

    assert!(info.is_exception());
    assert_eq!(info.payload, Payload::Raw("Rate exceeded".to_string()));
}

#[test]
fn test_tool_use_payload_keeps_nested_json() {
    let frame = event_frame(
        "toolUseEvent",
        r#"{"toolUseId":"tooluse_1","name":"get_weather","input":"{\"city\":","stop":false}"#,
    );

    let msg = decode_message(&frame).unwrap();

    assert_eq!(
        msg.payload,
        Payload::Json(json!({
            "toolUseId": "tooluse_1",
            "name": "get_weather",
            "input": "{\"city\":",
            "stop": false
        }))
    );
}

#[test]
fn test_decoded_message_serializes_for_inspection() {
    let frame = event_frame("assistantResponseEvent", r#"{"content":"x"}"#);
    let msg = decode_message(&frame).unwrap();

    let value = serde_json::to_value(&msg).unwrap();

    assert_eq!(value["headers"][":event-type"], "assistantResponseEvent");
    assert_eq!(value["payload"]["content"], "x");
    assert_eq!(value["total_length"], frame.len());
}
