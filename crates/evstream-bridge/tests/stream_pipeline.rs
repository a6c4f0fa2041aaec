//! End-to-end tests: binary frames in, target-protocol SSE out.
//!
//! The input is built with the core frame encoder and delivered through
//! scripted reads, so frame boundaries never line up with read boundaries.

use std::time::Duration;

use serde_json::{json, Value};
use tokio_test::io::Builder;

use evstream_bridge::domain::BridgeConfig;
use evstream_bridge::infrastructure::{run_pipeline, OutputMode};
use evstream_core::encode_frame;

fn frame(event_type: &str, payload: Value) -> Vec<u8> {
    encode_frame(
        &[
            (":event-type", event_type),
            (":content-type", "application/json"),
            (":message-type", "event"),
        ],
        payload.to_string().as_bytes(),
    )
    .unwrap()
}

fn config() -> BridgeConfig {
    BridgeConfig {
        model: "claude-sonnet-4.5".to_string(),
        input_tokens: 5,
        ping_interval: Duration::ZERO,
        ..BridgeConfig::default()
    }
}

/// Parses SSE text into `(event, data)` pairs, checking the frame layout.
fn parse_sse(text: &str) -> Vec<(String, Value)> {
    assert!(text.ends_with("\n\n"));
    text.split_terminator("\n\n")
        .map(|frame| {
            let (event_line, data_line) = frame.split_once('\n').expect("two lines");
            let event = event_line.strip_prefix("event: ").expect("event line");
            let data = data_line.strip_prefix("data: ").expect("data line");
            let data: Value = serde_json::from_str(data).expect("data is JSON");
            assert_eq!(data["type"], event, "event name repeats data.type");
            (event.to_string(), data)
        })
        .collect()
}

/// Splits `bytes` into reads of `step` bytes.
fn chunked(bytes: &[u8], step: usize) -> tokio_test::io::Mock {
    let mut builder = Builder::new();
    for chunk in bytes.chunks(step) {
        builder.read(chunk);
    }
    builder.build()
}

#[tokio::test]
async fn test_three_frames_split_mid_frame() {
    // Arrange: 13-byte reads split every frame somewhere inside.
    let input = [
        frame("initial-response", json!({"conversationId": "conv-e2e"})),
        frame("assistantResponseEvent", json!({"content": "hi"})),
        frame("assistantResponseEnd", json!({})),
    ]
    .concat();
    let mut out = Vec::new();

    // Act
    let summary = run_pipeline(chunked(&input, 13), &mut out, &config(), OutputMode::Sse)
        .await
        .unwrap();

    // Assert
    let frames = parse_sse(&String::from_utf8(out).unwrap());
    let names: Vec<&str> = frames.iter().map(|(e, _)| e.as_str()).collect();
    assert_eq!(
        names,
        [
            "message_start",
            "ping",
            "content_block_start",
            "content_block_delta",
            "content_block_stop",
            "message_delta",
            "message_stop"
        ]
    );
    assert_eq!(frames[0].1["message"]["id"], "conv-e2e");
    assert_eq!(frames[0].1["message"]["usage"]["input_tokens"], 5);
    assert_eq!(
        frames[3].1,
        json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": "hi"}})
    );
    assert_eq!(frames[5].1["delta"]["stop_reason"], "end_turn");
    assert_eq!(frames[5].1["usage"]["output_tokens"], 1);
    assert_eq!(summary.decode.frames, 3);
}

#[tokio::test]
async fn test_thinking_text_and_tool_blocks_get_sequential_indices() {
    // Arrange
    let input = [
        frame("initial-response", json!({"conversationId": "c"})),
        frame("reasoningContentEvent", json!({"text": "Checking the weather tool."})),
        frame("assistantResponseEvent", json!({"content": "Let me look that up."})),
        frame(
            "toolUseEvent",
            json!({"toolUseId": "tooluse_9", "name": "get_weather", "input": "{\"city\":"}),
        ),
        frame(
            "toolUseEvent",
            json!({"toolUseId": "tooluse_9", "name": "get_weather", "input": "\"Oslo\"}"}),
        ),
        frame(
            "toolUseEvent",
            json!({"toolUseId": "tooluse_9", "name": "get_weather", "stop": true}),
        ),
    ]
    .concat();
    let mut out = Vec::new();

    // Act
    run_pipeline(chunked(&input, 64), &mut out, &config(), OutputMode::Sse)
        .await
        .unwrap();

    // Assert
    let frames = parse_sse(&String::from_utf8(out).unwrap());
    let starts: Vec<(u64, String)> = frames
        .iter()
        .filter(|(e, _)| e == "content_block_start")
        .map(|(_, d)| {
            (
                d["index"].as_u64().unwrap(),
                d["content_block"]["type"].as_str().unwrap().to_string(),
            )
        })
        .collect();
    assert_eq!(
        starts,
        [
            (0, "thinking".to_string()),
            (1, "text".to_string()),
            (2, "tool_use".to_string())
        ]
    );

    let stops: Vec<u64> = frames
        .iter()
        .filter(|(e, _)| e == "content_block_stop")
        .map(|(_, d)| d["index"].as_u64().unwrap())
        .collect();
    assert_eq!(stops, [0, 1, 2]);

    let tool_json: String = frames
        .iter()
        .filter(|(_, d)| d["delta"]["type"] == "input_json_delta")
        .map(|(_, d)| d["delta"]["partial_json"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(
        serde_json::from_str::<Value>(&tool_json).unwrap(),
        json!({"city": "Oslo"})
    );
}

#[tokio::test]
async fn test_corrupt_and_exception_frames_do_not_break_the_stream() {
    // Arrange: a structurally broken frame and a backend exception between
    // two good text frames.
    let mut broken = vec![0u8; 20];
    broken[..4].copy_from_slice(&20u32.to_be_bytes());
    broken[4..8].copy_from_slice(&64u32.to_be_bytes());
    let exception = encode_frame(
        &[
            (":exception-type", "ThrottlingException"),
            (":message-type", "exception"),
        ],
        b"Rate exceeded",
    )
    .unwrap();
    let input = [
        frame("assistantResponseEvent", json!({"content": "one "})),
        broken,
        exception,
        frame("assistantResponseEvent", json!({"content": "two"})),
    ]
    .concat();
    let mut out = Vec::new();

    // Act
    let summary = run_pipeline(chunked(&input, 7), &mut out, &config(), OutputMode::Sse)
        .await
        .unwrap();

    // Assert
    let frames = parse_sse(&String::from_utf8(out).unwrap());
    let text: String = frames
        .iter()
        .filter_map(|(_, d)| d["delta"]["text"].as_str().map(str::to_string))
        .collect();
    assert_eq!(text, "one two");
    assert_eq!(frames.first().unwrap().0, "message_start");
    assert_eq!(frames.last().unwrap().0, "message_stop");
    assert_eq!(summary.decode.skipped, 1);
    assert_eq!(summary.decode.frames, 3);
}

#[tokio::test]
async fn test_aggregate_mode_matches_streamed_content() {
    // Arrange
    let input = [
        frame("initial-response", json!({"conversationId": "agg-1"})),
        frame("assistantResponseEvent", json!({"content": "The answer is 42."})),
        frame("assistantResponseEnd", json!({})),
    ]
    .concat();
    let mut out = Vec::new();

    // Act
    run_pipeline(chunked(&input, 5), &mut out, &config(), OutputMode::Aggregate)
        .await
        .unwrap();

    // Assert
    let message: Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(
        message,
        json!({
            "id": "agg-1",
            "type": "message",
            "role": "assistant",
            "content": [{"type": "text", "text": "The answer is 42."}],
            "model": "claude-sonnet-4.5",
            "stop_reason": "end_turn",
            "stop_sequence": null,
            "usage": {"input_tokens": 5, "output_tokens": 4}
        })
    );
}
