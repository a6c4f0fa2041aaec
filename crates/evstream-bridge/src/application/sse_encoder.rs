//! Target-protocol SSE frame primitives.
//!
//! Every emitted unit is a text frame of exactly this shape:
//!
//! ```text
//! event: <event-type>\n
//! data: <JSON payload>\n
//! \n
//! ```
//!
//! The `build_*` functions each render one (or, for `build_message_stop`,
//! two) frames and are the only place the SSE text layout is produced.  They
//! do not allocate block indices: the caller passes the index the block was
//! opened with.  [`crate::application::StreamSession`] is the caller that
//! tracks indices.
//!
//! The matching `*_event` constructors return the typed [`SseEvent`] instead
//! of text, for callers that want to inspect or aggregate events before
//! rendering them.

use std::fmt::Write as _;

use thiserror::Error;

use crate::domain::events::{
    BlockDelta, BlockKind, ContentBlock, MessageDeltaBody, MessageObject, OutputUsage, SseEvent,
};

/// Stop reason reported when the caller never recorded one.
pub const DEFAULT_STOP_REASON: &str = "end_turn";

// ── Error type ────────────────────────────────────────────────────────────────

/// Errors raised while rendering an SSE frame.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// The event's data object could not be serialized as JSON.
    #[error("failed to serialize SSE event data: {0}")]
    Json(#[from] serde_json::Error),
}

// ── Formatting ────────────────────────────────────────────────────────────────

/// Renders one event as an SSE text frame, including the trailing blank line.
pub fn format_event(event: &SseEvent) -> Result<String, EncodeError> {
    let data = serde_json::to_string(event)?;
    let mut frame = String::with_capacity(data.len() + 32);
    // Writing into a String cannot fail.
    let _ = write!(frame, "event: {}\ndata: {}\n\n", event.event_name(), data);
    Ok(frame)
}

/// Renders a sequence of events back to back.
pub fn format_events<'a, I>(events: I) -> Result<String, EncodeError>
where
    I: IntoIterator<Item = &'a SseEvent>,
{
    let mut out = String::new();
    for event in events {
        out.push_str(&format_event(event)?);
    }
    Ok(out)
}

// ── Event constructors ────────────────────────────────────────────────────────

pub fn message_start_event(id: &str, model: &str, input_tokens: u32) -> SseEvent {
    SseEvent::MessageStart {
        message: MessageObject::new(id, model, input_tokens),
    }
}

/// `content_block_start` for a text or thinking block.
///
/// Passing [`BlockKind::ToolUse`] yields a tool block with empty id and
/// name; use [`tool_use_start_event`] for real tool invocations.
pub fn content_block_start_event(index: u32, kind: BlockKind) -> SseEvent {
    SseEvent::ContentBlockStart {
        index,
        content_block: ContentBlock::empty(kind),
    }
}

pub fn tool_use_start_event(index: u32, tool_use_id: &str, tool_name: &str) -> SseEvent {
    SseEvent::ContentBlockStart {
        index,
        content_block: ContentBlock::tool_use(tool_use_id, tool_name),
    }
}

/// `text_delta` for a text or thinking block.
pub fn content_block_delta_event(index: u32, text: &str) -> SseEvent {
    SseEvent::ContentBlockDelta {
        index,
        delta: BlockDelta::TextDelta {
            text: text.to_string(),
        },
    }
}

pub fn tool_use_input_delta_event(index: u32, partial_json: &str) -> SseEvent {
    SseEvent::ContentBlockDelta {
        index,
        delta: BlockDelta::InputJsonDelta {
            partial_json: partial_json.to_string(),
        },
    }
}

pub fn content_block_stop_event(index: u32) -> SseEvent {
    SseEvent::ContentBlockStop { index }
}

/// The closing pair: `message_delta` followed by `message_stop`.
pub fn message_stop_events(output_tokens: u32, stop_reason: Option<&str>) -> [SseEvent; 2] {
    [
        SseEvent::MessageDelta {
            delta: MessageDeltaBody {
                stop_reason: stop_reason.unwrap_or(DEFAULT_STOP_REASON).to_string(),
                stop_sequence: None,
            },
            usage: OutputUsage { output_tokens },
        },
        SseEvent::MessageStop,
    ]
}

// ── Frame builders ────────────────────────────────────────────────────────────

pub fn build_message_start(id: &str, model: &str, input_tokens: u32) -> Result<String, EncodeError> {
    format_event(&message_start_event(id, model, input_tokens))
}

pub fn build_content_block_start(index: u32, kind: BlockKind) -> Result<String, EncodeError> {
    format_event(&content_block_start_event(index, kind))
}

pub fn build_tool_use_start(
    index: u32,
    tool_use_id: &str,
    tool_name: &str,
) -> Result<String, EncodeError> {
    format_event(&tool_use_start_event(index, tool_use_id, tool_name))
}

pub fn build_content_block_delta(index: u32, text: &str) -> Result<String, EncodeError> {
    format_event(&content_block_delta_event(index, text))
}

pub fn build_tool_use_input_delta(index: u32, partial_json: &str) -> Result<String, EncodeError> {
    format_event(&tool_use_input_delta_event(index, partial_json))
}

pub fn build_content_block_stop(index: u32) -> Result<String, EncodeError> {
    format_event(&content_block_stop_event(index))
}

pub fn build_ping() -> Result<String, EncodeError> {
    format_event(&SseEvent::Ping)
}

/// Renders `message_delta` immediately followed by `message_stop`.
///
/// `input_tokens` is not part of either frame; the target protocol reports it
/// once in `message_start`.  It is accepted so callers can log the final
/// accounting in one place.
pub fn build_message_stop(
    input_tokens: u32,
    output_tokens: u32,
    stop_reason: Option<&str>,
) -> Result<String, EncodeError> {
    tracing::trace!(
        input_tokens,
        output_tokens,
        stop_reason = stop_reason.unwrap_or(DEFAULT_STOP_REASON),
        "closing message"
    );
    format_events(&message_stop_events(output_tokens, stop_reason))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
