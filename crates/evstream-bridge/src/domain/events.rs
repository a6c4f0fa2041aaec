//! Target-protocol streaming event types.
//!
//! A chat-completion stream is a sequence of named SSE events.  Each event's
//! `data:` line is a JSON object whose `"type"` field repeats the event name:
//!
//! ```text
//! message_start
//! content_block_start   ┐
//! content_block_delta*  │ once per content block, same index throughout
//! content_block_stop    ┘
//! ping                  (any time, keepalive)
//! message_delta
//! message_stop
//! ```
//!
//! Serde's internally tagged representation (`#[serde(tag = "type")]`)
//! produces exactly that shape, so these types serialize straight into the
//! `data:` payload.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ── Block kinds ───────────────────────────────────────────────────────────────

/// The three kinds of content block the target protocol streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    Text,
    Thinking,
    ToolUse,
}

impl BlockKind {
    /// The wire name, as used in `content_block.type`.
    pub fn as_str(self) -> &'static str {
        match self {
            BlockKind::Text => "text",
            BlockKind::Thinking => "thinking",
            BlockKind::ToolUse => "tool_use",
        }
    }
}

// ── Content blocks ────────────────────────────────────────────────────────────

/// A content block as announced by `content_block_start` and as it appears in
/// an aggregated message.
///
/// # Serde representation
///
/// ```json
/// {"type":"text","text":""}
/// {"type":"thinking","text":""}
/// {"type":"tool_use","id":"tooluse_1","name":"search","input":{}}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    Thinking {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        /// Always `{}` at block start; the arguments follow as
        /// `input_json_delta` fragments.
        input: Value,
    },
}

impl ContentBlock {
    /// An empty block of `kind`, as sent in `content_block_start`.
    ///
    /// Tool blocks need an id and name; use [`ContentBlock::tool_use`].
    pub fn empty(kind: BlockKind) -> Self {
        match kind {
            BlockKind::Text => ContentBlock::Text {
                text: String::new(),
            },
            BlockKind::Thinking => ContentBlock::Thinking {
                text: String::new(),
            },
            BlockKind::ToolUse => ContentBlock::tool_use("", ""),
        }
    }

    /// A tool invocation block with an empty input object.
    pub fn tool_use(id: impl Into<String>, name: impl Into<String>) -> Self {
        ContentBlock::ToolUse {
            id: id.into(),
            name: name.into(),
            input: Value::Object(serde_json::Map::new()),
        }
    }

    pub fn kind(&self) -> BlockKind {
        match self {
            ContentBlock::Text { .. } => BlockKind::Text,
            ContentBlock::Thinking { .. } => BlockKind::Thinking,
            ContentBlock::ToolUse { .. } => BlockKind::ToolUse,
        }
    }
}

/// The incremental payload of a `content_block_delta`.
///
/// ```json
/// {"type":"text_delta","text":"Hel"}
/// {"type":"input_json_delta","partial_json":"{\"city\":"}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockDelta {
    /// Used for both text and thinking blocks.
    TextDelta { text: String },
    /// Used for tool_use blocks.
    InputJsonDelta { partial_json: String },
}

// ── Message object ────────────────────────────────────────────────────────────

/// Token usage as reported in `message_start` and aggregated responses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// The assistant message object.
///
/// Carried (with empty `content`) by `message_start`, and returned whole by
/// the non-streaming aggregator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageObject {
    pub id: String,
    /// Always `"message"`.
    #[serde(rename = "type")]
    pub object: String,
    /// Always `"assistant"`.
    pub role: String,
    pub content: Vec<ContentBlock>,
    pub model: String,
    pub stop_reason: Option<String>,
    pub stop_sequence: Option<String>,
    pub usage: Usage,
}

impl MessageObject {
    /// A fresh assistant message with no content and no stop reason.
    pub fn new(id: impl Into<String>, model: impl Into<String>, input_tokens: u32) -> Self {
        Self {
            id: id.into(),
            object: "message".to_string(),
            role: "assistant".to_string(),
            content: Vec::new(),
            model: model.into(),
            stop_reason: None,
            stop_sequence: None,
            usage: Usage {
                input_tokens,
                output_tokens: 0,
            },
        }
    }
}

/// `delta` of a `message_delta` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageDeltaBody {
    pub stop_reason: String,
    pub stop_sequence: Option<String>,
}

/// `usage` of a `message_delta` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputUsage {
    pub output_tokens: u32,
}

// ── Stream events ─────────────────────────────────────────────────────────────

/// One target-protocol streaming event.
///
/// # Serde representation
///
/// ```json
/// {"type":"content_block_stop","index":0}
/// {"type":"message_stop"}
/// {"type":"ping"}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SseEvent {
    MessageStart {
        message: MessageObject,
    },
    ContentBlockStart {
        index: u32,
        content_block: ContentBlock,
    },
    ContentBlockDelta {
        index: u32,
        delta: BlockDelta,
    },
    ContentBlockStop {
        index: u32,
    },
    MessageDelta {
        delta: MessageDeltaBody,
        usage: OutputUsage,
    },
    MessageStop,
    Ping,
}

impl SseEvent {
    /// The SSE `event:` name, identical to the JSON `"type"` field.
    pub fn event_name(&self) -> &'static str {
        match self {
            SseEvent::MessageStart { .. } => "message_start",
            SseEvent::ContentBlockStart { .. } => "content_block_start",
            SseEvent::ContentBlockDelta { .. } => "content_block_delta",
            SseEvent::ContentBlockStop { .. } => "content_block_stop",
            SseEvent::MessageDelta { .. } => "message_delta",
            SseEvent::MessageStop => "message_stop",
            SseEvent::Ping => "ping",
        }
    }

    /// The content-block index for block events, `None` otherwise.
    pub fn block_index(&self) -> Option<u32> {
        match self {
            SseEvent::ContentBlockStart { index, .. }
            | SseEvent::ContentBlockDelta { index, .. }
            | SseEvent::ContentBlockStop { index } => Some(*index),
            _ => None,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
