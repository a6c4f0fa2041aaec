//! Per-stream encoder session: backend events → target-protocol events.
//!
//! One [`StreamSession`] exists per client-facing stream.  It owns all the
//! mutable state needed to turn the backend's flat event sequence into the
//! target protocol's nested block structure:
//!
//! - whether `message_start` has been sent,
//! - the currently open content block (index and kind),
//! - the next block index to allocate,
//! - character counts for the output-token estimate,
//! - the terminal stop reason.
//!
//! # Backend event mapping
//!
//! | Backend event            | Target events                                   |
//! |--------------------------|-------------------------------------------------|
//! | `initial-response`       | `message_start`, `ping` (first time only)       |
//! | `assistantResponseEvent` | [block switch to text], `text_delta`            |
//! | `reasoningContentEvent`  | [block switch to thinking], `text_delta`        |
//! | `toolUseEvent`           | [tool block start], `input_json_delta`, [stop]  |
//! | `assistantResponseEnd`   | `content_block_stop` for the open block         |
//! | anything else            | nothing                                         |
//!
//! [`StreamSession::finish`] closes the stream with `message_delta` and
//! `message_stop`.

use serde_json::Value;
use tracing::{debug, trace, warn};
use uuid::Uuid;

use evstream_core::protocol::EventInfo;

use crate::application::sse_encoder::{
    content_block_delta_event, content_block_start_event, content_block_stop_event,
    message_start_event, message_stop_events, tool_use_input_delta_event, tool_use_start_event,
};
use crate::domain::config::BridgeConfig;
use crate::domain::events::{BlockKind, SseEvent};

// ── Backend event names ───────────────────────────────────────────────────────

pub const INITIAL_RESPONSE: &str = "initial-response";
pub const ASSISTANT_RESPONSE: &str = "assistantResponseEvent";
pub const REASONING_CONTENT: &str = "reasoningContentEvent";
pub const TOOL_USE: &str = "toolUseEvent";
pub const ASSISTANT_RESPONSE_END: &str = "assistantResponseEnd";

/// Characters per output token in the usage estimate.
const CHARS_PER_TOKEN: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct OpenBlock {
    index: u32,
    kind: BlockKind,
}

/// Encoder state for one client-facing stream.
#[derive(Debug)]
pub struct StreamSession {
    id: String,
    model: String,
    input_tokens: u32,
    message_started: bool,
    finished: bool,
    next_index: u32,
    open_block: Option<OpenBlock>,
    stop_reason: Option<String>,
    text_chars: usize,
    tool_input_chars: usize,
}

impl StreamSession {
    /// A session with a generated `msg_<uuid>` id, used unless the backend's
    /// `initial-response` supplies a conversation id.
    pub fn new(config: &BridgeConfig) -> Self {
        Self::with_id(
            format!("msg_{}", Uuid::new_v4()),
            config.model.clone(),
            config.input_tokens,
        )
    }

    pub fn with_id(id: impl Into<String>, model: impl Into<String>, input_tokens: u32) -> Self {
        Self {
            id: id.into(),
            model: model.into(),
            input_tokens,
            message_started: false,
            finished: false,
            next_index: 0,
            open_block: None,
            stop_reason: None,
            text_chars: 0,
            tool_input_chars: 0,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn input_tokens(&self) -> u32 {
        self.input_tokens
    }

    /// `true` once `message_start` has been emitted.
    pub fn message_started(&self) -> bool {
        self.message_started
    }

    /// `true` once [`finish`](Self::finish) has run.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Records the stop reason reported by `message_delta`.
    pub fn set_stop_reason(&mut self, reason: impl Into<String>) {
        self.stop_reason = Some(reason.into());
    }

    /// Current output-token estimate: one token per four characters of text
    /// and tool input, never less than one.
    pub fn output_tokens(&self) -> u32 {
        let tokens = ((self.text_chars + self.tool_input_chars) / CHARS_PER_TOKEN).max(1);
        u32::try_from(tokens).unwrap_or(u32::MAX)
    }

    // ── Event handling ────────────────────────────────────────────────────────

    /// Translates one classified backend event into zero or more target
    /// events.  Never fails: unknown and malformed events produce nothing.
    pub fn handle(&mut self, event: &EventInfo) -> Vec<SseEvent> {
        let mut out = Vec::new();

        if self.finished {
            trace!(session = %self.id, event_type = %event.event_type, "event after finish ignored");
            return out;
        }

        if event.is_exception() {
            warn!(
                session = %self.id,
                message_type = %event.message_type,
                payload = ?event.payload,
                "backend reported an exception; frame skipped"
            );
            return out;
        }

        match event.event_type.as_str() {
            INITIAL_RESPONSE => self.on_initial_response(event, &mut out),
            ASSISTANT_RESPONSE => {
                let text = event.payload.str_field("content").unwrap_or_default();
                self.on_content(BlockKind::Text, text, &mut out);
            }
            REASONING_CONTENT => {
                let text = event
                    .payload
                    .str_field("text")
                    .or_else(|| event.payload.str_field("content"))
                    .unwrap_or_default();
                self.on_content(BlockKind::Thinking, text, &mut out);
            }
            TOOL_USE => self.on_tool_use(event, &mut out),
            ASSISTANT_RESPONSE_END => self.close_block(&mut out),
            other => {
                trace!(session = %self.id, event_type = other, "unhandled event type ignored");
            }
        }

        out
    }

    /// Closes the stream: closes any open block, then emits `message_delta`
    /// and `message_stop`.  Emits `message_start` first if the backend never
    /// sent an `initial-response`.  A second call returns nothing.
    pub fn finish(&mut self) -> Vec<SseEvent> {
        let mut out = Vec::new();
        if self.finished {
            return out;
        }
        self.ensure_message_start(&mut out);
        self.close_block(&mut out);

        let output_tokens = self.output_tokens();
        debug!(
            session = %self.id,
            input_tokens = self.input_tokens,
            output_tokens,
            blocks = self.next_index,
            "stream finished"
        );
        out.extend(message_stop_events(output_tokens, self.stop_reason.as_deref()));
        self.finished = true;
        out
    }

    fn on_initial_response(&mut self, event: &EventInfo, out: &mut Vec<SseEvent>) {
        if self.message_started {
            return;
        }
        if let Some(conversation_id) = event.payload.str_field("conversationId") {
            if !conversation_id.is_empty() {
                self.id = conversation_id.to_string();
            }
        }
        self.ensure_message_start(out);
        out.push(SseEvent::Ping);
    }

    fn on_content(&mut self, kind: BlockKind, text: &str, out: &mut Vec<SseEvent>) {
        self.ensure_message_start(out);
        let index = self.ensure_block(kind, out);
        if !text.is_empty() {
            self.text_chars += text.chars().count();
            out.push(content_block_delta_event(index, text));
        }
    }

    fn on_tool_use(&mut self, event: &EventInfo, out: &mut Vec<SseEvent>) {
        let tool_use_id = event.payload.str_field("toolUseId").unwrap_or_default();
        let name = event.payload.str_field("name").unwrap_or_default();

        let tool_open = matches!(self.open_block, Some(b) if b.kind == BlockKind::ToolUse);
        if !tool_open && !tool_use_id.is_empty() && !name.is_empty() {
            self.ensure_message_start(out);
            self.close_block(out);
            let index = self.open(BlockKind::ToolUse);
            out.push(tool_use_start_event(index, tool_use_id, name));
        }

        let Some(block) = self.open_block.filter(|b| b.kind == BlockKind::ToolUse) else {
            trace!(session = %self.id, "tool input without an open tool block ignored");
            return;
        };

        let json = event.payload.as_json();
        if let Some(fragment) = json.and_then(|v| v.get("input")).and_then(input_fragment) {
            self.tool_input_chars += fragment.chars().count();
            out.push(tool_use_input_delta_event(block.index, &fragment));
        }

        let stop = json
            .and_then(|v| v.get("stop"))
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if stop {
            self.close_block(out);
        }
    }

    // ── Block lifecycle ───────────────────────────────────────────────────────

    fn ensure_message_start(&mut self, out: &mut Vec<SseEvent>) {
        if !self.message_started {
            out.push(message_start_event(&self.id, &self.model, self.input_tokens));
            self.message_started = true;
        }
    }

    /// Returns the index of an open block of `kind`, closing a block of any
    /// other kind and opening a new one as needed.
    fn ensure_block(&mut self, kind: BlockKind, out: &mut Vec<SseEvent>) -> u32 {
        match self.open_block {
            Some(block) if block.kind == kind => block.index,
            _ => {
                self.close_block(out);
                let index = self.open(kind);
                out.push(content_block_start_event(index, kind));
                index
            }
        }
    }

    fn open(&mut self, kind: BlockKind) -> u32 {
        let index = self.next_index;
        self.next_index += 1;
        self.open_block = Some(OpenBlock { index, kind });
        debug!(session = %self.id, index, kind = kind.as_str(), "content block opened");
        index
    }

    fn close_block(&mut self, out: &mut Vec<SseEvent>) {
        if let Some(block) = self.open_block.take() {
            debug!(session = %self.id, index = block.index, "content block closed");
            out.push(content_block_stop_event(block.index));
        }
    }
}

/// The `input_json_delta` text for a tool event's `input` field: strings pass
/// through verbatim, other values are serialized.  Empty values yield `None`.
fn input_fragment(input: &Value) -> Option<String> {
    match input {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Object(map) if map.is_empty() => None,
        Value::Array(items) if items.is_empty() => None,
        other => Some(other.to_string()),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
