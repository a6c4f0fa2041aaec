//! Non-streaming responses: fold target-protocol events into one message.
//!
//! Clients that ask for a non-streaming response still get the same
//! translation; the events a [`StreamSession`](super::StreamSession) produces
//! are accumulated here instead of being written out, and the finished
//! [`MessageObject`] is returned as a single JSON document.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::debug;

use crate::domain::events::{BlockDelta, ContentBlock, MessageObject, SseEvent, Usage};

/// A block under construction.  Tool input arrives as JSON text fragments and
/// is only parsed once the block stops.
#[derive(Debug)]
struct PendingBlock {
    block: ContentBlock,
    partial_json: String,
}

/// Accumulates target-protocol events into a [`MessageObject`].
#[derive(Debug)]
pub struct ResponseAggregator {
    id: String,
    model: String,
    usage: Usage,
    stop_reason: Option<String>,
    blocks: BTreeMap<u32, PendingBlock>,
}

impl ResponseAggregator {
    /// `id` and `model` are used unless a `message_start` event overrides
    /// them.
    pub fn new(id: impl Into<String>, model: impl Into<String>, input_tokens: u32) -> Self {
        Self {
            id: id.into(),
            model: model.into(),
            usage: Usage {
                input_tokens,
                output_tokens: 0,
            },
            stop_reason: None,
            blocks: BTreeMap::new(),
        }
    }

    /// Applies one event.  Events for unknown indices are ignored.
    pub fn apply(&mut self, event: &SseEvent) {
        match event {
            SseEvent::MessageStart { message } => {
                self.id.clone_from(&message.id);
                self.model.clone_from(&message.model);
                self.usage.input_tokens = message.usage.input_tokens;
            }
            SseEvent::ContentBlockStart {
                index,
                content_block,
            } => {
                self.blocks.insert(
                    *index,
                    PendingBlock {
                        block: content_block.clone(),
                        partial_json: String::new(),
                    },
                );
            }
            SseEvent::ContentBlockDelta { index, delta } => {
                let Some(pending) = self.slot_mut(*index) else {
                    debug!(index, "delta for unknown block ignored");
                    return;
                };
                match (&mut pending.block, delta) {
                    (
                        ContentBlock::Text { text } | ContentBlock::Thinking { text },
                        BlockDelta::TextDelta { text: more },
                    ) => text.push_str(more),
                    (ContentBlock::ToolUse { .. }, BlockDelta::InputJsonDelta { partial_json }) => {
                        pending.partial_json.push_str(partial_json)
                    }
                    _ => debug!(index, "delta kind does not match block kind"),
                }
            }
            SseEvent::ContentBlockStop { index } => {
                if let Some(pending) = self.slot_mut(*index) {
                    finalize_tool_input(pending);
                }
            }
            SseEvent::MessageDelta { delta, usage } => {
                self.stop_reason = Some(delta.stop_reason.clone());
                self.usage.output_tokens = usage.output_tokens;
            }
            SseEvent::MessageStop | SseEvent::Ping => {}
        }
    }

    pub fn extend<'a, I>(&mut self, events: I)
    where
        I: IntoIterator<Item = &'a SseEvent>,
    {
        for event in events {
            self.apply(event);
        }
    }

    /// The finished message, blocks ordered by index.
    pub fn into_message(self) -> MessageObject {
        let content = self
            .blocks
            .into_values()
            .map(|mut pending| {
                finalize_tool_input(&mut pending);
                pending.block
            })
            .collect();

        MessageObject {
            content,
            stop_reason: self.stop_reason,
            usage: self.usage,
            ..MessageObject::new(self.id, self.model, self.usage.input_tokens)
        }
    }

    fn slot_mut(&mut self, index: u32) -> Option<&mut PendingBlock> {
        self.blocks.get_mut(&index)
    }
}

/// Parses accumulated tool input into the block's `input`.  Input that does
/// not parse leaves `input` as it was (`{}` from block start).
fn finalize_tool_input(pending: &mut PendingBlock) {
    if pending.partial_json.is_empty() {
        return;
    }
    let raw = std::mem::take(&mut pending.partial_json);
    if let ContentBlock::ToolUse { input, id, .. } = &mut pending.block {
        match serde_json::from_str::<Value>(&raw) {
            Ok(parsed) => *input = parsed,
            Err(e) => debug!(tool_use_id = %id, error = %e, "tool input is not valid JSON"),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
