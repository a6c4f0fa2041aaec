//! Domain layer for evstream-bridge.
//!
//! Pure types with no dependency on I/O, async runtimes or the binary codec:
//!
//! - The target-protocol event vocabulary ([`SseEvent`] and friends).
//! - The bridge configuration ([`BridgeConfig`]).

pub mod config;
pub mod events;

pub use config::{BridgeConfig, ConfigError};
pub use events::{
    BlockDelta, BlockKind, ContentBlock, MessageDeltaBody, MessageObject, OutputUsage, SseEvent,
    Usage,
};
