//! Application layer for evstream-bridge.
//!
//! Knows *what* to emit for each backend event, but never touches sockets,
//! files or tasks.
//!
//! # Responsibilities
//!
//! - Rendering target-protocol SSE frames ([`sse_encoder`])
//! - Tracking per-stream block and token state ([`StreamSession`])
//! - Folding a finished stream into one message ([`ResponseAggregator`])
//!
//! # What does NOT belong here?
//!
//! - Reading the backend byte stream (infrastructure)
//! - Tokio task spawning and keepalive timers (infrastructure)

pub mod aggregate;
pub mod session;
pub mod sse_encoder;

pub use aggregate::ResponseAggregator;
pub use session::StreamSession;
pub use sse_encoder::{format_event, format_events, EncodeError};
