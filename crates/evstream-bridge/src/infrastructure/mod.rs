//! Infrastructure layer for evstream-bridge.
//!
//! Everything that touches I/O or the async runtime lives here.
//!
//! # Responsibilities
//!
//! - Reading the backend byte stream and slicing it into frames
//! - Running the decoder on its own Tokio task behind a bounded channel
//! - Writing SSE frames (or the aggregated message) to the client sink
//! - Emitting keepalive pings while the backend is idle
//!
//! # What does NOT belong here?
//!
//! - Block/index bookkeeping (that is the application layer)
//! - Event type definitions (that is the domain layer)
//! - Argument and config file parsing (that is done in `main.rs`)

pub mod pipeline;
pub mod stream_decoder;

pub use pipeline::{run_pipeline, OutputMode, PipelineSummary};
pub use stream_decoder::{spawn_decoder, DecodeReport, DecodeStats, StreamDecoder, StreamError};
