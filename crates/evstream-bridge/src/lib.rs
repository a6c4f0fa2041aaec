//! evstream-bridge library crate.
//!
//! This crate lets a client that speaks the chat-completion Server-Sent-Events
//! protocol consume an assistant backend that only speaks the binary
//! event-stream framing.
//!
//! # Architecture (clean architecture)
//!
//! ```text
//! Backend response body (binary event-stream frames)
//!         ↓
//! [evstream-bridge]
//!   ├── infrastructure/
//!   │     ├── stream_decoder/  read loop: bytes → DecodedMessage (tokio worker)
//!   │     └── pipeline/        decoder → classifier → session → SSE writer
//!   ├── application/
//!   │     ├── sse_encoder/     target-protocol SSE frame primitives
//!   │     ├── session/         per-stream block/index/token state
//!   │     └── aggregate/       SSE events → one non-streaming message
//!   └── domain/               SSE event types, BridgeConfig
//!         ↓
//! Client (text/event-stream)
//! ```
//!
//! # Layer rules
//!
//! - `domain` has no I/O and no async.
//! - `application` depends on `domain` and `evstream-core` only.
//! - `infrastructure` depends on all other layers plus `tokio`.
//!
//! Every piece of mutable state (the decoder's byte buffer, the encoder
//! session) is created per stream.  Nothing is shared between streams.

/// Domain layer: target-protocol event types and configuration (no I/O).
pub mod domain;

/// Application layer: SSE encoding, session state and aggregation.
pub mod application;

/// Infrastructure layer: the stream decoder worker and the bridge pipeline.
pub mod infrastructure;
