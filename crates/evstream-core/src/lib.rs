//! # evstream-core
//!
//! Pure decoding library for the binary event-stream framing used by the
//! assistant backend.  It turns raw frame bytes into [`DecodedMessage`]
//! values and projects them into [`EventInfo`] records that the bridge crate
//! re-encodes as Server-Sent Events.
//!
//! This crate has no I/O, no async runtime and no global state.  Everything
//! here is a function of its input bytes.
//!
//! # Wire format overview
//!
//! ```text
//! [total_len:4][headers_len:4][prelude_crc:4][headers:headers_len][payload:N][message_crc:4]
//! ```
//!
//! All integers are big-endian.  `N = total_len - 12 - headers_len - 4`.
//! Neither checksum is verified on decode.
//!
//! - **`protocol::headers`** – the compact `name → value` header block.
//! - **`protocol::codec`** – frame extraction from an accumulating buffer,
//!   single-frame decoding, and the matching encoder used for fixtures.
//! - **`protocol::classify`** – maps a decoded message's headers to the
//!   backend event metadata (event type, content type, message type).

pub mod protocol;

pub use protocol::classify::{classify, EventInfo};
pub use protocol::codec::{decode_message, encode_frame, extract_frame, ProtocolError};
pub use protocol::headers::{decode_headers, encode_headers, HeaderMap};
pub use protocol::messages::{DecodedMessage, Payload};
