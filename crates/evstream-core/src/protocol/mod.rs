//! Protocol module containing the header codec, frame codec, decoded message
//! types and the event classifier.

pub mod classify;
pub mod codec;
pub mod headers;
pub mod messages;

pub use classify::{classify, EventInfo};
pub use codec::{decode_message, encode_frame, extract_frame, ProtocolError};
pub use headers::{decode_headers, encode_headers, HeaderMap, HeaderValueType};
pub use messages::*;
