pub mod error;
pub mod frames;
pub mod sse;

pub use error::{ProtocolError, Result};
pub use frames::{decode_event, encode_event, EventFrame};
pub use sse::{SseDecoder, SseLine};
