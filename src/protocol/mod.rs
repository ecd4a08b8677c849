//! Protocol module - payload layout and response-line handling.
//!
//! This module implements both directions of the device link:
//! - Payload encoding (784 pixel bytes, optionally plus a label byte)
//! - Line buffer for accumulating partial serial reads
//! - Lenient decoding of response lines and sentinel detection

mod line_buffer;
mod response;
mod wire_format;

pub use line_buffer::{LineBuffer, DEFAULT_MAX_LINE_LEN};
pub use response::{decode_line, ResponseLine, SENTINEL_PREFIX};
pub use wire_format::{Payload, TransferMode, DEFAULT_BAUD_RATE, LABEL_SIZE};
