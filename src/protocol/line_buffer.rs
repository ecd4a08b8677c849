//! Line buffer for accumulating partial serial reads.
//!
//! Uses `bytes::BytesMut` so completed lines are split off without copying.
//! Serial drivers return whatever bytes have arrived, so a single device
//! line may take several reads, and one read may carry several lines.
//!
//! # Example
//!
//! ```
//! use digitwire::protocol::LineBuffer;
//!
//! let mut buffer = LineBuffer::new();
//! buffer.push(b"REA");
//! assert!(buffer.next_line().is_none());
//!
//! buffer.push(b"DY\nPredic");
//! assert_eq!(&buffer.next_line().unwrap()[..], b"READY");
//! assert_eq!(buffer.len(), 6);
//! ```

use bytes::{Bytes, BytesMut};

/// Longest line kept before it is force-split.
pub const DEFAULT_MAX_LINE_LEN: usize = 4096;

/// Accumulates bytes and yields newline-terminated lines.
pub struct LineBuffer {
    buffer: BytesMut,
    max_line_len: usize,
}

impl LineBuffer {
    /// Create a line buffer with the default maximum line length.
    pub fn new() -> Self {
        Self::with_max_line_len(DEFAULT_MAX_LINE_LEN)
    }

    /// Create a line buffer that splits unterminated runs longer than `max_line_len`.
    pub fn with_max_line_len(max_line_len: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(256),
            max_line_len: max_line_len.max(1),
        }
    }

    /// Append raw bytes from the transport.
    pub fn push(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Remove and return the next complete line, without its `\n`.
    ///
    /// A run of `max_line_len` bytes with no terminator is returned as a
    /// line of its own so binary noise cannot grow the buffer forever.
    pub fn next_line(&mut self) -> Option<Bytes> {
        if let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let mut line = self.buffer.split_to(pos + 1);
            line.truncate(pos);
            return Some(line.freeze());
        }

        if self.buffer.len() >= self.max_line_len {
            return Some(self.buffer.split_to(self.max_line_len).freeze());
        }

        None
    }

    /// Remove and return any unterminated bytes.
    pub fn take_partial(&mut self) -> Option<Bytes> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(self.buffer.split().freeze())
        }
    }

    /// Number of buffered bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Discard everything buffered.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new()
    }
}
