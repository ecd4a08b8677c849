//! Response lines read back from the device.
//!
//! The device replies with free-form text, one message per line:
//! ```text
//! READY
//! Inference done
//! Prediction: 7        <- sentinel, ends the read loop
//! Scores: 0:3 1:0 ...
//! ```
//!
//! Decoding is lenient: bytes that are not valid UTF-8 are dropped and the
//! remainder is trimmed. A line that trims to nothing is treated as absent.

use std::fmt;

use crate::image::Digit;

/// Prefix marking the end of an inference.
pub const SENTINEL_PREFIX: &str = "Prediction:";

/// Decode raw line bytes, dropping invalid UTF-8 and trimming whitespace.
///
/// Never fails.
///
/// # Example
///
/// ```
/// use digitwire::protocol::decode_line;
///
/// assert_eq!(decode_line(b"  Prediction: 3\r"), "Prediction: 3");
/// assert_eq!(decode_line(b"Scor\xFFes"), "Scores");
/// ```
pub fn decode_line(raw: &[u8]) -> String {
    let mut text = String::with_capacity(raw.len());
    for chunk in raw.utf8_chunks() {
        text.push_str(chunk.valid());
    }
    text.trim().to_string()
}

/// A non-empty, trimmed line of device output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseLine {
    text: String,
}

impl ResponseLine {
    /// Decode a raw line. Returns `None` for blank lines.
    pub fn decode(raw: &[u8]) -> Option<Self> {
        let text = decode_line(raw);
        if text.is_empty() {
            None
        } else {
            Some(Self { text })
        }
    }

    /// The decoded text.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Take ownership of the decoded text.
    pub fn into_string(self) -> String {
        self.text
    }

    /// Whether this line ends the read loop.
    #[inline]
    pub fn is_sentinel(&self) -> bool {
        self.text.starts_with(SENTINEL_PREFIX)
    }

    /// Digit reported after the sentinel prefix, if it parses as one.
    pub fn prediction(&self) -> Option<Digit> {
        let rest = self.text.strip_prefix(SENTINEL_PREFIX)?;
        rest.trim().parse::<u8>().ok().and_then(|v| Digit::new(v).ok())
    }
}

impl fmt::Display for ResponseLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}
