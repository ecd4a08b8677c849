//! Wire format of the host-to-device transfer.
//!
//! The host writes one payload per run, in one of two layouts:
//! ```text
//! WithLabel:  ┌────────────────────────────┬───────┐
//!             │ pixels, row-major          │ label │
//!             │ 784 bytes                  │ 1 byte│
//!             └────────────────────────────┴───────┘
//! ImageOnly:  ┌────────────────────────────┐
//!             │ pixels, row-major          │
//!             │ 784 bytes                  │
//!             └────────────────────────────┘
//! ```
//!
//! There is no header or version marker: the device firmware must be built
//! for the same layout the host sends.

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};
use serde::Serialize;

use crate::image::{Digit, PixelBuffer, IMAGE_SIZE};

/// Size of the trailing label in `WithLabel` mode.
pub const LABEL_SIZE: usize = 1;

/// Baud rate used by the reference firmware.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Payload layout selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransferMode {
    /// 784 pixel bytes followed by the digit label.
    #[default]
    WithLabel,
    /// 784 pixel bytes only.
    ImageOnly,
}

impl TransferMode {
    /// Total payload length in this mode.
    #[inline]
    pub fn payload_len(self) -> usize {
        match self {
            TransferMode::WithLabel => IMAGE_SIZE + LABEL_SIZE,
            TransferMode::ImageOnly => IMAGE_SIZE,
        }
    }
}

impl fmt::Display for TransferMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferMode::WithLabel => f.write_str("with-label"),
            TransferMode::ImageOnly => f.write_str("image-only"),
        }
    }
}

/// The exact bytes written to the device in one transfer.
///
/// # Example
///
/// ```
/// use digitwire::image::{Digit, ImageSource, SegmentGlyphSource};
/// use digitwire::protocol::{Payload, TransferMode};
///
/// let digit = Digit::new(7).unwrap();
/// let image = SegmentGlyphSource::default().sample(digit).unwrap();
///
/// let payload = Payload::build(&image, digit, TransferMode::WithLabel);
/// assert_eq!(payload.len(), 785);
/// assert_eq!(payload.as_bytes()[784], 7);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    bytes: Bytes,
    mode: TransferMode,
    digit: Digit,
}

impl Payload {
    /// Encode an image (and, in `WithLabel` mode, its label).
    pub fn build(image: &PixelBuffer, digit: Digit, mode: TransferMode) -> Self {
        let mut buf = BytesMut::with_capacity(mode.payload_len());
        buf.put_slice(image.as_bytes());
        if mode == TransferMode::WithLabel {
            buf.put_u8(digit.value());
        }
        debug_assert_eq!(buf.len(), mode.payload_len());

        Self {
            bytes: buf.freeze(),
            mode,
            digit,
        }
    }

    /// Bytes to write.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Cheap clone of the bytes.
    #[inline]
    pub fn bytes(&self) -> Bytes {
        self.bytes.clone()
    }

    /// Payload length (784 or 785).
    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Always false; present for API symmetry with `len`.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Layout used.
    #[inline]
    pub fn mode(&self) -> TransferMode {
        self.mode
    }

    /// Digit class the image depicts.
    #[inline]
    pub fn digit(&self) -> Digit {
        self.digit
    }

    /// Label byte carried on the wire, if any.
    pub fn label(&self) -> Option<u8> {
        match self.mode {
            TransferMode::WithLabel => self.bytes.get(IMAGE_SIZE).copied(),
            TransferMode::ImageOnly => None,
        }
    }

    /// The pixel portion of the payload.
    #[inline]
    pub fn pixels(&self) -> &[u8] {
        &self.bytes[..IMAGE_SIZE]
    }
}
