//! Image module - digit classes, pixel buffers and image sources.
//!
//! Every image sent to the device is a 28×28 grayscale grid, stored
//! row-major as 784 bytes:
//!
//! ```text
//!         x = 0 ............ 27
//! y = 0   [  0][  1] ... [ 27]
//! y = 1   [ 28][ 29] ... [ 55]
//!   ...
//! y = 27  [756][757] ... [783]
//! ```
//!
//! Two interchangeable sources implement [`ImageSource`]:
//!
//! - [`SegmentGlyphSource`] - procedurally drawn seven-segment digits
//! - [`IdxDataset`] - samples from an MNIST training set in IDX format
//!
//! # Example
//!
//! ```
//! use digitwire::image::{Digit, ImageSource, SegmentGlyphSource, IMAGE_SIZE};
//!
//! let digit = Digit::new(6).unwrap();
//! let image = SegmentGlyphSource::default().sample(digit).unwrap();
//! assert_eq!(image.as_bytes().len(), IMAGE_SIZE);
//! ```

mod glyph;
mod idx;

pub use glyph::{segments, SegmentGlyphSource, DEFAULT_STROKE_THICKNESS, MAX_STROKE_THICKNESS};
pub use idx::{IdxDataset, IMAGES_MAGIC, LABELS_MAGIC};

use std::fmt;

use serde::Serialize;

use crate::error::{DigitwireError, Result};

/// Image width in pixels.
pub const IMAGE_WIDTH: usize = 28;

/// Image height in pixels.
pub const IMAGE_HEIGHT: usize = 28;

/// Number of pixels (and bytes) in one image.
pub const IMAGE_SIZE: usize = IMAGE_WIDTH * IMAGE_HEIGHT;

/// Intensity ramp used by [`PixelBuffer::render_ascii`], darkest first.
const ASCII_RAMP: &[u8] = b" .:-=+*#%@";

/// A digit class in `0..=9`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Digit(u8);

impl Digit {
    /// Validate and wrap a digit class.
    pub fn new(value: u8) -> Result<Self> {
        if value <= 9 {
            Ok(Self(value))
        } else {
            Err(DigitwireError::InvalidDigit(value))
        }
    }

    /// The raw class value (also the label byte on the wire).
    #[inline]
    pub fn value(self) -> u8 {
        self.0
    }

    /// All ten digit classes in ascending order.
    pub fn all() -> impl Iterator<Item = Digit> {
        (0..=9).map(Digit)
    }
}

impl TryFrom<u8> for Digit {
    type Error = DigitwireError;

    fn try_from(value: u8) -> Result<Self> {
        Self::new(value)
    }
}

impl fmt::Display for Digit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A 28×28 row-major grayscale image.
///
/// The length invariant is enforced at construction; the buffer is
/// immutable afterwards.
#[derive(Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    pixels: Box<[u8; IMAGE_SIZE]>,
}

impl PixelBuffer {
    /// Wrap a fixed-size pixel array.
    pub fn from_array(pixels: [u8; IMAGE_SIZE]) -> Self {
        Self {
            pixels: Box::new(pixels),
        }
    }

    /// Copy pixels out of a slice.
    ///
    /// # Errors
    ///
    /// Returns `PixelCount` if the slice is not exactly 784 bytes long.
    pub fn from_slice(pixels: &[u8]) -> Result<Self> {
        let pixels: [u8; IMAGE_SIZE] =
            pixels.try_into().map_err(|_| DigitwireError::PixelCount {
                expected: IMAGE_SIZE,
                actual: pixels.len(),
            })?;
        Ok(Self::from_array(pixels))
    }

    /// Raw row-major bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.pixels[..]
    }

    /// Pixel at column `x`, row `y`. Returns `None` outside the grid.
    pub fn get(&self, x: usize, y: usize) -> Option<u8> {
        if x < IMAGE_WIDTH && y < IMAGE_HEIGHT {
            Some(self.pixels[y * IMAGE_WIDTH + x])
        } else {
            None
        }
    }

    /// Number of non-zero pixels.
    pub fn ink(&self) -> usize {
        self.pixels.iter().filter(|&&p| p != 0).count()
    }

    /// Render as text, one line per pixel row.
    pub fn render_ascii(&self) -> String {
        let mut out = String::with_capacity((IMAGE_WIDTH + 1) * IMAGE_HEIGHT);
        for row in self.pixels.chunks_exact(IMAGE_WIDTH) {
            for &p in row {
                let idx = p as usize * (ASCII_RAMP.len() - 1) / 255;
                out.push(ASCII_RAMP[idx] as char);
            }
            out.push('\n');
        }
        out
    }
}

impl fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("len", &IMAGE_SIZE)
            .field("ink", &self.ink())
            .finish()
    }
}

/// Anything that can produce a pixel buffer for a digit class.
pub trait ImageSource {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Produce one image of `digit`.
    ///
    /// # Errors
    ///
    /// Returns `SourceUnavailable` when the source has no sample for `digit`.
    fn sample(&self, digit: Digit) -> Result<PixelBuffer>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digit_accepts_0_to_9() {
        for v in 0..=9u8 {
            assert_eq!(Digit::new(v).unwrap().value(), v);
        }
    }

    #[test]
    fn test_digit_rejects_10() {
        let err = Digit::new(10).unwrap_err();
        assert!(matches!(err, DigitwireError::InvalidDigit(10)));
        assert!(Digit::try_from(255u8).is_err());
    }

    #[test]
    fn test_digit_all() {
        let all: Vec<u8> = Digit::all().map(Digit::value).collect();
        assert_eq!(all, (0..=9).collect::<Vec<u8>>());
    }

    #[test]
    fn test_pixel_buffer_wrong_length() {
        let err = PixelBuffer::from_slice(&[0u8; 783]).unwrap_err();
        assert!(matches!(
            err,
            DigitwireError::PixelCount {
                expected: 784,
                actual: 783
            }
        ));
        assert!(PixelBuffer::from_slice(&[0u8; 785]).is_err());
    }

    #[test]
    fn test_pixel_buffer_get_is_row_major() {
        let mut raw = [0u8; IMAGE_SIZE];
        raw[IMAGE_WIDTH + 2] = 200;
        let image = PixelBuffer::from_array(raw);

        assert_eq!(image.get(2, 1), Some(200));
        assert_eq!(image.get(1, 2), Some(0));
        assert_eq!(image.get(28, 0), None);
        assert_eq!(image.get(0, 28), None);
    }

    #[test]
    fn test_ink_counts_non_zero() {
        let mut raw = [0u8; IMAGE_SIZE];
        raw[0] = 1;
        raw[783] = 255;
        assert_eq!(PixelBuffer::from_array(raw).ink(), 2);
    }

    #[test]
    fn test_render_ascii_shape() {
        let mut raw = [0u8; IMAGE_SIZE];
        raw[0] = 255;
        let text = PixelBuffer::from_array(raw).render_ascii();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), IMAGE_HEIGHT);
        assert!(lines.iter().all(|l| l.len() == IMAGE_WIDTH));
        assert!(lines[0].starts_with('@'));
        assert!(lines[1].chars().all(|c| c == ' '));
    }
}
