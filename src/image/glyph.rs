//! Procedural seven-segment glyphs.
//!
//! Segments are laid out inside a fixed glyph box on the 28×28 grid:
//!
//! ```text
//!     cols 8 ........ 19
//! row 4    ┌── A ──┐
//!          F       B
//! row 13   ├── G ──┤
//!          E       C
//! row 23   └── D ──┘
//! ```
//!
//! Output is a pure function of the configuration and the digit, so
//! repeated calls always produce identical buffers.

use super::{Digit, ImageSource, PixelBuffer, IMAGE_SIZE, IMAGE_WIDTH};
use crate::error::Result;

/// Segment bit constants.
pub mod segments {
    use crate::image::Digit;

    /// Top bar.
    pub const A: u8 = 0b0000_0001;
    /// Upper right.
    pub const B: u8 = 0b0000_0010;
    /// Lower right.
    pub const C: u8 = 0b0000_0100;
    /// Bottom bar.
    pub const D: u8 = 0b0000_1000;
    /// Lower left.
    pub const E: u8 = 0b0001_0000;
    /// Upper left.
    pub const F: u8 = 0b0010_0000;
    /// Middle bar.
    pub const G: u8 = 0b0100_0000;

    /// Every segment, in drawing order.
    pub const ALL: [u8; 7] = [A, B, C, D, E, F, G];

    /// Standard seven-segment encoding, indexed by digit.
    pub const DIGITS: [u8; 10] = [
        A | B | C | D | E | F,
        B | C,
        A | B | D | E | G,
        A | B | C | D | G,
        B | C | F | G,
        A | C | D | F | G,
        A | C | D | E | F | G,
        A | B | C,
        A | B | C | D | E | F | G,
        A | B | C | D | F | G,
    ];

    /// Segment mask for a digit class.
    #[inline]
    pub fn for_digit(digit: Digit) -> u8 {
        DIGITS[usize::from(digit.value())]
    }
}

/// Default stroke thickness in pixels.
pub const DEFAULT_STROKE_THICKNESS: usize = 3;

/// Largest accepted stroke thickness; larger values are clamped.
pub const MAX_STROKE_THICKNESS: usize = 6;

const GLYPH_LEFT: usize = 8;
const GLYPH_RIGHT: usize = 19;
const GLYPH_TOP: usize = 4;
const GLYPH_BOTTOM: usize = 23;
const GLYPH_MIDDLE: usize = (GLYPH_TOP + GLYPH_BOTTOM) / 2;

/// Half-open pixel rectangle.
#[derive(Debug, Clone, Copy)]
struct Rect {
    x0: usize,
    x1: usize,
    y0: usize,
    y1: usize,
}

impl Rect {
    fn contains(&self, x: usize, y: usize) -> bool {
        x >= self.x0 && x < self.x1 && y >= self.y0 && y < self.y1
    }
}

/// Draws digits as seven-segment glyphs.
#[derive(Debug, Clone)]
pub struct SegmentGlyphSource {
    thickness: usize,
    intensity: u8,
    halo: bool,
}

impl SegmentGlyphSource {
    /// Create a source with default stroke, full intensity and a soft halo.
    pub fn new() -> Self {
        Self {
            thickness: DEFAULT_STROKE_THICKNESS,
            intensity: 255,
            halo: true,
        }
    }

    /// Set the stroke thickness (clamped to `1..=MAX_STROKE_THICKNESS`).
    pub fn thickness(mut self, thickness: usize) -> Self {
        self.thickness = thickness.clamp(1, MAX_STROKE_THICKNESS);
        self
    }

    /// Set the intensity of lit pixels.
    pub fn intensity(mut self, intensity: u8) -> Self {
        self.intensity = intensity;
        self
    }

    /// Enable or disable the half-intensity halo around strokes.
    pub fn halo(mut self, enabled: bool) -> Self {
        self.halo = enabled;
        self
    }

    fn segment_rect(&self, segment: u8) -> Rect {
        let t = self.thickness;
        let left = Rect {
            x0: GLYPH_LEFT,
            x1: GLYPH_LEFT + t,
            y0: 0,
            y1: 0,
        };
        let right = Rect {
            x0: GLYPH_RIGHT + 1 - t,
            x1: GLYPH_RIGHT + 1,
            y0: 0,
            y1: 0,
        };
        let upper = (GLYPH_TOP, GLYPH_MIDDLE + 1);
        let lower = (GLYPH_MIDDLE, GLYPH_BOTTOM + 1);
        let bar = |y0: usize| Rect {
            x0: GLYPH_LEFT,
            x1: GLYPH_RIGHT + 1,
            y0,
            y1: y0 + t,
        };

        match segment {
            segments::A => bar(GLYPH_TOP),
            segments::B => Rect {
                y0: upper.0,
                y1: upper.1,
                ..right
            },
            segments::C => Rect {
                y0: lower.0,
                y1: lower.1,
                ..right
            },
            segments::D => bar(GLYPH_BOTTOM + 1 - t),
            segments::E => Rect {
                y0: lower.0,
                y1: lower.1,
                ..left
            },
            segments::F => Rect {
                y0: upper.0,
                y1: upper.1,
                ..left
            },
            _ => bar(GLYPH_MIDDLE - t / 2),
        }
    }

    /// Render a digit into a raw pixel array.
    fn render(&self, digit: Digit) -> [u8; IMAGE_SIZE] {
        let mask = segments::for_digit(digit);
        let rects: Vec<Rect> = segments::ALL
            .iter()
            .filter(|&&s| mask & s != 0)
            .map(|&s| self.segment_rect(s))
            .collect();

        let mut lit = [false; IMAGE_SIZE];
        for (i, cell) in lit.iter_mut().enumerate() {
            let (x, y) = (i % IMAGE_WIDTH, i / IMAGE_WIDTH);
            *cell = rects.iter().any(|r| r.contains(x, y));
        }

        let mut pixels = [0u8; IMAGE_SIZE];
        for (i, p) in pixels.iter_mut().enumerate() {
            if lit[i] {
                *p = self.intensity;
            } else if self.halo && touches_lit(&lit, i) {
                *p = self.intensity / 2;
            }
        }
        pixels
    }
}

/// Whether any 4-neighbour of pixel `i` is lit.
fn touches_lit(lit: &[bool; IMAGE_SIZE], i: usize) -> bool {
    let (x, y) = (i % IMAGE_WIDTH, i / IMAGE_WIDTH);
    let height = IMAGE_SIZE / IMAGE_WIDTH;
    (x > 0 && lit[i - 1])
        || (x + 1 < IMAGE_WIDTH && lit[i + 1])
        || (y > 0 && lit[i - IMAGE_WIDTH])
        || (y + 1 < height && lit[i + IMAGE_WIDTH])
}

impl Default for SegmentGlyphSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageSource for SegmentGlyphSource {
    fn name(&self) -> &'static str {
        "glyph"
    }

    fn sample(&self, digit: Digit) -> Result<PixelBuffer> {
        Ok(PixelBuffer::from_array(self.render(digit)))
    }
}
