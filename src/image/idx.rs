//! MNIST training samples from IDX files.
//!
//! IDX layout (all integers Big Endian):
//! ```text
//! images: ┌──────────┬──────────┬──────────┬──────────┬─────────────────────┐
//!         │ magic    │ count    │ rows     │ cols     │ count × rows × cols │
//!         │ 0x0803   │ u32      │ u32 (28) │ u32 (28) │ u8 pixels           │
//!         └──────────┴──────────┴──────────┴──────────┴─────────────────────┘
//! labels: ┌──────────┬──────────┬─────────────────────┐
//!         │ magic    │ count    │ count × u8 (0-9)    │
//!         │ 0x0801   │ u32      │                     │
//!         └──────────┴──────────┴─────────────────────┘
//! ```
//!
//! Files must be uncompressed. The sample sent for a digit is the Nth
//! image carrying that label, counting from the start of the file.

use std::fmt;
use std::path::{Path, PathBuf};

use bytes::{Buf, Bytes};

use super::{Digit, ImageSource, PixelBuffer, IMAGE_HEIGHT, IMAGE_SIZE, IMAGE_WIDTH};
use crate::error::{DigitwireError, Result};

/// Magic number of an IDX file holding 3-D unsigned byte data.
pub const IMAGES_MAGIC: u32 = 0x0000_0803;

/// Magic number of an IDX file holding 1-D unsigned byte data.
pub const LABELS_MAGIC: u32 = 0x0000_0801;

const IMAGES_HEADER_SIZE: usize = 16;
const LABELS_HEADER_SIZE: usize = 8;

const IMAGE_FILE_NAMES: [&str; 2] = ["train-images-idx3-ubyte", "train-images.idx3-ubyte"];
const LABEL_FILE_NAMES: [&str; 2] = ["train-labels-idx1-ubyte", "train-labels.idx1-ubyte"];

/// An in-memory IDX image/label pair.
pub struct IdxDataset {
    images: Bytes,
    labels: Bytes,
    count: usize,
    occurrence: usize,
}

impl fmt::Debug for IdxDataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdxDataset")
            .field("count", &self.count)
            .field("occurrence", &self.occurrence)
            .finish()
    }
}

impl IdxDataset {
    /// Load the training images and labels from `dir`.
    ///
    /// # Errors
    ///
    /// - `SourceUnavailable` if either file is missing
    /// - `Io` if a file cannot be read
    /// - `Dataset` if a file is malformed
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let images_path = find_file(dir, &IMAGE_FILE_NAMES)?;
        let labels_path = find_file(dir, &LABEL_FILE_NAMES)?;

        tracing::debug!(
            "Loading IDX dataset from {} and {}",
            images_path.display(),
            labels_path.display()
        );

        let images = std::fs::read(&images_path)?;
        let labels = std::fs::read(&labels_path)?;
        Self::from_bytes(Bytes::from(images), Bytes::from(labels))
    }

    /// Parse an image file and a label file already in memory.
    pub fn from_bytes(images: Bytes, labels: Bytes) -> Result<Self> {
        let image_count = parse_images_header(&images)?;
        let label_count = parse_labels_header(&labels)?;

        if image_count != label_count {
            return Err(DigitwireError::Dataset(format!(
                "image file holds {} items but label file holds {}",
                image_count, label_count
            )));
        }

        if let Some(bad) = labels[LABELS_HEADER_SIZE..].iter().find(|&&l| l > 9) {
            return Err(DigitwireError::Dataset(format!(
                "label value {} is not a digit class",
                bad
            )));
        }

        Ok(Self {
            images: images.slice(IMAGES_HEADER_SIZE..),
            labels: labels.slice(LABELS_HEADER_SIZE..),
            count: image_count,
            occurrence: 0,
        })
    }

    /// Choose which occurrence of a digit `sample` returns (0 = first).
    pub fn occurrence(mut self, occurrence: usize) -> Self {
        self.occurrence = occurrence;
        self
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.count
    }

    /// Whether the dataset holds no samples.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Label of sample `index`.
    pub fn label(&self, index: usize) -> Option<u8> {
        self.labels.get(index).copied()
    }

    /// Pixels of sample `index`.
    pub fn image(&self, index: usize) -> Option<PixelBuffer> {
        if index >= self.count {
            return None;
        }
        let start = index * IMAGE_SIZE;
        PixelBuffer::from_slice(&self.images[start..start + IMAGE_SIZE]).ok()
    }

    /// Index of the `occurrence`-th sample labelled `digit`.
    pub fn find(&self, digit: Digit, occurrence: usize) -> Option<usize> {
        self.labels
            .iter()
            .enumerate()
            .filter(|(_, l)| **l == digit.value())
            .nth(occurrence)
            .map(|(i, _)| i)
    }
}

impl ImageSource for IdxDataset {
    fn name(&self) -> &'static str {
        "mnist"
    }

    fn sample(&self, digit: Digit) -> Result<PixelBuffer> {
        let index = self.find(digit, self.occurrence).ok_or_else(|| {
            DigitwireError::SourceUnavailable(format!(
                "dataset has no occurrence #{} of digit {}",
                self.occurrence, digit
            ))
        })?;

        tracing::debug!("Using dataset sample {} for digit {}", index, digit);

        self.image(index).ok_or_else(|| {
            DigitwireError::Dataset(format!("sample {} is out of range", index))
        })
    }
}

fn find_file(dir: &Path, names: &[&str]) -> Result<PathBuf> {
    names
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
        .ok_or_else(|| {
            DigitwireError::SourceUnavailable(format!(
                "{} not found in {} (download and decompress the MNIST training set)",
                names[0],
                dir.display()
            ))
        })
}

/// Validate the image file header and return the item count.
fn parse_images_header(data: &[u8]) -> Result<usize> {
    if data.len() < IMAGES_HEADER_SIZE {
        return Err(DigitwireError::Dataset(
            "image file is shorter than its IDX header".to_string(),
        ));
    }

    let mut header = &data[..IMAGES_HEADER_SIZE];
    let magic = header.get_u32();
    let count = header.get_u32() as usize;
    let rows = header.get_u32() as usize;
    let cols = header.get_u32() as usize;

    if magic != IMAGES_MAGIC {
        return Err(DigitwireError::Dataset(format!(
            "image file magic is {:#010x}, expected {:#010x}",
            magic, IMAGES_MAGIC
        )));
    }
    if rows != IMAGE_HEIGHT || cols != IMAGE_WIDTH {
        return Err(DigitwireError::Dataset(format!(
            "images are {}x{}, expected {}x{}",
            rows, cols, IMAGE_HEIGHT, IMAGE_WIDTH
        )));
    }

    let expected = count
        .checked_mul(IMAGE_SIZE)
        .and_then(|n| n.checked_add(IMAGES_HEADER_SIZE))
        .ok_or_else(|| {
            DigitwireError::Dataset(format!("image count {} is too large", count))
        })?;
    if data.len() != expected {
        return Err(DigitwireError::Dataset(format!(
            "image file is {} bytes, header implies {}",
            data.len(),
            expected
        )));
    }

    Ok(count)
}

/// Validate the label file header and return the item count.
fn parse_labels_header(data: &[u8]) -> Result<usize> {
    if data.len() < LABELS_HEADER_SIZE {
        return Err(DigitwireError::Dataset(
            "label file is shorter than its IDX header".to_string(),
        ));
    }

    let mut header = &data[..LABELS_HEADER_SIZE];
    let magic = header.get_u32();
    let count = header.get_u32() as usize;

    if magic != LABELS_MAGIC {
        return Err(DigitwireError::Dataset(format!(
            "label file magic is {:#010x}, expected {:#010x}",
            magic, LABELS_MAGIC
        )));
    }

    let expected = count.checked_add(LABELS_HEADER_SIZE).ok_or_else(|| {
        DigitwireError::Dataset(format!("label count {} is too large", count))
    })?;
    if data.len() != expected {
        return Err(DigitwireError::Dataset(format!(
            "label file is {} bytes, header implies {}",
            data.len(),
            expected
        )));
    }

    Ok(count)
}
