//! Error types for digitwire.

use thiserror::Error;

/// Main error type for all digitwire operations.
#[derive(Debug, Error)]
pub enum DigitwireError {
    /// I/O error during serial or file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serial port driver error (timeouts, buffer control) after the port is open.
    #[error("Serial error: {0}")]
    Serial(#[from] serialport::Error),

    /// JSON serialization error (report output only).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The serial endpoint could not be opened.
    ///
    /// Raised before any byte is written to the device.
    #[error("Cannot open serial endpoint {endpoint}: {reason}")]
    Connection {
        /// Endpoint identifier that was requested (e.g. `COM3`, `/dev/ttyACM0`).
        endpoint: String,
        /// Driver-provided reason.
        reason: String,
    },

    /// The image source cannot produce a sample.
    #[error("Image source unavailable: {0}")]
    SourceUnavailable(String),

    /// Dataset files exist but do not have the expected layout.
    #[error("Dataset error: {0}")]
    Dataset(String),

    /// Digit class outside `0..=9`.
    #[error("Invalid digit class {0} (expected 0-9)")]
    InvalidDigit(u8),

    /// Pixel data of the wrong length.
    #[error("Pixel buffer must hold {expected} bytes, got {actual}")]
    PixelCount {
        /// Required pixel count.
        expected: usize,
        /// Pixel count that was supplied.
        actual: usize,
    },
}

/// Result type alias using DigitwireError.
pub type Result<T> = std::result::Result<T, DigitwireError>;
