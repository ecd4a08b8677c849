//! # digitwire
//!
//! Host-side uploader for microcontroller digit classifiers.
//!
//! This crate sends one 28×28 grayscale digit image to a device running an
//! inference program over a serial link, then reads the device's text
//! replies until it reports `Prediction: <digit>`.
//!
//! ## Architecture
//!
//! - **Image sources**: seven-segment glyphs drawn on the fly, or MNIST
//!   samples from IDX files
//! - **Payload**: 784 raw pixel bytes, optionally followed by the label byte
//! - **Handshake**: open, settle, drop stale input, read banner, write,
//!   read replies under a fixed budget
//!
//! ## Example
//!
//! ```ignore
//! use digitwire::handshake::Handshake;
//! use digitwire::image::{Digit, ImageSource, SegmentGlyphSource};
//! use digitwire::protocol::{Payload, TransferMode};
//! use digitwire::transport::SerialConnector;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let digit = Digit::new(7)?;
//!     let image = SegmentGlyphSource::default().sample(digit)?;
//!     let payload = Payload::build(&image, digit, TransferMode::WithLabel);
//!
//!     let report = Handshake::builder("/dev/ttyACM0")
//!         .build()
//!         .run_with(&SerialConnector, &payload, |s| println!("{}", s.line))?;
//!
//!     println!("prediction: {:?}", report.prediction);
//!     Ok(())
//! }
//! ```

pub mod console;
pub mod error;
pub mod handshake;
pub mod image;
pub mod protocol;
pub mod transport;

pub use error::{DigitwireError, Result};
pub use handshake::{Handshake, HandshakeBuilder, TransferReport};
