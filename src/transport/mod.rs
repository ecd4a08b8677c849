//! Transport module - the byte channel to the device.
//!
//! Provides abstraction over:
//! - Serial ports (USB-CDC virtual COM ports, UARTs) via [`SerialConnector`]
//! - An in-memory scripted device via [`ScriptedConnector`]
//!
//! A [`Connector`] opens a channel; the returned [`Transport`] is closed
//! when dropped, so every exit path of the handshake releases the port.

mod scripted;
mod serial;

use std::time::Duration;

use bytes::Bytes;

use crate::error::Result;

pub use scripted::{ScriptStep, ScriptedConnector, ScriptedTransport, TransportEvent, TransportLog};
pub use serial::{
    default_endpoint, list_endpoints, EndpointInfo, SerialConnector, SerialTransport,
    POLL_INTERVAL,
};

/// An open, exclusively owned channel to the device.
pub trait Transport {
    /// Read the next line, without its `\n` terminator.
    ///
    /// Blocks until a newline arrives or `timeout` elapses. On timeout,
    /// returns whatever unterminated bytes arrived, or `None` if nothing did.
    fn read_line(&mut self, timeout: Duration) -> Result<Option<Bytes>>;

    /// Write every byte of `data`.
    fn write_bytes(&mut self, data: &[u8]) -> Result<()>;

    /// Push any buffered output to the device.
    fn flush(&mut self) -> Result<()>;

    /// Discard input that arrived before this call.
    fn clear_input(&mut self) -> Result<()>;
}

/// Opens transports.
pub trait Connector {
    /// Transport produced by [`Connector::open`].
    type Transport: Transport;

    /// Open `endpoint` at `baud_rate`.
    ///
    /// # Errors
    ///
    /// Returns `Connection` if the endpoint cannot be opened.
    fn open(&self, endpoint: &str, baud_rate: u32) -> Result<Self::Transport>;
}
