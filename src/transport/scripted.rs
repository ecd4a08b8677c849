//! In-memory scripted transport.
//!
//! Plays back a fixed script of device output and records every call the
//! handshake makes, so the exact call sequence can be asserted without
//! hardware attached.
//!
//! # Example
//!
//! ```
//! use digitwire::transport::{Connector, ScriptedConnector, Transport, TransportEvent};
//! use std::time::Duration;
//!
//! let connector = ScriptedConnector::new().line("READY").silence();
//! {
//!     let mut port = connector.open("sim0", 115_200).unwrap();
//!     let line = port.read_line(Duration::from_secs(1)).unwrap();
//!     assert_eq!(&line.unwrap()[..], b"READY");
//!     assert!(port.read_line(Duration::from_secs(1)).unwrap().is_none());
//! }
//! assert!(connector.log().is_closed());
//! ```

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use bytes::Bytes;

use super::{Connector, Transport};
use crate::error::{DigitwireError, Result};
use crate::protocol::LineBuffer;

/// One step of scripted device output, consumed by `read_line`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptStep {
    /// A complete line (a `\n` is appended).
    Line(Bytes),
    /// Bytes exactly as given, with no terminator added.
    Raw(Bytes),
    /// The device stays quiet until the read times out.
    Silence,
}

/// A call made on a scripted transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Successful `open`.
    Open {
        /// Requested endpoint.
        endpoint: String,
        /// Requested baud rate.
        baud_rate: u32,
    },
    /// `clear_input`.
    ClearInput,
    /// One `read_line` attempt.
    Read,
    /// One successful `write_bytes` with the bytes written.
    Write(Bytes),
    /// `flush`.
    Flush,
    /// The transport was dropped.
    Close,
}

/// Ordered record of transport calls.
#[derive(Debug, Clone, Default)]
pub struct TransportLog {
    /// Every event, oldest first.
    pub events: Vec<TransportEvent>,
}

impl TransportLog {
    /// Endpoint and baud rate of the successful open, if any.
    pub fn opened(&self) -> Option<(&str, u32)> {
        self.events.iter().find_map(|e| match e {
            TransportEvent::Open {
                endpoint,
                baud_rate,
            } => Some((endpoint.as_str(), *baud_rate)),
            _ => None,
        })
    }

    /// Every successful write, in order.
    pub fn writes(&self) -> Vec<&Bytes> {
        self.events
            .iter()
            .filter_map(|e| match e {
                TransportEvent::Write(data) => Some(data),
                _ => None,
            })
            .collect()
    }

    /// Number of `read_line` calls.
    pub fn reads(&self) -> usize {
        self.count(&TransportEvent::Read)
    }

    /// Number of `flush` calls.
    pub fn flushes(&self) -> usize {
        self.count(&TransportEvent::Flush)
    }

    /// Whether the transport has been dropped.
    pub fn is_closed(&self) -> bool {
        self.events.last() == Some(&TransportEvent::Close)
    }

    fn count(&self, event: &TransportEvent) -> usize {
        self.events.iter().filter(|e| *e == event).count()
    }
}

/// Builds scripted transports.
#[derive(Debug, Clone, Default)]
pub struct ScriptedConnector {
    script: Vec<ScriptStep>,
    stale: Vec<u8>,
    refuse: Option<String>,
    fail_writes: bool,
    fail_clear: bool,
    fail_read_at: Option<usize>,
    log: Arc<Mutex<TransportLog>>,
}

impl ScriptedConnector {
    /// Create a connector with an empty script (every read times out).
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a complete line of device output.
    pub fn line(mut self, text: impl AsRef<[u8]>) -> Self {
        self.script
            .push(ScriptStep::Line(Bytes::copy_from_slice(text.as_ref())));
        self
    }

    /// Append several complete lines.
    pub fn lines<I, T>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        for line in lines {
            self = self.line(line);
        }
        self
    }

    /// Append unterminated bytes.
    pub fn raw(mut self, data: impl AsRef<[u8]>) -> Self {
        self.script
            .push(ScriptStep::Raw(Bytes::copy_from_slice(data.as_ref())));
        self
    }

    /// Append one read timeout.
    pub fn silence(mut self) -> Self {
        self.script.push(ScriptStep::Silence);
        self
    }

    /// Bytes already waiting in the input buffer when the port opens.
    pub fn stale_input(mut self, data: impl AsRef<[u8]>) -> Self {
        self.stale.extend_from_slice(data.as_ref());
        self
    }

    /// Make every `open` fail with `reason`.
    pub fn refuse_open(mut self, reason: impl Into<String>) -> Self {
        self.refuse = Some(reason.into());
        self
    }

    /// Make every `write_bytes` fail with a broken pipe.
    pub fn fail_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    /// Make every `clear_input` fail; stale input stays buffered.
    pub fn fail_clear_input(mut self) -> Self {
        self.fail_clear = true;
        self
    }

    /// Make read number `index` (0-based, banner read included) fail with a
    /// hard I/O error.
    pub fn fail_read_at(mut self, index: usize) -> Self {
        self.fail_read_at = Some(index);
        self
    }

    /// Snapshot of the calls made so far.
    pub fn log(&self) -> TransportLog {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Connector for ScriptedConnector {
    type Transport = ScriptedTransport;

    fn open(&self, endpoint: &str, baud_rate: u32) -> Result<ScriptedTransport> {
        if let Some(reason) = &self.refuse {
            return Err(DigitwireError::Connection {
                endpoint: endpoint.to_string(),
                reason: reason.clone(),
            });
        }

        let mut lines = LineBuffer::new();
        lines.push(&self.stale);

        let transport = ScriptedTransport {
            script: self.script.iter().cloned().collect(),
            lines,
            fail_writes: self.fail_writes,
            fail_clear: self.fail_clear,
            fail_read_at: self.fail_read_at,
            reads: 0,
            log: Arc::clone(&self.log),
        };
        transport.record(TransportEvent::Open {
            endpoint: endpoint.to_string(),
            baud_rate,
        });
        Ok(transport)
    }
}

/// A transport playing back a [`ScriptedConnector`]'s script.
pub struct ScriptedTransport {
    script: VecDeque<ScriptStep>,
    lines: LineBuffer,
    fail_writes: bool,
    fail_clear: bool,
    fail_read_at: Option<usize>,
    reads: usize,
    log: Arc<Mutex<TransportLog>>,
}

impl ScriptedTransport {
    fn record(&self, event: TransportEvent) {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .events
            .push(event);
    }
}

impl Transport for ScriptedTransport {
    fn read_line(&mut self, _timeout: Duration) -> Result<Option<Bytes>> {
        self.record(TransportEvent::Read);

        let index = self.reads;
        self.reads += 1;
        if self.fail_read_at == Some(index) {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "scripted read failure").into());
        }

        loop {
            if let Some(line) = self.lines.next_line() {
                return Ok(Some(line));
            }

            match self.script.pop_front() {
                Some(ScriptStep::Line(data)) => {
                    self.lines.push(&data);
                    self.lines.push(b"\n");
                }
                Some(ScriptStep::Raw(data)) => self.lines.push(&data),
                Some(ScriptStep::Silence) | None => return Ok(self.lines.take_partial()),
            }
        }
    }

    fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        if self.fail_writes {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "scripted write failure").into());
        }
        self.record(TransportEvent::Write(Bytes::copy_from_slice(data)));
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.record(TransportEvent::Flush);
        Ok(())
    }

    fn clear_input(&mut self) -> Result<()> {
        self.record(TransportEvent::ClearInput);
        if self.fail_clear {
            return Err(io::Error::new(io::ErrorKind::Other, "scripted clear failure").into());
        }
        self.lines.clear();
        Ok(())
    }
}

impl Drop for ScriptedTransport {
    fn drop(&mut self) {
        self.record(TransportEvent::Close);
    }
}
