//! Transfer handshake builder and run loop.
//!
//! The [`HandshakeBuilder`] configures the endpoint and timing. The
//! [`Handshake`] drives one transfer through a fixed sequence:
//! 1. Open the endpoint
//! 2. Wait for the device to settle (USB-CDC hosts often reset the board on open)
//! 3. Discard stale input
//! 4. Read one optional banner line
//! 5. Write the payload and flush
//! 6. Read response lines until `Prediction:` or the read budget runs out
//!
//! ```text
//! Unopened → Opened → InputFlushed → BannerChecked → Written → Reading(0..n) → Closed
//! ```
//!
//! The transport is owned by a session that is dropped on every exit path,
//! so the port is released whether the run completes or fails.
//!
//! # Example
//!
//! ```ignore
//! use digitwire::handshake::Handshake;
//! use digitwire::transport::SerialConnector;
//!
//! let handshake = Handshake::builder("/dev/ttyACM0").baud_rate(115_200).build();
//! let report = handshake.run_with(&SerialConnector, &payload, |surfaced| {
//!     println!("{}", surfaced.line);
//! })?;
//! ```

use std::time::Duration;

use serde::Serialize;

use crate::error::Result;
use crate::image::Digit;
use crate::protocol::{Payload, ResponseLine, TransferMode, DEFAULT_BAUD_RATE};
use crate::transport::{Connector, Transport};

/// Default per-read timeout.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Pause after opening, before any traffic.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(2);

/// Maximum response reads after the payload is written.
pub const DEFAULT_MAX_RESPONSE_READS: usize = 10;

/// Handshake configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeConfig {
    /// Serial endpoint identifier.
    pub endpoint: String,
    /// Baud rate.
    pub baud_rate: u32,
    /// Timeout for each line read.
    pub read_timeout: Duration,
    /// Pause after opening.
    pub settle_delay: Duration,
    /// Read budget for the response loop.
    pub max_response_reads: usize,
}

/// Builder for configuring a [`Handshake`].
pub struct HandshakeBuilder {
    config: HandshakeConfig,
}

impl HandshakeBuilder {
    /// Create a builder for `endpoint` with default timing.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            config: HandshakeConfig {
                endpoint: endpoint.into(),
                baud_rate: DEFAULT_BAUD_RATE,
                read_timeout: DEFAULT_READ_TIMEOUT,
                settle_delay: DEFAULT_SETTLE_DELAY,
                max_response_reads: DEFAULT_MAX_RESPONSE_READS,
            },
        }
    }

    /// Set the baud rate.
    ///
    /// Default: 115200
    pub fn baud_rate(mut self, baud_rate: u32) -> Self {
        self.config.baud_rate = baud_rate;
        self
    }

    /// Set the per-read timeout.
    ///
    /// Default: 5 seconds
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.config.read_timeout = timeout;
        self
    }

    /// Set the pause after opening.
    ///
    /// Default: 2 seconds
    pub fn settle_delay(mut self, delay: Duration) -> Self {
        self.config.settle_delay = delay;
        self
    }

    /// Set the response read budget.
    ///
    /// Default: 10
    pub fn max_response_reads(mut self, reads: usize) -> Self {
        self.config.max_response_reads = reads;
        self
    }

    /// Finish configuration.
    pub fn build(self) -> Handshake {
        Handshake {
            config: self.config,
        }
    }
}

/// Position in the handshake sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    /// Nothing opened yet.
    Unopened,
    /// Endpoint open.
    Opened,
    /// Stale input discarded.
    InputFlushed,
    /// Banner read attempted.
    BannerChecked,
    /// Payload written and flushed.
    Written,
    /// Response read number `attempt` (0-based).
    Reading {
        /// Current attempt.
        attempt: usize,
    },
    /// Endpoint released.
    Closed,
}

/// Why the response loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Termination {
    /// A line starting with `Prediction:` arrived.
    SentinelSeen,
    /// Every read in the budget was used.
    BudgetExhausted,
}

/// Where a surfaced line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    /// Read before the payload was written.
    Banner,
    /// Read after the payload was written.
    Response,
}

/// A non-empty device line handed to the caller as it arrives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfacedLine {
    /// Banner or response.
    pub kind: LineKind,
    /// Decoded text.
    pub line: ResponseLine,
}

/// Outcome of one transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferReport {
    /// Endpoint used.
    pub endpoint: String,
    /// Baud rate used.
    pub baud_rate: u32,
    /// Payload layout.
    pub mode: TransferMode,
    /// Bytes written.
    pub payload_len: usize,
    /// Digit class of the image sent.
    pub digit: Digit,
    /// Banner line, if the device sent one.
    pub banner: Option<String>,
    /// Response lines in arrival order, sentinel included.
    pub responses: Vec<String>,
    /// Read attempts made, banner read included.
    pub read_attempts: usize,
    /// Digit parsed from the sentinel line.
    pub prediction: Option<Digit>,
    /// Why the response loop stopped.
    pub termination: Termination,
}

impl TransferReport {
    /// Whether the prediction matches the label sent.
    ///
    /// `None` when no label was sent or no prediction was parsed.
    pub fn prediction_matches(&self) -> Option<bool> {
        match (self.mode, self.prediction) {
            (TransferMode::WithLabel, Some(p)) => Some(p == self.digit),
            _ => None,
        }
    }
}

/// A configured transfer handshake.
#[derive(Debug, Clone)]
pub struct Handshake {
    config: HandshakeConfig,
}

impl Handshake {
    /// Create a new handshake builder.
    pub fn builder(endpoint: impl Into<String>) -> HandshakeBuilder {
        HandshakeBuilder::new(endpoint)
    }

    /// Active configuration.
    pub fn config(&self) -> &HandshakeConfig {
        &self.config
    }

    /// Run one transfer, discarding lines as they arrive.
    pub fn run<C: Connector>(&self, connector: &C, payload: &Payload) -> Result<TransferReport> {
        self.run_with(connector, payload, |_| {})
    }

    /// Run one transfer, passing each non-empty line to `on_line` as it arrives.
    ///
    /// # Errors
    ///
    /// - `Connection` if the endpoint cannot be opened (nothing is written)
    /// - `Io`/`Serial` if writing, flushing or reading fails after open
    pub fn run_with<C, F>(
        &self,
        connector: &C,
        payload: &Payload,
        mut on_line: F,
    ) -> Result<TransferReport>
    where
        C: Connector,
        F: FnMut(&SurfacedLine),
    {
        let mut session = Session::open(connector, &self.config)?;
        session.settle();
        session.flush_input();

        let banner = session.check_banner()?.map(|line| {
            let surfaced = SurfacedLine {
                kind: LineKind::Banner,
                line,
            };
            on_line(&surfaced);
            surfaced.line.into_string()
        });

        session.write(payload)?;

        let mut responses = Vec::new();
        let mut prediction = None;
        let mut termination = Termination::BudgetExhausted;

        for attempt in 0..self.config.max_response_reads {
            session.transition(HandshakeState::Reading { attempt });

            let Some(line) = session.read_line()? else {
                continue;
            };

            let surfaced = SurfacedLine {
                kind: LineKind::Response,
                line,
            };
            on_line(&surfaced);

            let sentinel = surfaced.line.is_sentinel();
            if sentinel {
                prediction = surfaced.line.prediction();
            }
            responses.push(surfaced.line.into_string());

            if sentinel {
                termination = Termination::SentinelSeen;
                break;
            }
        }

        let read_attempts = session.reads;
        drop(session);

        match termination {
            Termination::SentinelSeen => tracing::info!(
                "Device answered after {} reads (prediction: {:?})",
                read_attempts,
                prediction.map(Digit::value)
            ),
            Termination::BudgetExhausted => tracing::warn!(
                "No {} line within {} response reads",
                crate::protocol::SENTINEL_PREFIX,
                self.config.max_response_reads
            ),
        }

        Ok(TransferReport {
            endpoint: self.config.endpoint.clone(),
            baud_rate: self.config.baud_rate,
            mode: payload.mode(),
            payload_len: payload.len(),
            digit: payload.digit(),
            banner,
            responses,
            read_attempts,
            prediction,
            termination,
        })
    }
}

/// An open transport plus the handshake position.
///
/// Dropping the session closes the transport.
struct Session<'a, T: Transport> {
    transport: T,
    config: &'a HandshakeConfig,
    state: HandshakeState,
    reads: usize,
}

impl<'a, T: Transport> Session<'a, T> {
    fn open<C>(connector: &C, config: &'a HandshakeConfig) -> Result<Self>
    where
        C: Connector<Transport = T>,
    {
        tracing::debug!(
            "Opening {} at {} baud",
            config.endpoint,
            config.baud_rate
        );
        let transport = connector.open(&config.endpoint, config.baud_rate)?;

        let mut session = Self {
            transport,
            config,
            state: HandshakeState::Unopened,
            reads: 0,
        };
        session.transition(HandshakeState::Opened);
        Ok(session)
    }

    fn transition(&mut self, next: HandshakeState) {
        tracing::debug!("Handshake {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    fn settle(&self) {
        if !self.config.settle_delay.is_zero() {
            tracing::debug!("Waiting {:?} for the device to settle", self.config.settle_delay);
            std::thread::sleep(self.config.settle_delay);
        }
    }

    /// Best effort: a failure is logged and the handshake carries on.
    fn flush_input(&mut self) {
        if let Err(e) = self.transport.clear_input() {
            tracing::warn!(
                "Could not discard stale input on {}: {}",
                self.config.endpoint,
                e
            );
        }
        self.transition(HandshakeState::InputFlushed);
    }

    fn check_banner(&mut self) -> Result<Option<ResponseLine>> {
        let banner = self.read_line()?;
        self.transition(HandshakeState::BannerChecked);
        Ok(banner)
    }

    fn write(&mut self, payload: &Payload) -> Result<()> {
        self.transport.write_bytes(payload.as_bytes())?;
        self.transport.flush()?;
        tracing::info!(
            "Sent {} bytes ({}, digit {}) to {}",
            payload.len(),
            payload.mode(),
            payload.digit(),
            self.config.endpoint
        );
        self.transition(HandshakeState::Written);
        Ok(())
    }

    fn read_line(&mut self) -> Result<Option<ResponseLine>> {
        self.reads += 1;
        let raw = self.transport.read_line(self.config.read_timeout)?;
        let line = raw.as_deref().and_then(ResponseLine::decode);
        match &line {
            Some(line) => tracing::debug!("Device: {}", line),
            None => tracing::debug!("No line within {:?}", self.config.read_timeout),
        }
        Ok(line)
    }
}

impl<T: Transport> Drop for Session<'_, T> {
    fn drop(&mut self) {
        self.transition(HandshakeState::Closed);
    }
}
