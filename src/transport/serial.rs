//! Serial port transport.
//!
//! - Windows: `COMn` virtual ports
//! - Linux: `/dev/ttyACMn` (USB-CDC) or `/dev/ttyUSBn`
//! - macOS: `/dev/tty.usbmodem*`
//!
//! The port is opened 8N1 with no flow control, which is what USB-CDC
//! firmware expects. Reads are polled in short slices until a newline
//! arrives or the per-read deadline passes.
//!
//! # Example
//!
//! ```ignore
//! use digitwire::transport::{default_endpoint, Connector, SerialConnector, Transport};
//! use std::time::Duration;
//!
//! let mut port = SerialConnector.open(default_endpoint(), 115_200)?;
//! port.write_bytes(&[0u8; 785])?;
//! port.flush()?;
//! let line = port.read_line(Duration::from_secs(5))?;
//! ```

use std::io::{ErrorKind, Read, Write};
use std::time::{Duration, Instant};

use bytes::Bytes;
use serde::Serialize;
use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, SerialPortType, StopBits};

use super::{Connector, Transport};
use crate::error::{DigitwireError, Result};
use crate::protocol::LineBuffer;

/// Driver timeout used for each individual read slice.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Platform default endpoint for a USB-CDC device.
///
/// Format:
/// - Windows: `COM3`
/// - macOS: `/dev/tty.usbmodem0001`
/// - elsewhere: `/dev/ttyACM0`
pub fn default_endpoint() -> &'static str {
    #[cfg(windows)]
    {
        "COM3"
    }

    #[cfg(target_os = "macos")]
    {
        "/dev/tty.usbmodem0001"
    }

    #[cfg(not(any(windows, target_os = "macos")))]
    {
        "/dev/ttyACM0"
    }
}

/// A serial endpoint visible to the operating system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EndpointInfo {
    /// Name to pass to `--port`.
    pub name: String,
    /// Human-readable port kind (`USB 2e8a:000a Pico`, `PCI`, ...).
    pub kind: String,
}

/// Enumerate serial endpoints.
pub fn list_endpoints() -> Result<Vec<EndpointInfo>> {
    let ports = serialport::available_ports()?;
    Ok(ports
        .into_iter()
        .map(|p| EndpointInfo {
            kind: describe_port_type(&p.port_type),
            name: p.port_name,
        })
        .collect())
}

fn describe_port_type(port_type: &SerialPortType) -> String {
    match port_type {
        SerialPortType::UsbPort(usb) => {
            let mut kind = format!("USB {:04x}:{:04x}", usb.vid, usb.pid);
            if let Some(product) = &usb.product {
                kind.push(' ');
                kind.push_str(product);
            }
            kind
        }
        SerialPortType::PciPort => "PCI".to_string(),
        SerialPortType::BluetoothPort => "Bluetooth".to_string(),
        SerialPortType::Unknown => "unknown".to_string(),
    }
}

/// Deadline for a read of `timeout`, or `None` when it lies beyond what
/// `Instant` can represent (the read then waits for a line indefinitely).
fn read_deadline(now: Instant, timeout: Duration) -> Option<Instant> {
    now.checked_add(timeout)
}

/// Driver timeout for the next read slice. `None` once the deadline has passed.
fn next_poll_slice(deadline: Option<Instant>, now: Instant) -> Option<Duration> {
    match deadline {
        Some(deadline) if now >= deadline => None,
        Some(deadline) => Some((deadline - now).min(POLL_INTERVAL)),
        None => Some(POLL_INTERVAL),
    }
}

/// Opens real serial ports.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialConnector;

impl Connector for SerialConnector {
    type Transport = SerialTransport;

    fn open(&self, endpoint: &str, baud_rate: u32) -> Result<SerialTransport> {
        let port = serialport::new(endpoint, baud_rate)
            .timeout(POLL_INTERVAL)
            .data_bits(DataBits::Eight)
            .stop_bits(StopBits::One)
            .parity(Parity::None)
            .flow_control(FlowControl::None)
            .open()
            .map_err(|e| DigitwireError::Connection {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            })?;

        tracing::debug!("Opened {} at {} baud", endpoint, baud_rate);

        Ok(SerialTransport {
            endpoint: endpoint.to_string(),
            port,
            lines: LineBuffer::new(),
        })
    }
}

/// An open serial port.
pub struct SerialTransport {
    endpoint: String,
    port: Box<dyn SerialPort>,
    lines: LineBuffer,
}

impl SerialTransport {
    /// Endpoint this transport was opened on.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Transport for SerialTransport {
    fn read_line(&mut self, timeout: Duration) -> Result<Option<Bytes>> {
        let deadline = read_deadline(Instant::now(), timeout);
        let mut chunk = [0u8; 256];

        loop {
            if let Some(line) = self.lines.next_line() {
                return Ok(Some(line));
            }

            let Some(slice) = next_poll_slice(deadline, Instant::now()) else {
                return Ok(self.lines.take_partial());
            };

            self.port.set_timeout(slice)?;
            match self.port.read(&mut chunk) {
                Ok(n) => self.lines.push(&chunk[..n]),
                Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::Interrupted) => {}
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        self.port.write_all(data)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.port.flush()?;
        Ok(())
    }

    fn clear_input(&mut self) -> Result<()> {
        self.lines.clear();
        self.port.clear(ClearBuffer::Input)?;
        Ok(())
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        tracing::debug!("Closed {}", self.endpoint);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_endpoint_format() {
        let endpoint = default_endpoint();

        #[cfg(windows)]
        {
            assert!(endpoint.starts_with("COM"));
        }

        #[cfg(unix)]
        {
            assert!(endpoint.starts_with("/dev/tty"));
        }
    }

    #[test]
    fn test_open_missing_endpoint_is_connection_error() {
        #[cfg(windows)]
        let endpoint = "COM249";
        #[cfg(not(windows))]
        let endpoint = "/dev/digitwire-missing-endpoint";

        let err = SerialConnector.open(endpoint, 115_200).err().unwrap();
        match err {
            DigitwireError::Connection { endpoint: e, .. } => assert_eq!(e, endpoint),
            other => panic!("expected Connection, got {:?}", other),
        }
    }

    #[test]
    fn test_poll_slices_until_deadline() {
        let now = Instant::now();
        let deadline = read_deadline(now, Duration::from_millis(250));

        assert_eq!(next_poll_slice(deadline, now), Some(POLL_INTERVAL));
        assert_eq!(
            next_poll_slice(deadline, now + Duration::from_millis(200)),
            Some(Duration::from_millis(50))
        );
        assert_eq!(next_poll_slice(deadline, now + Duration::from_millis(250)), None);
    }

    #[test]
    fn test_unrepresentable_timeout_has_no_deadline() {
        let now = Instant::now();
        let huge = Duration::try_from_secs_f64(1e19).unwrap();

        assert_eq!(read_deadline(now, huge), None);
        assert_eq!(read_deadline(now, Duration::MAX), None);
        assert_eq!(next_poll_slice(None, now), Some(POLL_INTERVAL));
    }

    #[cfg(unix)]
    #[test]
    fn test_huge_timeout_reads_line_from_pty() {
        let (mut device, host) = serialport::TTYPort::pair().unwrap();
        let mut transport = SerialTransport {
            endpoint: "pty".to_string(),
            port: Box::new(host),
            lines: LineBuffer::new(),
        };

        device.write_all(b"READY\n").unwrap();
        device.flush().unwrap();

        let line = transport
            .read_line(Duration::try_from_secs_f64(1e19).unwrap())
            .unwrap();
        assert_eq!(line.as_deref(), Some(&b"READY"[..]));
    }

    #[test]
    fn test_describe_port_types() {
        assert_eq!(describe_port_type(&SerialPortType::PciPort), "PCI");
        assert_eq!(describe_port_type(&SerialPortType::Unknown), "unknown");
    }
}
