//! Line-oriented output for device lines and reports.
//!
//! # Important
//!
//! - **stdout**: device lines and the optional JSON report (one per line)
//! - **stderr**: logs from `tracing`
//! - **Terminator**: always a bare `\n`, on every platform
//!
//! Keeping logs off stdout lets `digitwire --json | jq` see only the report.

use std::io::{self, Write};

use serde::Serialize;

use crate::error::Result;

/// Write `line` plus a single `\n` to `out`, then flush.
///
/// Flushing per line makes each device line visible before the next read
/// blocks.
pub fn write_line<W: Write>(out: &mut W, line: &str) -> io::Result<()> {
    out.write_all(line.as_bytes())?;
    out.write_all(b"\n")?;
    out.flush()
}

/// Serialize `value` as compact JSON and write it as one line to `out`.
pub fn write_json_line<W: Write, T: Serialize>(out: &mut W, value: &T) -> Result<()> {
    serde_json::to_writer(&mut *out, value)?;
    write_line(out, "")?;
    Ok(())
}

/// [`write_line`] on a locked stdout.
pub fn write_stdout_line(line: &str) -> io::Result<()> {
    write_line(&mut io::stdout().lock(), line)
}

/// [`write_json_line`] on a locked stdout.
pub fn write_stdout_json<T: Serialize>(value: &T) -> Result<()> {
    write_json_line(&mut io::stdout().lock(), value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Verdict {
        digit: u8,
        lines: Vec<&'static str>,
    }

    #[test]
    fn test_line_gets_single_newline() {
        let mut out = Vec::new();
        write_line(&mut out, "Prediction: 7").unwrap();
        write_line(&mut out, "Scores: 7:250").unwrap();

        assert_eq!(out, b"Prediction: 7\nScores: 7:250\n");
    }

    #[test]
    fn test_empty_line() {
        let mut out = Vec::new();
        write_line(&mut out, "").unwrap();
        assert_eq!(out, b"\n");
    }

    #[test]
    fn test_json_is_one_line() {
        let mut out = Vec::new();
        let verdict = Verdict {
            digit: 7,
            lines: vec!["READY", "Prediction: 7"],
        };
        write_json_line(&mut out, &verdict).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "{\"digit\":7,\"lines\":[\"READY\",\"Prediction: 7\"]}\n");
        assert!(!text.contains('\r'));
        assert_eq!(text.matches('\n').count(), 1);
    }

    #[test]
    fn test_write_error_propagates() {
        struct Closed;

        impl Write for Closed {
            fn write(&mut self, _: &[u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
            }

            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        assert!(write_line(&mut Closed, "x").is_err());
        let err = write_json_line(&mut Closed, &1u8).unwrap_err();
        assert!(matches!(err, crate::error::DigitwireError::Json(_)));
    }
}
