//! Integration tests for digitwire.
//!
//! These drive image sources, payload encoding and the handshake together
//! against a scripted device.

use std::time::Duration;

use bytes::Bytes;
use digitwire::handshake::{Handshake, LineKind, Termination};
use digitwire::image::{
    Digit, IdxDataset, ImageSource, SegmentGlyphSource, IMAGES_MAGIC, IMAGE_SIZE, LABELS_MAGIC,
};
use digitwire::protocol::{Payload, TransferMode};
use digitwire::transport::{ScriptedConnector, TransportEvent};
use digitwire::DigitwireError;

fn handshake() -> Handshake {
    Handshake::builder("sim0")
        .settle_delay(Duration::ZERO)
        .read_timeout(Duration::from_millis(1))
        .build()
}

fn glyph_payload(value: u8, mode: TransferMode) -> Payload {
    let digit = Digit::new(value).unwrap();
    let image = SegmentGlyphSource::default().sample(digit).unwrap();
    Payload::build(&image, digit, mode)
}

/// Tiny in-memory MNIST: sample `i` is labelled `i % 10` and filled with `i`.
fn mini_mnist(count: usize) -> IdxDataset {
    let mut images = Vec::new();
    images.extend_from_slice(&IMAGES_MAGIC.to_be_bytes());
    images.extend_from_slice(&(count as u32).to_be_bytes());
    images.extend_from_slice(&28u32.to_be_bytes());
    images.extend_from_slice(&28u32.to_be_bytes());

    let mut labels = Vec::new();
    labels.extend_from_slice(&LABELS_MAGIC.to_be_bytes());
    labels.extend_from_slice(&(count as u32).to_be_bytes());

    for i in 0..count {
        images.extend(std::iter::repeat(i as u8).take(IMAGE_SIZE));
        labels.push((i % 10) as u8);
    }

    IdxDataset::from_bytes(Bytes::from(images), Bytes::from(labels)).unwrap()
}

/// Every source yields 784 in-range pixels for every digit.
#[test]
fn test_sources_produce_full_images() {
    let sources: Vec<Box<dyn ImageSource>> = vec![
        Box::new(SegmentGlyphSource::default()),
        Box::new(mini_mnist(20)),
    ];

    for source in &sources {
        for digit in Digit::all() {
            let image = source.sample(digit).unwrap();
            assert_eq!(image.as_bytes().len(), 784, "{} digit {}", source.name(), digit);
        }
    }
}

/// Payload length depends only on the transfer mode.
#[test]
fn test_payload_lengths_per_mode() {
    for value in 0..=9u8 {
        let labelled = glyph_payload(value, TransferMode::WithLabel);
        assert_eq!(labelled.len(), 785);
        assert_eq!(labelled.as_bytes()[784], value);

        let bare = glyph_payload(value, TransferMode::ImageOnly);
        assert_eq!(bare.len(), 784);
        assert_eq!(bare.as_bytes(), labelled.pixels());
    }
}

/// A refused open aborts before any byte is written.
#[test]
fn test_refused_open_writes_nothing() {
    let connector = ScriptedConnector::new()
        .refuse_open("Access is denied")
        .line("READY")
        .line("Prediction: 7");

    let result = handshake().run(&connector, &glyph_payload(7, TransferMode::WithLabel));

    match result {
        Err(DigitwireError::Connection { endpoint, reason }) => {
            assert_eq!(endpoint, "sim0");
            assert_eq!(reason, "Access is denied");
        }
        other => panic!("expected Connection error, got {:?}", other),
    }
    let log = connector.log();
    assert!(log.writes().is_empty());
    assert_eq!(log.reads(), 0);
}

/// The loop stops on the sentinel and never reads past it.
#[test]
fn test_stops_at_sentinel() {
    let connector =
        ScriptedConnector::new().lines(["", "Loading...", "Prediction: 7", "ignored-after"]);

    let report = handshake()
        .run(&connector, &glyph_payload(7, TransferMode::WithLabel))
        .unwrap();

    assert_eq!(report.banner, None);
    assert_eq!(report.responses, vec!["Loading...", "Prediction: 7"]);
    assert!(!report.responses.iter().any(|l| l == "ignored-after"));
    assert_eq!(report.termination, Termination::SentinelSeen);
    assert_eq!(connector.log().reads(), 3);
}

/// Without a sentinel the loop makes exactly ten reads after the banner.
#[test]
fn test_read_budget_is_ten() {
    let mut connector = ScriptedConnector::new();
    for i in 0..15 {
        connector = connector.line(format!("tick {}", i));
    }

    let report = handshake()
        .run(&connector, &glyph_payload(2, TransferMode::WithLabel))
        .unwrap();

    assert_eq!(report.banner.as_deref(), Some("tick 0"));
    assert_eq!(report.responses.len(), 10);
    assert_eq!(report.responses.last().map(String::as_str), Some("tick 10"));
    assert_eq!(report.read_attempts, 11);
    assert_eq!(report.termination, Termination::BudgetExhausted);
    assert_eq!(report.prediction, None);
}

/// Timeouts count against the budget but are not errors.
#[test]
fn test_silent_device_uses_budget() {
    let connector = ScriptedConnector::new();

    let report = handshake()
        .run(&connector, &glyph_payload(0, TransferMode::ImageOnly))
        .unwrap();

    assert!(report.banner.is_none());
    assert!(report.responses.is_empty());
    assert_eq!(report.read_attempts, 11);
    assert_eq!(connector.log().writes().len(), 1);
    assert!(connector.log().is_closed());
}

/// Whitespace-only lines are neither surfaced nor treated as the sentinel.
#[test]
fn test_whitespace_lines_ignored() {
    let connector = ScriptedConnector::new()
        .line("   ")
        .line("\t\r")
        .line("  ")
        .line("Prediction: 5");
    let mut surfaced = Vec::new();

    let report = handshake()
        .run_with(
            &connector,
            &glyph_payload(5, TransferMode::WithLabel),
            |s| surfaced.push(s.line.as_str().to_string()),
        )
        .unwrap();

    assert_eq!(surfaced, vec!["Prediction: 5"]);
    assert_eq!(report.read_attempts, 4);
    assert_eq!(report.prediction, Some(Digit::new(5).unwrap()));
}

/// Glyph generation is idempotent.
#[test]
fn test_glyph_six_is_stable() {
    let first = glyph_payload(6, TransferMode::ImageOnly);
    for _ in 0..10 {
        assert_eq!(glyph_payload(6, TransferMode::ImageOnly), first);
    }
}

/// Undecodable bytes are dropped and the loop carries on.
#[test]
fn test_invalid_bytes_tolerated() {
    let connector = ScriptedConnector::new()
        .line(b"\xFF\xFEREADY".as_slice())
        .line(b"Inf\xC0erence done".as_slice())
        .line(b"\x80\x81".as_slice())
        .line(b"Prediction: 3\xFF".as_slice());

    let report = handshake()
        .run(&connector, &glyph_payload(3, TransferMode::WithLabel))
        .unwrap();

    assert_eq!(report.banner.as_deref(), Some("READY"));
    assert_eq!(report.responses, vec!["Inference done", "Prediction: 3"]);
    assert_eq!(report.prediction_matches(), Some(true));
}

/// Bytes buffered before the handshake never reach the caller.
#[test]
fn test_stale_input_discarded() {
    let connector = ScriptedConnector::new()
        .stale_input("Prediction: 9\ngarbage")
        .line("READY")
        .line("Prediction: 4");

    let report = handshake()
        .run(&connector, &glyph_payload(4, TransferMode::WithLabel))
        .unwrap();

    assert_eq!(report.banner.as_deref(), Some("READY"));
    assert_eq!(report.responses, vec!["Prediction: 4"]);
}

/// A failed write still releases the port.
#[test]
fn test_write_failure_closes_port() {
    let connector = ScriptedConnector::new().fail_writes().line("READY");

    let result = handshake().run(&connector, &glyph_payload(1, TransferMode::WithLabel));

    assert!(matches!(result, Err(DigitwireError::Io(_))));
    let log = connector.log();
    assert!(log.writes().is_empty());
    assert_eq!(log.flushes(), 0);
    assert!(log.is_closed());
}

/// The full payload goes out in one write followed by one flush.
#[test]
fn test_single_write_then_flush() {
    let connector = ScriptedConnector::new().line("READY").line("Prediction: 8");
    let payload = glyph_payload(8, TransferMode::WithLabel);

    handshake().run(&connector, &payload).unwrap();

    let log = connector.log();
    let writes = log.writes();
    assert_eq!(writes.len(), 1);
    assert_eq!(&writes[0][..], payload.as_bytes());

    let write_at = log
        .events
        .iter()
        .position(|e| matches!(e, TransportEvent::Write(_)))
        .unwrap();
    assert_eq!(log.events[write_at + 1], TransportEvent::Flush);
    assert_eq!(log.opened(), Some(("sim0", 115_200)));
}

/// A dataset sample travels through the handshake unchanged.
#[test]
fn test_dataset_sample_end_to_end() {
    let dataset = mini_mnist(30).occurrence(1);
    let digit = Digit::new(4).unwrap();
    let image = dataset.sample(digit).unwrap();
    let payload = Payload::build(&image, digit, TransferMode::WithLabel);

    let connector = ScriptedConnector::new()
        .line("READY")
        .line("Inference done")
        .line("Prediction: 4");
    let mut kinds = Vec::new();

    let report = handshake()
        .run_with(&connector, &payload, |s| kinds.push(s.kind))
        .unwrap();

    // Second "4" in the set is sample 14.
    let log = connector.log();
    let sent = log.writes()[0];
    assert!(sent[..IMAGE_SIZE].iter().all(|&p| p == 14));
    assert_eq!(sent[IMAGE_SIZE], 4);
    assert_eq!(
        kinds,
        vec![LineKind::Banner, LineKind::Response, LineKind::Response]
    );
    assert_eq!(report.prediction_matches(), Some(true));
}

/// Missing dataset files surface as an unavailable source.
#[test]
fn test_missing_dataset_is_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let err = IdxDataset::open(dir.path().join("nowhere")).err().unwrap();
    assert!(matches!(err, DigitwireError::SourceUnavailable(_)));
}

/// A non-zero settle delay is waited out on every run.
#[test]
fn test_settle_delay_is_waited() {
    let delay = Duration::from_millis(50);
    let connector = ScriptedConnector::new().line("READY").line("Prediction: 2");
    let handshake = Handshake::builder("sim0")
        .settle_delay(delay)
        .read_timeout(Duration::from_millis(1))
        .build();

    let started = std::time::Instant::now();
    let report = handshake
        .run(&connector, &glyph_payload(2, TransferMode::WithLabel))
        .unwrap();

    assert!(started.elapsed() >= delay);
    assert_eq!(report.prediction_matches(), Some(true));
}

/// A hard read failure mid-loop surfaces as an error and releases the port.
#[test]
fn test_read_failure_releases_port() {
    let connector = ScriptedConnector::new()
        .line("READY")
        .line("Inference done")
        .fail_read_at(1);

    let result = handshake().run(&connector, &glyph_payload(9, TransferMode::WithLabel));

    assert!(matches!(result, Err(DigitwireError::Io(_))));
    let log = connector.log();
    assert_eq!(log.writes().len(), 1);
    assert_eq!(log.events.last(), Some(&TransportEvent::Close));
}

/// Stale input survives a failed clear but the transfer still completes.
#[test]
fn test_clear_failure_continues() {
    let connector = ScriptedConnector::new()
        .fail_clear_input()
        .stale_input("BOOT\n")
        .line("Prediction: 6");

    let report = handshake()
        .run(&connector, &glyph_payload(6, TransferMode::WithLabel))
        .unwrap();

    assert_eq!(report.banner.as_deref(), Some("BOOT"));
    assert_eq!(report.responses, vec!["Prediction: 6"]);
}
