//! digitwire - send one digit image to a serial inference device.
//!
//! Device lines go to stdout as they arrive; logs go to stderr
//! (`RUST_LOG=digitwire=debug` shows every handshake step).

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{ArgAction, Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use digitwire::console::{write_stdout_json, write_stdout_line};
use digitwire::image::{Digit, IdxDataset, ImageSource, SegmentGlyphSource};
use digitwire::protocol::{Payload, TransferMode, DEFAULT_BAUD_RATE};
use digitwire::transport::{default_endpoint, list_endpoints, SerialConnector};
use digitwire::{Handshake, Result};

/// CLI options.
#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Send a 28x28 digit image to a serial inference device and print its reply"
)]
struct Args {
    /// Serial endpoint (COM3, /dev/ttyACM0, ...).
    #[arg(short, long, env = "DIGITWIRE_PORT", default_value = default_endpoint())]
    port: String,

    /// Baud rate.
    #[arg(short, long, env = "DIGITWIRE_BAUD", default_value_t = DEFAULT_BAUD_RATE)]
    baud: u32,

    /// Digit class to send.
    #[arg(short, long, default_value_t = 7, value_parser = clap::value_parser!(u8).range(0..=9))]
    digit: u8,

    /// Per-read timeout in seconds.
    #[arg(short, long, default_value = "5", value_parser = parse_seconds)]
    timeout: Duration,

    /// Where the image comes from.
    #[arg(short, long, value_enum, default_value_t = SourceArg::Glyph)]
    source: SourceArg,

    /// Directory holding the uncompressed MNIST training IDX files.
    #[arg(long, env = "DIGITWIRE_MNIST_DIR", default_value = "data/mnist")]
    mnist_dir: PathBuf,

    /// Which dataset sample of the digit to send (0 = first).
    #[arg(long, default_value_t = 0)]
    occurrence: usize,

    /// Payload layout; must match the device firmware.
    #[arg(long, value_enum, default_value_t = ModeArg::WithLabel)]
    mode: ModeArg,

    /// Print an ASCII preview of the image to stderr before sending.
    #[arg(long, action = ArgAction::SetTrue)]
    preview: bool,

    /// Print the transfer report as one JSON line when done.
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,

    /// List serial endpoints and exit.
    #[arg(long, action = ArgAction::SetTrue)]
    list_ports: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum SourceArg {
    /// Seven-segment glyph drawn on the fly.
    Glyph,
    /// Sample from the MNIST training set.
    Mnist,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ModeArg {
    /// 784 pixel bytes + 1 label byte.
    WithLabel,
    /// 784 pixel bytes.
    ImageOnly,
}

impl From<ModeArg> for TransferMode {
    fn from(value: ModeArg) -> Self {
        match value {
            ModeArg::WithLabel => TransferMode::WithLabel,
            ModeArg::ImageOnly => TransferMode::ImageOnly,
        }
    }
}

fn parse_seconds(value: &str) -> std::result::Result<Duration, String> {
    let secs: f64 = value
        .parse()
        .map_err(|_| format!("`{}` is not a number of seconds", value))?;
    Duration::try_from_secs_f64(secs).map_err(|_| format!("`{}` is not a valid timeout", value))
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("digitwire=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    init_tracing();
    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<()> {
    if args.list_ports {
        for endpoint in list_endpoints()? {
            write_stdout_line(&format!("{}\t{}", endpoint.name, endpoint.kind))?;
        }
        return Ok(());
    }

    let digit = Digit::new(args.digit)?;
    let source: Box<dyn ImageSource> = match args.source {
        SourceArg::Glyph => Box::new(SegmentGlyphSource::new()),
        SourceArg::Mnist => Box::new(IdxDataset::open(&args.mnist_dir)?.occurrence(args.occurrence)),
    };
    let image = source.sample(digit)?;
    tracing::info!(
        "Using {} image of digit {} ({} lit pixels)",
        source.name(),
        digit,
        image.ink()
    );

    if args.preview {
        eprint!("{}", image.render_ascii());
    }

    let payload = Payload::build(&image, digit, args.mode.into());
    let handshake = Handshake::builder(&args.port)
        .baud_rate(args.baud)
        .read_timeout(args.timeout)
        .build();

    let report = handshake.run_with(&SerialConnector, &payload, |surfaced| {
        if let Err(e) = write_stdout_line(surfaced.line.as_str()) {
            tracing::warn!("Could not print device line: {}", e);
        }
    })?;

    match report.prediction_matches() {
        Some(true) => tracing::info!("Prediction matches label {}", digit),
        Some(false) => tracing::warn!(
            "Prediction {:?} does not match label {}",
            report.prediction.map(Digit::value),
            digit
        ),
        None => {}
    }

    if args.json {
        write_stdout_json(&report)?;
    }

    Ok(())
}
