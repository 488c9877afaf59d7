// src/cli.rs
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use spikescope::analysis::{DEFAULT_RATE_WINDOW_SECONDS, OFFLINE_THRESHOLD};
use spikescope::capture::DEFAULT_BAUD_RATE;
use spikescope::signal::DEFAULT_THRESHOLD;

#[derive(Parser)]
#[command(
    name = "spikescope",
    version,
    about = "Streaming spike recorder and offline WAV analyzer"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Command {
    /// Stream a live session, printing spikes as they fire
    Capture(CaptureArgs),
    /// Detect spikes in a recorded WAV file and emit a JSON report
    Analyze(AnalyzeArgs),
    /// List serial ports visible to the OS
    Ports,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum SourceKind {
    /// Built-in sine + noise generator with injected bursts
    Synth,
    /// Serial-attached acquisition board
    Serial,
    /// Default system input device
    Mic,
}

#[derive(Args)]
pub struct CaptureArgs {
    /// Where samples come from
    #[arg(long, value_enum, default_value = "synth")]
    pub source: SourceKind,

    /// Serial port path, e.g. /dev/ttyUSB0
    #[arg(long)]
    pub port: Option<String>,

    /// Serial baud rate
    #[arg(long, default_value_t = DEFAULT_BAUD_RATE)]
    pub baud: u32,

    /// Channel count (synth and serial sources)
    #[arg(long, default_value_t = 1)]
    pub channels: usize,

    /// Device command sent once after the serial port opens
    #[arg(long)]
    pub command: Option<String>,

    /// Session length in seconds
    #[arg(long, default_value_t = 10.0)]
    pub seconds: f64,

    /// Record the session to a timestamped WAV file
    #[arg(long, default_value_t = false)]
    pub record: bool,

    /// Spike detection threshold
    #[arg(long, default_value_t = DEFAULT_THRESHOLD)]
    pub threshold: f32,

    /// Seconds of per-channel history kept in memory
    #[arg(long, default_value_t = 60.0)]
    pub history: f64,

    /// Directory recordings are written into
    #[arg(long, default_value = ".")]
    pub output_dir: PathBuf,
}

#[derive(Args)]
pub struct AnalyzeArgs {
    /// Recorded WAV file
    pub input: PathBuf,

    /// Spike detection threshold
    #[arg(long, default_value_t = OFFLINE_THRESHOLD)]
    pub threshold: f32,

    /// Firing-rate bin width in seconds
    #[arg(long, default_value_t = DEFAULT_RATE_WINDOW_SECONDS)]
    pub window: f64,

    /// Include every detected spike in the report
    #[arg(long, default_value_t = false)]
    pub spikes: bool,

    /// Pretty-print the JSON report
    #[arg(long, default_value_t = false)]
    pub pretty: bool,

    /// Output file (default: stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}
