// src/main.rs
mod cli;

use std::fs;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info, warn};

use spikescope::capture::{list_ports, MicrophoneSource, SerialSource, SynthSource};
use spikescope::signal::{SampleSource, WavDocument};
use spikescope::{
    analyze, spawn_engine, AnalysisOptions, EngineCommand, EngineConfig, EngineEvent,
};

use cli::{AnalyzeArgs, CaptureArgs, Cli, Command, SourceKind};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp(None)
        .init();

    match cli.command {
        Command::Capture(args) => capture(args),
        Command::Analyze(args) => analyze_file(args),
        Command::Ports => ports(),
    }
}

fn capture(args: CaptureArgs) -> Result<()> {
    let source = open_source(&args)?;
    let config = EngineConfig {
        history_seconds: args.history,
        threshold: args.threshold,
        detection_enabled: true,
        output_dir: args.output_dir.clone(),
        ..EngineConfig::default()
    };

    let (tx_cmd, rx_cmd) = mpsc::channel();
    let (tx_event, rx_event) = mpsc::channel();
    let engine = spawn_engine(source, config, rx_cmd, tx_event);

    tx_cmd.send(EngineCommand::StartStream).ok();
    if args.record {
        tx_cmd.send(EngineCommand::StartRecording).ok();
    }

    let deadline = Instant::now() + Duration::from_secs_f64(args.seconds.max(0.0));
    let mut spike_total = 0_usize;
    while Instant::now() < deadline {
        match rx_event.recv_timeout(Duration::from_millis(100)) {
            Ok(EngineEvent::Spikes(spikes)) => {
                spike_total += spikes.len();
                for spike in &spikes {
                    println!(
                        "{:>10.4}s  {}  {:+.3}",
                        spike.timestamp, spike.channel, spike.amplitude
                    );
                }
            }
            Ok(EngineEvent::View(view)) => {
                for channel in &view.channels {
                    debug!("{}: rms {:.4}", channel.label, channel.rms);
                }
            }
            Ok(EngineEvent::Error(e)) => warn!("{e}"),
            Ok(_) => {}
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }

    if args.record {
        tx_cmd.send(EngineCommand::StopRecording).ok();
    }
    tx_cmd.send(EngineCommand::Shutdown).ok();
    // The engine drops its event sender on exit; drain until then so the
    // saved recording gets reported.
    while let Ok(event) = rx_event.recv_timeout(Duration::from_secs(5)) {
        if let EngineEvent::RecordingSaved {
            wav_path,
            duration_seconds,
        } = event
        {
            println!(
                "recording saved: {} ({duration_seconds:.2} s)",
                wav_path.display()
            );
        }
    }
    engine.join().ok();
    info!("session finished, {spike_total} spike(s)");
    Ok(())
}

fn open_source(args: &CaptureArgs) -> Result<Box<dyn SampleSource + Send>> {
    match args.source {
        SourceKind::Synth => Ok(Box::new(SynthSource::new(args.channels)?)),
        SourceKind::Serial => {
            let port = args
                .port
                .as_deref()
                .context("--port is required for the serial source")?;
            let mut source = SerialSource::open(port, args.baud, args.channels)?;
            if let Some(command) = &args.command {
                source.send_command(command)?;
            }
            Ok(Box::new(source))
        }
        SourceKind::Mic => Ok(Box::new(MicrophoneSource::open()?)),
    }
}

fn analyze_file(args: AnalyzeArgs) -> Result<()> {
    let bytes = fs::read(&args.input)
        .with_context(|| format!("reading {}", args.input.display()))?;
    let document = WavDocument::decode(&bytes)?;
    let options = AnalysisOptions {
        threshold: args.threshold,
        rate_window_seconds: args.window,
        include_spikes: args.spikes,
    };
    let report = analyze(&document, &options)?;

    let json = if args.pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    match &args.output {
        Some(path) => fs::write(path, json)
            .with_context(|| format!("writing {}", path.display()))?,
        None => println!("{json}"),
    }
    Ok(())
}

fn ports() -> Result<()> {
    let ports = list_ports()?;
    if ports.is_empty() {
        println!("no serial ports found");
    } else {
        for port in ports {
            println!("{port}");
        }
    }
    Ok(())
}
