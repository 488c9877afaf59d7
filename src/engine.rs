// src/engine.rs
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{Receiver, Sender, TryRecvError};
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use log::{error, info, warn};
use crate::signal::{RecordingArtifact, SampleSource, SignalPipeline};
use crate::types::{EngineCommand, EngineConfig, EngineEvent};
/// Blocks delivered between periodic `View` events.
const VIEW_EVERY_BLOCKS: u64 = 4;
/// Run the capture engine on its own thread.
///
/// The engine owns the source and the pipeline; everything else talks to it
/// over the command channel and listens on the event channel.
pub fn spawn_engine(
    source: Box<dyn SampleSource + Send>,
    config: EngineConfig,
    rx_cmd: Receiver<EngineCommand>,
    tx_event: Sender<EngineEvent>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || run_engine(source, config, rx_cmd, tx_event))
}
fn run_engine(
    mut source: Box<dyn SampleSource + Send>,
    config: EngineConfig,
    rx_cmd: Receiver<EngineCommand>,
    tx_event: Sender<EngineEvent>,
) {
    let mut pipeline = match SignalPipeline::with_history_seconds(config.history_seconds) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            error!("engine failed to start: {e}");
            tx_event.send(EngineEvent::Error(e.to_string())).ok();
            return;
        }
    };
    pipeline.set_threshold(config.threshold);
    pipeline.set_average_count(config.average_count);
    pipeline.set_detection_enabled(config.detection_enabled);
    let mut streaming = false;
    // Stream time just past the newest delivered sample; anchors recording
    // starts and markers.
    let mut clock = 0.0_f64;
    let mut delivered_blocks = 0_u64;
    info!("engine ready");
    'main: loop {
        // Drain a bounded burst of commands before touching the source.
        for _ in 0..10 {
            match rx_cmd.try_recv() {
                Ok(EngineCommand::StartStream) => {
                    if !streaming {
                        streaming = true;
                        info!("stream started");
                        tx_event.send(EngineEvent::StreamStatus(true)).ok();
                    }
                }
                Ok(EngineCommand::StopStream) => {
                    if streaming {
                        streaming = false;
                        info!("stream stopped");
                        tx_event.send(EngineEvent::StreamStatus(false)).ok();
                    }
                }
                Ok(EngineCommand::StartRecording) => {
                    pipeline.start_recording(clock);
                    tx_event.send(EngineEvent::RecordingStatus(true)).ok();
                }
                Ok(EngineCommand::StopRecording) => {
                    finish_recording(&mut pipeline, &config, &tx_event);
                }
                Ok(EngineCommand::CancelRecording) => {
                    pipeline.cancel_recording();
                    tx_event.send(EngineEvent::RecordingStatus(false)).ok();
                }
                Ok(EngineCommand::SetThreshold(threshold)) => pipeline.set_threshold(threshold),
                Ok(EngineCommand::SetDetectionEnabled(enabled)) => {
                    pipeline.set_detection_enabled(enabled)
                }
                Ok(EngineCommand::SetAverageCount(count)) => pipeline.set_average_count(count),
                Ok(EngineCommand::ResetAverage) => pipeline.reset_average(),
                Ok(EngineCommand::AddMarker(key)) => pipeline.add_marker(clock, key),
                Ok(EngineCommand::ClearBuffers) => pipeline.clear_buffers(),
                Ok(EngineCommand::Shutdown) => {
                    if pipeline.is_recording() {
                        finish_recording(&mut pipeline, &config, &tx_event);
                    }
                    info!("engine shut down");
                    break 'main;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    info!("command channel closed, engine shutting down");
                    if pipeline.is_recording() {
                        finish_recording(&mut pipeline, &config, &tx_event);
                    }
                    break 'main;
                }
            }
        }
        if !streaming {
            thread::sleep(Duration::from_millis(50));
            continue;
        }
        match source.next_block() {
            Ok(Some(block)) => {
                clock = block.end_timestamp();
                match pipeline.deliver(&block) {
                    Ok(()) => {
                        let spikes = pipeline.drain_spikes();
                        if !spikes.is_empty() {
                            tx_event.send(EngineEvent::Spikes(spikes)).ok();
                        }
                        delivered_blocks += 1;
                        if delivered_blocks % VIEW_EVERY_BLOCKS == 0 {
                            let view = pipeline.snapshot(config.view_seconds);
                            tx_event.send(EngineEvent::View(view)).ok();
                        }
                    }
                    Err(e) => {
                        warn!("dropped block: {e}");
                        tx_event.send(EngineEvent::Error(e.to_string())).ok();
                    }
                }
            }
            Ok(None) => thread::sleep(Duration::from_millis(5)),
            Err(e) => {
                error!("source failed: {e}");
                tx_event.send(EngineEvent::Error(e.to_string())).ok();
                streaming = false;
                tx_event.send(EngineEvent::StreamStatus(false)).ok();
            }
        }
    }
}
fn finish_recording(
    pipeline: &mut SignalPipeline,
    config: &EngineConfig,
    tx_event: &Sender<EngineEvent>,
) {
    if let Some(artifact) = pipeline.stop_recording() {
        match save_artifact(&artifact, &config.output_dir) {
            Ok(wav_path) => {
                info!("recording saved to {}", wav_path.display());
                tx_event
                    .send(EngineEvent::RecordingSaved {
                        wav_path,
                        duration_seconds: artifact.duration_seconds,
                    })
                    .ok();
            }
            Err(e) => {
                error!("failed to save recording: {e}");
                tx_event
                    .send(EngineEvent::Error(format!("failed to save recording: {e}")))
                    .ok();
            }
        }
    }
    tx_event.send(EngineEvent::RecordingStatus(false)).ok();
}
/// Write the WAV plus, when markers fired, a `-events.txt` sidecar.
fn save_artifact(artifact: &RecordingArtifact, dir: &Path) -> std::io::Result<PathBuf> {
    let unix_secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    let wav_path = dir.join(format!("recording_{unix_secs}.wav"));
    fs::write(&wav_path, &artifact.wav_bytes)?;
    if let Some(text) = &artifact.markers_text {
        fs::write(dir.join(format!("recording_{unix_secs}-events.txt")), text)?;
    }
    Ok(wav_path)
}
