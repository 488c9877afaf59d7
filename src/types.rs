// src/types.rs
use std::path::PathBuf;
use crate::signal::{PipelineView, Spike, DEFAULT_AVERAGE_COUNT, DEFAULT_THRESHOLD};
// Commands sent from the controlling surface to the engine thread.
#[derive(Clone, Debug)]
pub enum EngineCommand {
    StartStream,
    StopStream,
    StartRecording,
    StopRecording,
    CancelRecording,
    SetThreshold(f32),
    SetDetectionEnabled(bool),
    SetAverageCount(usize),
    ResetAverage,
    // Key marker stamped at the current stream time.
    AddMarker(String),
    ClearBuffers,
    Shutdown,
}
// Events published by the engine thread.
#[derive(Clone, Debug)]
pub enum EngineEvent {
    StreamStatus(bool),
    RecordingStatus(bool),
    // Periodic snapshot of recent history for rendering or logging.
    View(PipelineView),
    // Spikes detected in the latest delivered block.
    Spikes(Vec<Spike>),
    RecordingSaved {
        wav_path: PathBuf,
        duration_seconds: f64,
    },
    Error(String),
}
// Engine start-up settings.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub history_seconds: f64,
    /// Window the periodic `View` events cover.
    pub view_seconds: f64,
    pub threshold: f32,
    pub average_count: usize,
    pub detection_enabled: bool,
    /// Where recording artifacts are written.
    pub output_dir: PathBuf,
}
impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            history_seconds: 60.0,
            view_seconds: 1.0,
            threshold: DEFAULT_THRESHOLD,
            average_count: DEFAULT_AVERAGE_COUNT,
            detection_enabled: false,
            output_dir: PathBuf::from("."),
        }
    }
}
