use log::{debug, info, warn};
use serde::Serialize;
use crate::signal::buffer::rms;
use crate::signal::{
    SampleBlock, SignalError, Spike, SpikeDetector, WavEncoder, WaveformBuffer,
};
/// Key press captured while recording; `timestamp` is seconds since the
/// recording started.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EventMarker {
    pub timestamp: f64,
    pub key: String,
}
/// Finished recording ready to be written out.
pub struct RecordingArtifact {
    pub wav_bytes: Vec<u8>,
    pub duration_seconds: f64,
    /// One `timestamp\tkey` line per marker; `None` when no markers fired.
    pub markers_text: Option<String>,
}
/// Recent window and RMS for one channel.
#[derive(Clone, Debug)]
pub struct ChannelView {
    pub label: String,
    pub rms: f32,
    pub samples: Vec<f32>,
}
/// Snapshot of every channel's recent history.
#[derive(Clone, Debug)]
pub struct PipelineView {
    pub sample_rate_hz: Option<u32>,
    pub channels: Vec<ChannelView>,
}
struct ChannelState {
    label: String,
    buffer: WaveformBuffer,
}
/// Coordinates everything that happens to a delivered block: ring-buffer
/// history, recording capture, and spike detection, in that order.
///
/// Channel buffers are created lazily the first time a label appears. One
/// detector instance serves every live channel, so the refractory window is
/// shared across them. Display gain/offset are a view concern and never
/// touch this path.
pub struct SignalPipeline {
    history_seconds: f64,
    sample_rate_hz: Option<u32>,
    channels: Vec<ChannelState>,
    detector: SpikeDetector,
    detection_enabled: bool,
    encoder: WavEncoder,
    recording: bool,
    recording_started_at: Option<f64>,
    markers: Vec<EventMarker>,
    spike_log: Vec<Spike>,
}
impl SignalPipeline {
    pub fn with_history_seconds(history_seconds: f64) -> Result<Self, SignalError> {
        if !(history_seconds > 0.0) {
            return Err(SignalError::InvalidConfig(
                "history window must be positive".into(),
            ));
        }
        Ok(Self {
            history_seconds,
            sample_rate_hz: None,
            channels: Vec::new(),
            detector: SpikeDetector::default(),
            detection_enabled: false,
            encoder: WavEncoder::new(),
            recording: false,
            recording_started_at: None,
            markers: Vec::new(),
            spike_log: Vec::new(),
        })
    }
    /// Process one block: push history, capture if recording, then detect.
    ///
    /// A recording failure aborts before detection, so no spikes are logged
    /// for a block that was not captured.
    pub fn deliver(&mut self, block: &SampleBlock) -> Result<(), SignalError> {
        block.validate()?;
        self.pin_rate(block)?;
        self.ensure_channels(block)?;
        for (label, payload) in block.channel_labels.iter().zip(&block.samples) {
            if let Some(state) = self.channels.iter_mut().find(|c| &c.label == label) {
                state.buffer.push(payload);
            }
        }
        if self.recording {
            self.encoder.record(block)?;
        }
        if self.detection_enabled {
            for (label, payload) in block.channel_labels.iter().zip(&block.samples) {
                let spikes =
                    self.detector
                        .detect(payload, block.sample_rate_hz, block.timestamp, label)?;
                self.spike_log.extend(spikes);
            }
        }
        Ok(())
    }
    fn pin_rate(&mut self, block: &SampleBlock) -> Result<(), SignalError> {
        match self.sample_rate_hz {
            None => {
                self.sample_rate_hz = Some(block.sample_rate_hz);
                Ok(())
            }
            Some(expected) if expected != block.sample_rate_hz => {
                Err(SignalError::InvalidConfig(format!(
                    "sample rate changed mid-stream: expected {expected}, got {}",
                    block.sample_rate_hz
                )))
            }
            Some(_) => Ok(()),
        }
    }
    fn ensure_channels(&mut self, block: &SampleBlock) -> Result<(), SignalError> {
        for label in &block.channel_labels {
            if self.channels.iter().any(|c| &c.label == label) {
                continue;
            }
            let buffer =
                WaveformBuffer::with_history_seconds(block.sample_rate_hz, self.history_seconds)?;
            debug!("created ring buffer for channel {label}");
            self.channels.push(ChannelState {
                label: label.clone(),
                buffer,
            });
        }
        Ok(())
    }
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }
    pub fn sample_rate_hz(&self) -> Option<u32> {
        self.sample_rate_hz
    }
    /// Begin capturing delivered blocks. `timestamp` anchors marker times.
    pub fn start_recording(&mut self, timestamp: f64) {
        if self.recording {
            warn!("recording already running, ignoring start");
            return;
        }
        self.encoder.clear();
        self.markers.clear();
        self.recording_started_at = Some(timestamp);
        self.recording = true;
        info!("recording started");
    }
    /// Finish the recording and hand back the encoded artifact.
    ///
    /// Returns `None` when no recording is running or nothing was captured.
    pub fn stop_recording(&mut self) -> Option<RecordingArtifact> {
        if !self.recording {
            return None;
        }
        self.recording = false;
        self.recording_started_at = None;
        if self.encoder.is_empty() {
            warn!("recording stopped without captured blocks, nothing to export");
            self.encoder.clear();
            self.markers.clear();
            return None;
        }
        let sample_rate_hz = self.encoder.sample_rate_hz().unwrap_or(0);
        let channel_count = self.encoder.channel_count().unwrap_or(0) as u16;
        let duration_seconds = self.encoder.duration_seconds();
        let wav_bytes = self.encoder.export(sample_rate_hz, channel_count);
        let markers_text = if self.markers.is_empty() {
            None
        } else {
            Some(
                self.markers
                    .iter()
                    .map(|m| format!("{}\t{}\n", m.timestamp, m.key))
                    .collect(),
            )
        };
        self.encoder.clear();
        self.markers.clear();
        info!("recording stopped after {duration_seconds:.3}s");
        Some(RecordingArtifact {
            wav_bytes,
            duration_seconds,
            markers_text,
        })
    }
    /// Throw away the running recording without exporting.
    pub fn cancel_recording(&mut self) {
        if !self.recording {
            return;
        }
        self.recording = false;
        self.recording_started_at = None;
        self.encoder.clear();
        self.markers.clear();
        info!("recording cancelled");
    }
    pub fn is_recording(&self) -> bool {
        self.recording
    }
    /// Seconds captured by the running recording.
    pub fn recorded_seconds(&self) -> f64 {
        self.encoder.duration_seconds()
    }
    /// Record a key marker at absolute stream time `timestamp`; ignored
    /// unless a recording is running.
    pub fn add_marker(&mut self, timestamp: f64, key: impl Into<String>) {
        let Some(started_at) = self.recording_started_at else {
            debug!("marker ignored, no recording running");
            return;
        };
        self.markers.push(EventMarker {
            timestamp: timestamp - started_at,
            key: key.into(),
        });
    }
    pub fn markers(&self) -> &[EventMarker] {
        &self.markers
    }
    pub fn set_detection_enabled(&mut self, enabled: bool) {
        self.detection_enabled = enabled;
    }
    pub fn detection_enabled(&self) -> bool {
        self.detection_enabled
    }
    pub fn set_threshold(&mut self, threshold: f32) {
        self.detector.set_threshold(threshold);
    }
    pub fn threshold(&self) -> f32 {
        self.detector.threshold()
    }
    pub fn set_average_count(&mut self, count: usize) {
        self.detector.set_max_average_count(count);
    }
    pub fn reset_average(&mut self) {
        self.detector.reset_average();
    }
    pub fn average_waveform(&self) -> Vec<f32> {
        self.detector.average_waveform()
    }
    pub fn spikes(&self) -> &[Spike] {
        &self.spike_log
    }
    pub fn drain_spikes(&mut self) -> Vec<Spike> {
        std::mem::take(&mut self.spike_log)
    }
    /// Recent `seconds` of every channel plus its RMS.
    pub fn snapshot(&self, seconds: f64) -> PipelineView {
        let channels = self
            .channels
            .iter()
            .map(|state| {
                let samples = state.buffer.window(seconds);
                ChannelView {
                    label: state.label.clone(),
                    rms: rms(&samples),
                    samples,
                }
            })
            .collect();
        PipelineView {
            sample_rate_hz: self.sample_rate_hz,
            channels,
        }
    }
    /// Zero-fill every channel's history; labels and capacities stay.
    pub fn clear_buffers(&mut self) {
        for state in &mut self.channels {
            state.buffer.clear();
        }
    }
}
