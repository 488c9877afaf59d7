use std::collections::VecDeque;
use crate::signal::SignalError;
/// Single delivery unit of multi-channel samples.
///
/// `timestamp` is the stream time in seconds of the first sample; sample `i`
/// occurs at `timestamp + i / sample_rate_hz`.
#[derive(Clone, Debug)]
pub struct SampleBlock {
    pub timestamp: f64,
    pub sample_rate_hz: u32,
    pub samples: Vec<Vec<f32>>, // channels x samples
    pub channel_labels: Vec<String>,
}
impl SampleBlock {
    pub fn validate(&self) -> Result<(), SignalError> {
        if self.sample_rate_hz == 0 {
            return Err(SignalError::InvalidConfig(
                "sample rate must be greater than zero".into(),
            ));
        }
        if self.samples.len() != self.channel_labels.len() {
            return Err(SignalError::InvalidConfig(format!(
                "channel count mismatch: {} payloads for {} labels",
                self.samples.len(),
                self.channel_labels.len()
            )));
        }
        if let Some(first) = self.samples.first() {
            if self.samples.iter().any(|c| c.len() != first.len()) {
                return Err(SignalError::InvalidConfig(
                    "channel payloads must have equal lengths".into(),
                ));
            }
        }
        Ok(())
    }
    pub fn num_channels(&self) -> usize {
        self.samples.len()
    }
    pub fn samples_per_channel(&self) -> usize {
        self.samples.first().map(|c| c.len()).unwrap_or(0)
    }
    pub fn duration_seconds(&self) -> f64 {
        self.samples_per_channel() as f64 / self.sample_rate_hz as f64
    }
    /// Stream time just past the last sample in the block.
    pub fn end_timestamp(&self) -> f64 {
        self.timestamp + self.duration_seconds()
    }
}
/// Trait representing something that can yield sample blocks on demand.
///
/// `Ok(None)` means no data is available right now; callers poll again later.
pub trait SampleSource {
    fn next_block(&mut self) -> Result<Option<SampleBlock>, SignalError>;
}
/// In-memory source useful for tests and deterministic playback.
pub struct ManualSource {
    queue: VecDeque<SampleBlock>,
}
impl ManualSource {
    pub fn new(blocks: impl IntoIterator<Item = SampleBlock>) -> Self {
        Self {
            queue: blocks.into_iter().collect(),
        }
    }
}
impl SampleSource for ManualSource {
    fn next_block(&mut self) -> Result<Option<SampleBlock>, SignalError> {
        Ok(self.queue.pop_front())
    }
}
/// Lightweight helper to produce a block from owned sample data.
pub fn make_block(
    timestamp: f64,
    sample_rate_hz: u32,
    samples: Vec<Vec<f32>>,
    channel_labels: Vec<String>,
) -> SampleBlock {
    SampleBlock {
        timestamp,
        sample_rate_hz,
        samples,
        channel_labels,
    }
}
