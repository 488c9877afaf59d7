//! Threshold-crossing spike detection with refractory gating and peak
//! refinement.
//!
//! - A spike is an upward crossing: previous sample below the threshold,
//!   current sample at or above it. The last sample of a block is never a
//!   crossing candidate.
//! - Crossings inside the refractory window after an accepted spike are
//!   suppressed. The refractory clock runs on stream time, so it carries
//!   across blocks and across every channel sharing one detector instance.
//! - Each accepted crossing is refined by scanning up to 20 samples ahead
//!   for the true peak, stopping early once a sample falls below 80% of the
//!   running maximum.
//! - A 60-sample window around each peak (20 before, 40 after, zero padded
//!   at block edges) feeds a bounded FIFO used for the running average.
use std::collections::VecDeque;
use serde::Serialize;
use crate::signal::SignalError;
/// Samples kept per extracted spike waveform.
pub const WAVEFORM_SAMPLES: usize = 60;
/// Samples captured before the peak in an extracted waveform.
pub const PRE_PEAK_SAMPLES: usize = 20;
/// Samples captured after the peak in an extracted waveform.
pub const POST_PEAK_SAMPLES: usize = 40;
/// Seconds during which new crossings are suppressed after a spike.
pub const REFRACTORY_SECONDS: f64 = 0.001;
/// Default bound on the running-average FIFO.
pub const DEFAULT_AVERAGE_COUNT: usize = 25;
/// Default detection threshold for live streams.
pub const DEFAULT_THRESHOLD: f32 = 0.5;
/// How far past a crossing the peak search may look.
const PEAK_SCAN_AHEAD: usize = 20;
/// Early-exit ratio for the peak search.
const PEAK_DROP_RATIO: f32 = 0.8;
/// One detected spike event.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Spike {
    /// Stream time of the refined peak, seconds.
    pub timestamp: f64,
    /// Signal value at the refined peak.
    pub amplitude: f32,
    /// Label of the channel the spike occurred on.
    pub channel: String,
}
/// Stateful detector; owns the refractory clock and the waveform FIFO.
pub struct SpikeDetector {
    threshold: f32,
    last_spike_time: f64,
    waveforms: VecDeque<Vec<f32>>,
    max_average_count: usize,
}
impl Default for SpikeDetector {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}
impl SpikeDetector {
    pub fn new(threshold: f32) -> Self {
        Self {
            threshold,
            last_spike_time: 0.0,
            waveforms: VecDeque::new(),
            max_average_count: DEFAULT_AVERAGE_COUNT,
        }
    }
    pub fn threshold(&self) -> f32 {
        self.threshold
    }
    pub fn set_threshold(&mut self, threshold: f32) {
        self.threshold = threshold;
    }
    pub fn max_average_count(&self) -> usize {
        self.max_average_count
    }
    /// Shrink or grow the FIFO bound; shrinking keeps the newest waveforms.
    pub fn set_max_average_count(&mut self, count: usize) {
        self.max_average_count = count;
        while self.waveforms.len() > self.max_average_count {
            self.waveforms.pop_front();
        }
    }
    pub fn waveform_count(&self) -> usize {
        self.waveforms.len()
    }
    pub fn reset_average(&mut self) {
        self.waveforms.clear();
    }
    /// Scan one block for upward threshold crossings.
    ///
    /// `block_timestamp` is the stream time of `samples[0]`; sample `i` is
    /// taken to occur at `block_timestamp + i / sample_rate_hz`. Every
    /// returned spike carries the refined peak time and amplitude.
    pub fn detect(
        &mut self,
        samples: &[f32],
        sample_rate_hz: u32,
        block_timestamp: f64,
        channel: &str,
    ) -> Result<Vec<Spike>, SignalError> {
        if sample_rate_hz == 0 {
            return Err(SignalError::InvalidConfig(
                "sample rate must be greater than zero".into(),
            ));
        }
        let dt = 1.0 / sample_rate_hz as f64;
        let mut spikes = Vec::new();
        for i in 1..samples.len().saturating_sub(1) {
            let current_time = block_timestamp + i as f64 * dt;
            if current_time - self.last_spike_time < REFRACTORY_SECONDS {
                continue;
            }
            if samples[i - 1] < self.threshold && samples[i] >= self.threshold {
                let (peak_index, peak_value) = refine_peak(samples, i);
                spikes.push(Spike {
                    timestamp: block_timestamp + peak_index as f64 * dt,
                    amplitude: peak_value,
                    channel: channel.to_string(),
                });
                // The refractory window opens at the crossing, not the peak.
                self.last_spike_time = current_time;
                self.push_waveform(extract_waveform(samples, peak_index));
            }
        }
        Ok(spikes)
    }
    /// Element-wise mean of the waveform FIFO; all zeros when empty.
    pub fn average_waveform(&self) -> Vec<f32> {
        let mut average = vec![0.0_f32; WAVEFORM_SAMPLES];
        if self.waveforms.is_empty() {
            return average;
        }
        for waveform in &self.waveforms {
            for (slot, sample) in average.iter_mut().zip(waveform) {
                *slot += sample;
            }
        }
        let count = self.waveforms.len() as f32;
        for slot in &mut average {
            *slot /= count;
        }
        average
    }
    fn push_waveform(&mut self, waveform: Vec<f32>) {
        self.waveforms.push_back(waveform);
        while self.waveforms.len() > self.max_average_count {
            self.waveforms.pop_front();
        }
    }
}
/// Walk forward from a crossing looking for the local maximum.
///
/// The search is bounded to 20 samples and gives up once a sample drops
/// below 80% of the running peak, which keeps a narrow spike from being
/// credited to unrelated activity further along the block.
fn refine_peak(samples: &[f32], crossing: usize) -> (usize, f32) {
    let mut peak_index = crossing;
    let mut peak_value = samples[crossing];
    let scan_end = (crossing + PEAK_SCAN_AHEAD).min(samples.len());
    for j in crossing + 1..scan_end {
        if samples[j] > peak_value {
            peak_value = samples[j];
            peak_index = j;
        } else if samples[j] < peak_value * PEAK_DROP_RATIO {
            break;
        }
    }
    (peak_index, peak_value)
}
/// Copy the window around a peak into a fresh zeroed 60-sample buffer.
///
/// When the window is clipped by the block start, the copy stays
/// front-aligned rather than centered.
fn extract_waveform(samples: &[f32], peak_index: usize) -> Vec<f32> {
    let start = peak_index.saturating_sub(PRE_PEAK_SAMPLES);
    let end = (peak_index + POST_PEAK_SAMPLES).min(samples.len());
    let mut waveform = vec![0.0_f32; WAVEFORM_SAMPLES];
    for (slot, &sample) in waveform.iter_mut().zip(&samples[start..end]) {
        *slot = sample;
    }
    waveform
}
/// Spikes whose timestamps fall inside `[start, end]`, bounds inclusive.
pub fn filter_spikes(spikes: &[Spike], start: f64, end: f64) -> Vec<Spike> {
    spikes
        .iter()
        .filter(|s| s.timestamp >= start && s.timestamp <= end)
        .cloned()
        .collect()
}
/// Consecutive timestamp differences; fewer than two spikes yields empty.
pub fn inter_spike_intervals(spikes: &[Spike]) -> Vec<f64> {
    spikes
        .windows(2)
        .map(|pair| pair[1].timestamp - pair[0].timestamp)
        .collect()
}
/// Spike counts per `window_seconds` bin divided by the window length.
///
/// Bins start at the first spike's timestamp and cover
/// `ceil((last - first) / window)` windows; a spike landing past the final
/// bin (the last spike, sitting exactly on the closing edge) is dropped.
pub fn firing_rate(spikes: &[Spike], window_seconds: f64) -> Vec<f64> {
    if spikes.is_empty() || window_seconds <= 0.0 {
        return Vec::new();
    }
    let first = spikes[0].timestamp;
    let last = spikes[spikes.len() - 1].timestamp;
    let bins = ((last - first) / window_seconds).ceil() as usize;
    let mut counts = vec![0_usize; bins];
    for spike in spikes {
        let offset = spike.timestamp - first;
        if offset < 0.0 {
            continue;
        }
        let bin = (offset / window_seconds).floor() as usize;
        if bin < counts.len() {
            counts[bin] += 1;
        }
    }
    counts
        .into_iter()
        .map(|count| count as f64 / window_seconds)
        .collect()
}
