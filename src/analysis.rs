// src/analysis.rs
use log::debug;
use serde::Serialize;

use crate::signal::{
    firing_rate, inter_spike_intervals, SignalError, Spike, SpikeDetector, WavDocument,
};

/// Detection threshold for offline passes. Exported recordings are already
/// normalized, so a lower bar than the live default picks up smaller units.
pub const OFFLINE_THRESHOLD: f32 = 0.1;
pub const DEFAULT_RATE_WINDOW_SECONDS: f64 = 1.0;

#[derive(Clone, Debug)]
pub struct AnalysisOptions {
    pub threshold: f32,
    pub rate_window_seconds: f64,
    /// Include the full spike list per channel, not just the summary.
    pub include_spikes: bool,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            threshold: OFFLINE_THRESHOLD,
            rate_window_seconds: DEFAULT_RATE_WINDOW_SECONDS,
            include_spikes: false,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ChannelAnalysis {
    pub channel: String,
    pub spike_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean_isi_seconds: Option<f64>,
    pub firing_rate_hz: Vec<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spikes: Option<Vec<Spike>>,
}

#[derive(Debug, Serialize)]
pub struct AnalysisReport {
    pub sample_rate_hz: u32,
    pub channel_count: usize,
    pub duration_seconds: f64,
    pub channels: Vec<ChannelAnalysis>,
}

/// Run spike detection over a decoded recording.
///
/// Channels are labeled `ch1..chN` in file order and timestamps count from
/// the start of the file. Every channel gets its own detector, so the
/// refractory clock of one channel never suppresses another.
pub fn analyze(
    document: &WavDocument,
    options: &AnalysisOptions,
) -> Result<AnalysisReport, SignalError> {
    let mut channels = Vec::with_capacity(document.num_channels());
    for (index, samples) in document.channels.iter().enumerate() {
        let label = format!("ch{}", index + 1);
        let mut detector = SpikeDetector::new(options.threshold);
        let spikes = detector.detect(samples, document.sample_rate_hz, 0.0, &label)?;
        debug!("{label}: {} spike(s)", spikes.len());

        let intervals = inter_spike_intervals(&spikes);
        let mean_isi_seconds = (!intervals.is_empty())
            .then(|| intervals.iter().sum::<f64>() / intervals.len() as f64);
        channels.push(ChannelAnalysis {
            channel: label,
            spike_count: spikes.len(),
            mean_isi_seconds,
            firing_rate_hz: firing_rate(&spikes, options.rate_window_seconds),
            spikes: options.include_spikes.then_some(spikes),
        });
    }
    Ok(AnalysisReport {
        sample_rate_hz: document.sample_rate_hz,
        channel_count: document.num_channels(),
        duration_seconds: document.duration_seconds(),
        channels,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 1 kHz document with an impulse per listed sample index.
    fn document_with_impulses(impulses: &[&[usize]]) -> WavDocument {
        let channels = impulses
            .iter()
            .map(|indices| {
                let mut samples = vec![0.0_f32; 2_000];
                for &i in *indices {
                    samples[i] = 0.9;
                }
                samples
            })
            .collect();
        WavDocument {
            sample_rate_hz: 1_000,
            channels,
        }
    }

    #[test]
    fn counts_and_intervals_per_channel() {
        let document = document_with_impulses(&[&[100, 600, 1100], &[500]]);
        let report = analyze(&document, &AnalysisOptions::default()).unwrap();

        assert_eq!(report.channel_count, 2);
        assert_eq!(report.duration_seconds, 2.0);

        let first = &report.channels[0];
        assert_eq!(first.channel, "ch1");
        assert_eq!(first.spike_count, 3);
        assert!((first.mean_isi_seconds.unwrap() - 0.5).abs() < 1e-9);

        let second = &report.channels[1];
        assert_eq!(second.spike_count, 1);
        assert_eq!(second.mean_isi_seconds, None);
        assert!(second.firing_rate_hz.is_empty());
    }

    #[test]
    fn channels_do_not_share_a_refractory_clock() {
        // Simultaneous spikes on both channels; a shared detector would
        // suppress whichever channel ran second.
        let document = document_with_impulses(&[&[500], &[500]]);
        let report = analyze(&document, &AnalysisOptions::default()).unwrap();
        assert_eq!(report.channels[0].spike_count, 1);
        assert_eq!(report.channels[1].spike_count, 1);
    }

    #[test]
    fn spike_lists_are_opt_in() {
        let document = document_with_impulses(&[&[100]]);
        let summary = analyze(&document, &AnalysisOptions::default()).unwrap();
        assert!(summary.channels[0].spikes.is_none());

        let options = AnalysisOptions {
            include_spikes: true,
            ..AnalysisOptions::default()
        };
        let detailed = analyze(&document, &options).unwrap();
        let spikes = detailed.channels[0].spikes.as_ref().unwrap();
        assert_eq!(spikes.len(), 1);
        assert!((spikes[0].timestamp - 0.1).abs() < 1e-9);
        assert!((spikes[0].amplitude - 0.9).abs() < 1e-6);
    }

    #[test]
    fn report_serializes_without_optional_fields() {
        let document = document_with_impulses(&[&[100]]);
        let report = analyze(&document, &AnalysisOptions::default()).unwrap();
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["channel_count"], 1);
        assert_eq!(json["channels"][0]["spike_count"], 1);
        assert!(json["channels"][0].get("spikes").is_none());
        assert!(json["channels"][0].get("mean_isi_seconds").is_none());
    }

    #[test]
    fn threshold_option_is_honored() {
        let mut document = document_with_impulses(&[&[]]);
        document.channels[0][300] = 0.05;
        let low = analyze(
            &document,
            &AnalysisOptions {
                threshold: 0.02,
                ..AnalysisOptions::default()
            },
        )
        .unwrap();
        let default = analyze(&document, &AnalysisOptions::default()).unwrap();
        assert_eq!(low.channels[0].spike_count, 1);
        assert_eq!(default.channels[0].spike_count, 0);
    }
}
