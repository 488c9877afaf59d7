//! Synthetic multi-channel source for demos and soak testing.
//!
//! Each channel carries a low-amplitude sine plus white noise, with a short
//! burst injected roughly twice a second so the detector has something to
//! find. Bursts are staggered across channels.

use std::f64::consts::PI;
use std::thread;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::signal::{make_block, SampleBlock, SampleSource, SignalError};

const SAMPLE_RATE_HZ: u32 = 10_000;
/// 50 ms of samples per delivered block.
const BLOCK_SAMPLES: usize = 500;
const CARRIER_HZ: f64 = 6.0;
const CARRIER_AMPLITUDE: f32 = 0.08;
const NOISE_AMPLITUDE: f32 = 0.03;
const BURST_PERIOD_SAMPLES: u64 = 5_000;
/// Offset between channels so bursts never line up on the same sample.
const BURST_STAGGER_SAMPLES: u64 = 977;
const BURST_SHAPE: [f32; 6] = [0.3, 0.7, 0.85, 0.55, 0.3, 0.12];

pub struct SynthSource {
    labels: Vec<String>,
    emitted: u64,
    rng: StdRng,
    paced: bool,
}

impl SynthSource {
    /// Real-time generator: each block takes as long to produce as it
    /// covers, so downstream timing behaves like a live device.
    pub fn new(channel_count: usize) -> Result<Self, SignalError> {
        let mut source = Self::with_seed(channel_count, rand::random())?;
        source.paced = true;
        Ok(source)
    }

    /// Deterministic, unpaced variant for tests and offline soak runs.
    pub fn with_seed(channel_count: usize, seed: u64) -> Result<Self, SignalError> {
        if channel_count == 0 {
            return Err(SignalError::InvalidConfig(
                "channel count must be greater than zero".into(),
            ));
        }
        Ok(Self {
            labels: (1..=channel_count)
                .map(|i| format!("synth_ch{i}"))
                .collect(),
            emitted: 0,
            rng: StdRng::seed_from_u64(seed),
            paced: false,
        })
    }

    pub fn sample_rate_hz(&self) -> u32 {
        SAMPLE_RATE_HZ
    }

    fn sample(&mut self, channel: usize, n: u64) -> f32 {
        let t = n as f64 / SAMPLE_RATE_HZ as f64;
        let phase = channel as f64 * PI / 3.0;
        let carrier = (2.0 * PI * CARRIER_HZ * t + phase).sin() as f32;
        let mut value = CARRIER_AMPLITUDE * carrier;
        value += self.rng.gen_range(-NOISE_AMPLITUDE..NOISE_AMPLITUDE);
        let into_period = (n + channel as u64 * BURST_STAGGER_SAMPLES) % BURST_PERIOD_SAMPLES;
        if (into_period as usize) < BURST_SHAPE.len() {
            value += BURST_SHAPE[into_period as usize];
        }
        value
    }
}

impl SampleSource for SynthSource {
    fn next_block(&mut self) -> Result<Option<SampleBlock>, SignalError> {
        let start = self.emitted;
        let timestamp = start as f64 / SAMPLE_RATE_HZ as f64;
        let mut channels = Vec::with_capacity(self.labels.len());
        for c in 0..self.labels.len() {
            let mut samples = Vec::with_capacity(BLOCK_SAMPLES);
            for i in 0..BLOCK_SAMPLES as u64 {
                samples.push(self.sample(c, start + i));
            }
            channels.push(samples);
        }
        self.emitted += BLOCK_SAMPLES as u64;
        if self.paced {
            thread::sleep(Duration::from_millis(
                (BLOCK_SAMPLES as u64 * 1_000) / SAMPLE_RATE_HZ as u64,
            ));
        }
        Ok(Some(make_block(
            timestamp,
            SAMPLE_RATE_HZ,
            channels,
            self.labels.clone(),
        )))
    }
}
