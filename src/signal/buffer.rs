use crate::signal::SignalError;
/// Fixed-capacity ring of recent samples for one channel.
///
/// The backing storage is allocated once, zero-filled, and never resized;
/// writes advance a modular index, so reads that reach past everything
/// written so far come back as zeros.
pub struct WaveformBuffer {
    data: Box<[f32]>,
    write_index: usize,
    sample_rate_hz: u32,
}
impl WaveformBuffer {
    /// Buffer sized to hold `history_seconds` of samples at `sample_rate_hz`.
    pub fn with_history_seconds(
        sample_rate_hz: u32,
        history_seconds: f64,
    ) -> Result<Self, SignalError> {
        if sample_rate_hz == 0 {
            return Err(SignalError::InvalidConfig(
                "sample rate must be greater than zero".into(),
            ));
        }
        let capacity = (sample_rate_hz as f64 * history_seconds).floor() as usize;
        if capacity == 0 {
            return Err(SignalError::InvalidConfig(format!(
                "history window of {history_seconds}s holds no samples at {sample_rate_hz} Hz"
            )));
        }
        Ok(Self {
            data: vec![0.0; capacity].into_boxed_slice(),
            write_index: 0,
            sample_rate_hz,
        })
    }
    pub fn capacity(&self) -> usize {
        self.data.len()
    }
    pub fn sample_rate_hz(&self) -> u32 {
        self.sample_rate_hz
    }
    /// Append samples, overwriting the oldest data once the ring is full.
    pub fn push(&mut self, samples: &[f32]) {
        for &sample in samples {
            self.data[self.write_index] = sample;
            self.write_index = (self.write_index + 1) % self.data.len();
        }
    }
    /// The most recent `seconds` of samples, oldest first.
    ///
    /// Requests longer than the ring are clamped to its capacity.
    pub fn window(&self, seconds: f64) -> Vec<f32> {
        let requested = (seconds * self.sample_rate_hz as f64).floor() as usize;
        let take = requested.min(self.data.len());
        let mut out = Vec::with_capacity(take);
        for i in 0..take {
            let index = (self.write_index + self.data.len() - take + i) % self.data.len();
            out.push(self.data[index]);
        }
        out
    }
    /// Everything the ring can hold, oldest first.
    pub fn full_window(&self) -> Vec<f32> {
        self.window(self.data.len() as f64 / self.sample_rate_hz as f64)
    }
    /// Zero-fill and rewind; capacity is unchanged.
    pub fn clear(&mut self) {
        self.data.fill(0.0);
        self.write_index = 0;
    }
}
/// Root-mean-square of a sample slice; 0.0 for an empty slice.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
    (sum_sq / samples.len() as f32).sqrt()
}
