//! PCM16 WAV container encode/decode for recorded signal.
//!
//! Wire format (all multi-byte fields little-endian):
//! - 44-byte canonical header: "RIFF" + chunk size, "WAVE", "fmt " chunk of
//!   16 bytes (PCM format 1, channel count, sample rate, byte rate, block
//!   align, 16 bits per sample), "data" + payload size.
//! - Payload: frames interleaved across channels, one i16 per sample.
//! - Quantization maps floats in [-1, 1] with distinct scale factors:
//!   `* 32767` for non-negative and `* 32768` for negative values, truncating
//!   toward zero. Decoding always divides by 32768, so +1.0 round-trips to
//!   0.99997 while -1.0 round-trips exactly.
use crate::signal::{SampleBlock, SignalError};
/// Accumulates recorded blocks and serializes them as a PCM16 WAV byte
/// stream. Channel arity and sample rate are pinned by the first recorded
/// block; a change mid-recording is rejected.
pub struct WavEncoder {
    blocks: Vec<Vec<Vec<f32>>>, // each entry: channels x samples
    channel_count: Option<usize>,
    sample_rate_hz: Option<u32>,
    frames: usize,
}
impl WavEncoder {
    pub fn new() -> Self {
        Self {
            blocks: Vec::new(),
            channel_count: None,
            sample_rate_hz: None,
            frames: 0,
        }
    }
    /// Deep-copy one block into the recording.
    pub fn record(&mut self, block: &SampleBlock) -> Result<(), SignalError> {
        block.validate()?;
        if block.num_channels() == 0 {
            return Err(SignalError::InvalidConfig(
                "cannot record a block with no channels".into(),
            ));
        }
        match self.channel_count {
            None => self.channel_count = Some(block.num_channels()),
            Some(expected) if expected != block.num_channels() => {
                return Err(SignalError::InvalidConfig(format!(
                    "channel count changed mid-recording: expected {expected}, got {}",
                    block.num_channels()
                )));
            }
            Some(_) => {}
        }
        match self.sample_rate_hz {
            None => self.sample_rate_hz = Some(block.sample_rate_hz),
            Some(expected) if expected != block.sample_rate_hz => {
                return Err(SignalError::InvalidConfig(format!(
                    "sample rate changed mid-recording: expected {expected}, got {}",
                    block.sample_rate_hz
                )));
            }
            Some(_) => {}
        }
        self.frames += block.samples_per_channel();
        self.blocks.push(block.samples.clone());
        Ok(())
    }
    pub fn is_empty(&self) -> bool {
        self.frames == 0
    }
    pub fn frames(&self) -> usize {
        self.frames
    }
    pub fn channel_count(&self) -> Option<usize> {
        self.channel_count
    }
    pub fn sample_rate_hz(&self) -> Option<u32> {
        self.sample_rate_hz
    }
    /// Seconds of signal accumulated so far.
    pub fn duration_seconds(&self) -> f64 {
        match self.sample_rate_hz {
            Some(rate) if rate > 0 => self.frames as f64 / rate as f64,
            _ => 0.0,
        }
    }
    /// Discard everything recorded and unpin rate/arity.
    pub fn clear(&mut self) {
        self.blocks.clear();
        self.channel_count = None;
        self.sample_rate_hz = None;
        self.frames = 0;
    }
    /// Serialize the recording: concatenate each channel's payloads,
    /// interleave frames across channels, quantize, and prepend the header.
    pub fn export(&self, sample_rate_hz: u32, channel_count: u16) -> Vec<u8> {
        let merged = self.merge_channels();
        let interleaved = interleave(&merged);
        let data_size = (interleaved.len() * 2) as u32;
        let mut bytes = Vec::with_capacity(44 + interleaved.len() * 2);
        write_header(&mut bytes, sample_rate_hz, channel_count, data_size);
        for &sample in &interleaved {
            bytes.extend_from_slice(&quantize(sample).to_le_bytes());
        }
        bytes
    }
    fn merge_channels(&self) -> Vec<Vec<f32>> {
        let channels = self.channel_count.unwrap_or(0);
        let mut merged: Vec<Vec<f32>> = vec![Vec::with_capacity(self.frames); channels];
        for block in &self.blocks {
            for (channel, payload) in merged.iter_mut().zip(block) {
                channel.extend_from_slice(payload);
            }
        }
        merged
    }
}
impl Default for WavEncoder {
    fn default() -> Self {
        Self::new()
    }
}
/// Frame-interleave `channels x samples` data; a single channel passes
/// through unchanged.
fn interleave(channels: &[Vec<f32>]) -> Vec<f32> {
    match channels {
        [] => Vec::new(),
        [mono] => mono.clone(),
        _ => {
            let frames = channels[0].len();
            let mut out = vec![0.0; frames * channels.len()];
            for (c, channel) in channels.iter().enumerate() {
                for (i, &sample) in channel.iter().enumerate() {
                    out[i * channels.len() + c] = sample;
                }
            }
            out
        }
    }
}
/// Clamp to [-1, 1] and map to i16 with the asymmetric scale factors.
fn quantize(sample: f32) -> i16 {
    let clamped = sample.clamp(-1.0, 1.0);
    if clamped < 0.0 {
        (clamped * 32768.0) as i16
    } else {
        (clamped * 32767.0) as i16
    }
}
fn write_header(bytes: &mut Vec<u8>, sample_rate_hz: u32, channel_count: u16, data_size: u32) {
    let block_align = channel_count as u32 * 2;
    bytes.extend_from_slice(b"RIFF");
    bytes.extend_from_slice(&(36 + data_size).to_le_bytes());
    bytes.extend_from_slice(b"WAVE");
    bytes.extend_from_slice(b"fmt ");
    bytes.extend_from_slice(&16u32.to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes());
    bytes.extend_from_slice(&channel_count.to_le_bytes());
    bytes.extend_from_slice(&sample_rate_hz.to_le_bytes());
    bytes.extend_from_slice(&(sample_rate_hz * block_align).to_le_bytes());
    bytes.extend_from_slice(&(block_align as u16).to_le_bytes());
    bytes.extend_from_slice(&16u16.to_le_bytes());
    bytes.extend_from_slice(b"data");
    bytes.extend_from_slice(&data_size.to_le_bytes());
}
/// Decoded WAV contents, de-interleaved per channel.
#[derive(Clone, Debug)]
pub struct WavDocument {
    pub sample_rate_hz: u32,
    pub channels: Vec<Vec<f32>>,
}
impl WavDocument {
    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }
    pub fn samples_per_channel(&self) -> usize {
        self.channels.first().map(|c| c.len()).unwrap_or(0)
    }
    pub fn duration_seconds(&self) -> f64 {
        self.samples_per_channel() as f64 / self.sample_rate_hz as f64
    }
    /// Parse and validate a PCM16 WAV byte stream.
    pub fn decode(bytes: &[u8]) -> Result<Self, SignalError> {
        if bytes.len() < 44 {
            return Err(SignalError::MalformedContainer(format!(
                "{} bytes is shorter than the 44-byte header",
                bytes.len()
            )));
        }
        if &bytes[0..4] != b"RIFF" {
            return Err(SignalError::MalformedContainer(
                "missing RIFF magic".into(),
            ));
        }
        if &bytes[8..12] != b"WAVE" {
            return Err(SignalError::MalformedContainer(
                "missing WAVE magic".into(),
            ));
        }
        let format = read_u16(bytes, 20);
        if format != 1 {
            return Err(SignalError::MalformedContainer(format!(
                "audio format {format} is not pcm"
            )));
        }
        let bits = read_u16(bytes, 34);
        if bits != 16 {
            return Err(SignalError::MalformedContainer(format!(
                "expected 16 bits per sample, got {bits}"
            )));
        }
        let channel_count = read_u16(bytes, 22) as usize;
        if channel_count == 0 {
            return Err(SignalError::MalformedContainer(
                "channel count is zero".into(),
            ));
        }
        let sample_rate_hz = read_u32(bytes, 24);
        if sample_rate_hz == 0 {
            return Err(SignalError::MalformedContainer(
                "sample rate is zero".into(),
            ));
        }
        let data_size = read_u32(bytes, 40) as usize;
        if 44 + data_size > bytes.len() {
            return Err(SignalError::MalformedContainer(format!(
                "declared {data_size} data bytes but only {} present",
                bytes.len() - 44
            )));
        }
        let frames = data_size / 2 / channel_count;
        let mut channels = vec![Vec::with_capacity(frames); channel_count];
        for i in 0..frames {
            for (c, channel) in channels.iter_mut().enumerate() {
                let offset = 44 + (i * channel_count + c) * 2;
                let raw = i16::from_le_bytes([bytes[offset], bytes[offset + 1]]);
                channel.push(raw as f32 / 32768.0);
            }
        }
        Ok(Self {
            sample_rate_hz,
            channels,
        })
    }
}
fn read_u16(bytes: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}
fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}
#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::make_block;
    fn mono_block(samples: Vec<f32>, rate: u32) -> SampleBlock {
        make_block(0.0, rate, vec![samples], vec!["ch1".into()])
    }
    #[test]
    fn header_layout_is_byte_exact() {
        let mut encoder = WavEncoder::new();
        encoder
            .record(&mono_block(vec![0.0, 0.0, 0.0, 0.0], 44_100))
            .unwrap();
        let bytes = encoder.export(44_100, 1);
        assert_eq!(bytes.len(), 44 + 8);
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(read_u32(&bytes, 4), 36 + 8);
        assert_eq!(&bytes[8..12], b"WAVE");
        assert_eq!(&bytes[12..16], b"fmt ");
        assert_eq!(read_u32(&bytes, 16), 16);
        assert_eq!(read_u16(&bytes, 20), 1);
        assert_eq!(read_u16(&bytes, 22), 1);
        assert_eq!(read_u32(&bytes, 24), 44_100);
        assert_eq!(read_u32(&bytes, 28), 88_200);
        assert_eq!(read_u16(&bytes, 32), 2);
        assert_eq!(read_u16(&bytes, 34), 16);
        assert_eq!(&bytes[36..40], b"data");
        assert_eq!(read_u32(&bytes, 40), 8);
    }
    #[test]
    fn quantization_is_asymmetric_at_full_scale() {
        assert_eq!(quantize(1.0), 32767);
        assert_eq!(quantize(-1.0), -32768);
        assert_eq!(quantize(0.0), 0);
        // Out-of-range input clamps before scaling.
        assert_eq!(quantize(2.0), 32767);
        assert_eq!(quantize(-3.0), -32768);
    }
    #[test]
    fn roundtrip_stays_within_quantization_step() {
        let original = vec![0.5_f32, -0.25, 0.123, -0.8, 0.25, 0.001, -0.001];
        let mut encoder = WavEncoder::new();
        encoder.record(&mono_block(original.clone(), 10_000)).unwrap();
        let doc = WavDocument::decode(&encoder.export(10_000, 1)).unwrap();
        assert_eq!(doc.sample_rate_hz, 10_000);
        assert_eq!(doc.num_channels(), 1);
        for (decoded, expected) in doc.channels[0].iter().zip(&original) {
            assert!(
                (decoded - expected).abs() <= 3.2e-5,
                "decoded {decoded} vs {expected}"
            );
        }
    }
    #[test]
    fn roundtrip_full_scale_edges() {
        let mut encoder = WavEncoder::new();
        encoder.record(&mono_block(vec![1.0, -1.0], 8_000)).unwrap();
        let doc = WavDocument::decode(&encoder.export(8_000, 1)).unwrap();
        // +1.0 comes back just under full scale; -1.0 comes back exact.
        assert!((doc.channels[0][0] - 0.99997).abs() < 1e-5);
        assert_eq!(doc.channels[0][1], -1.0);
    }
    #[test]
    fn stereo_interleave_preserves_channel_identity() {
        let block = make_block(
            0.0,
            4_000,
            vec![vec![0.5, 0.5, 0.5], vec![-0.5, -0.5, -0.5]],
            vec!["left".into(), "right".into()],
        );
        let mut encoder = WavEncoder::new();
        encoder.record(&block).unwrap();
        let doc = WavDocument::decode(&encoder.export(4_000, 2)).unwrap();
        assert_eq!(doc.num_channels(), 2);
        assert_eq!(doc.samples_per_channel(), 3);
        assert!(doc.channels[0].iter().all(|&s| s > 0.49));
        assert!(doc.channels[1].iter().all(|&s| s < -0.49));
    }
    #[test]
    fn record_pins_arity_and_rate() {
        let mut encoder = WavEncoder::new();
        encoder.record(&mono_block(vec![0.0; 8], 1_000)).unwrap();
        let stereo = make_block(
            0.0,
            1_000,
            vec![vec![0.0; 8], vec![0.0; 8]],
            vec!["a".into(), "b".into()],
        );
        assert!(matches!(
            encoder.record(&stereo),
            Err(SignalError::InvalidConfig(_))
        ));
        assert!(matches!(
            encoder.record(&mono_block(vec![0.0; 8], 2_000)),
            Err(SignalError::InvalidConfig(_))
        ));
        // The failed records must not have grown the recording.
        assert_eq!(encoder.frames(), 8);
    }
    #[test]
    fn record_rejects_ragged_and_empty_blocks() {
        let mut encoder = WavEncoder::new();
        let ragged = make_block(
            0.0,
            1_000,
            vec![vec![0.0; 4], vec![0.0; 3]],
            vec!["a".into(), "b".into()],
        );
        assert!(encoder.record(&ragged).is_err());
        let no_channels = make_block(0.0, 1_000, vec![], vec![]);
        assert!(encoder.record(&no_channels).is_err());
    }
    #[test]
    fn duration_accumulates_across_blocks() {
        let mut encoder = WavEncoder::new();
        encoder.record(&mono_block(vec![0.0; 100], 1_000)).unwrap();
        encoder.record(&mono_block(vec![0.0; 100], 1_000)).unwrap();
        assert!((encoder.duration_seconds() - 0.2).abs() < 1e-12);
        encoder.clear();
        assert!(encoder.is_empty());
        assert_eq!(encoder.duration_seconds(), 0.0);
        // After a clear the next recording re-pins arity.
        let stereo = make_block(
            0.0,
            500,
            vec![vec![0.0], vec![0.0]],
            vec!["a".into(), "b".into()],
        );
        assert!(encoder.record(&stereo).is_ok());
    }
    #[test]
    fn decode_rejects_malformed_input() {
        let mut encoder = WavEncoder::new();
        encoder.record(&mono_block(vec![0.1, 0.2], 1_000)).unwrap();
        let good = encoder.export(1_000, 1);
        assert!(WavDocument::decode(&good[..20]).is_err());
        let mut bad_riff = good.clone();
        bad_riff[0] = b'X';
        assert!(WavDocument::decode(&bad_riff).is_err());
        let mut bad_wave = good.clone();
        bad_wave[8] = b'X';
        assert!(WavDocument::decode(&bad_wave).is_err());
        let mut not_pcm = good.clone();
        not_pcm[20] = 3;
        assert!(WavDocument::decode(&not_pcm).is_err());
        let mut wrong_depth = good.clone();
        wrong_depth[34] = 24;
        assert!(WavDocument::decode(&wrong_depth).is_err());
        let mut no_channels = good.clone();
        no_channels[22] = 0;
        assert!(WavDocument::decode(&no_channels).is_err());
        let mut truncated = good.clone();
        truncated.truncate(45);
        assert!(matches!(
            WavDocument::decode(&truncated),
            Err(SignalError::MalformedContainer(_))
        ));
    }
}
