//! Microphone capture through the system's default input device.
//!
//! cpal streams are not `Send`, so the stream lives on its own thread for
//! its whole life. The device callback forwards interleaved chunks over a
//! channel; `next_block` drains them and splits frames per channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, StreamConfig};
use log::{error, info};

use crate::signal::{make_block, SampleBlock, SampleSource, SignalError};

pub struct MicrophoneSource {
    chunks: Receiver<Vec<f32>>,
    labels: Vec<String>,
    channel_count: usize,
    sample_rate_hz: u32,
    emitted_frames: u64,
    stop: Arc<AtomicBool>,
}

impl MicrophoneSource {
    /// Open the default input device and start capturing.
    pub fn open() -> Result<Self, SignalError> {
        let (tx_chunks, rx_chunks) = mpsc::channel();
        let (tx_ready, rx_ready) = mpsc::channel();
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);
        thread::spawn(move || hold_stream(tx_chunks, tx_ready, thread_stop));

        let (channel_count, sample_rate_hz) = rx_ready
            .recv()
            .map_err(|_| SignalError::SourceUnavailable("capture thread died".into()))?
            .map_err(SignalError::SourceUnavailable)?;
        info!("microphone capturing {channel_count} channel(s) at {sample_rate_hz} Hz");
        Ok(Self {
            chunks: rx_chunks,
            labels: (1..=channel_count).map(|i| format!("mic_ch{i}")).collect(),
            channel_count,
            sample_rate_hz,
            emitted_frames: 0,
            stop,
        })
    }

    pub fn sample_rate_hz(&self) -> u32 {
        self.sample_rate_hz
    }
}

impl SampleSource for MicrophoneSource {
    fn next_block(&mut self) -> Result<Option<SampleBlock>, SignalError> {
        let mut interleaved: Vec<f32> = Vec::new();
        loop {
            match self.chunks.try_recv() {
                Ok(chunk) => interleaved.extend_from_slice(&chunk),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if interleaved.is_empty() {
                        return Err(SignalError::SourceUnavailable(
                            "input stream ended".into(),
                        ));
                    }
                    break;
                }
            }
        }
        if interleaved.is_empty() {
            return Ok(None);
        }
        let channels = split_frames(&interleaved, self.channel_count);
        let frames = channels.first().map(|c| c.len()).unwrap_or(0);
        if frames == 0 {
            return Ok(None);
        }
        let timestamp = self.emitted_frames as f64 / self.sample_rate_hz as f64;
        self.emitted_frames += frames as u64;
        Ok(Some(make_block(
            timestamp,
            self.sample_rate_hz,
            channels,
            self.labels.clone(),
        )))
    }
}

impl Drop for MicrophoneSource {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

/// Runs on the capture thread: build the stream, report readiness, then keep
/// the stream alive until asked to stop.
fn hold_stream(
    tx_chunks: Sender<Vec<f32>>,
    tx_ready: Sender<Result<(usize, u32), String>>,
    stop: Arc<AtomicBool>,
) {
    let stream = match build_input_stream(tx_chunks) {
        Ok((stream, channel_count, sample_rate_hz)) => {
            tx_ready.send(Ok((channel_count, sample_rate_hz))).ok();
            stream
        }
        Err(e) => {
            tx_ready.send(Err(e)).ok();
            return;
        }
    };
    while !stop.load(Ordering::Relaxed) {
        thread::sleep(Duration::from_millis(50));
    }
    drop(stream);
}

fn build_input_stream(
    tx_chunks: Sender<Vec<f32>>,
) -> Result<(cpal::Stream, usize, u32), String> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| "no input device available".to_string())?;
    let supported = device.default_input_config().map_err(|e| e.to_string())?;
    let sample_format = supported.sample_format();
    let config: StreamConfig = supported.into();
    let channel_count = config.channels as usize;
    let sample_rate_hz = config.sample_rate.0;
    if channel_count == 0 || sample_rate_hz == 0 {
        return Err("input device reports no channels or a zero sample rate".to_string());
    }

    let err_fn = |err| error!("input stream error: {err}");
    let stream = match sample_format {
        SampleFormat::F32 => {
            let tx = tx_chunks;
            device.build_input_stream(
                &config,
                move |data: &[f32], _| {
                    tx.send(data.to_vec()).ok();
                },
                err_fn,
                None,
            )
        }
        SampleFormat::I16 => {
            let tx = tx_chunks;
            device.build_input_stream(
                &config,
                move |data: &[i16], _| {
                    tx.send(data.iter().map(|&s| convert_i16(s)).collect()).ok();
                },
                err_fn,
                None,
            )
        }
        SampleFormat::U16 => {
            let tx = tx_chunks;
            device.build_input_stream(
                &config,
                move |data: &[u16], _| {
                    tx.send(data.iter().map(|&s| convert_u16(s)).collect()).ok();
                },
                err_fn,
                None,
            )
        }
        other => return Err(format!("unsupported sample format: {other:?}")),
    }
    .map_err(|e| e.to_string())?;
    stream.play().map_err(|e| e.to_string())?;
    Ok((stream, channel_count, sample_rate_hz))
}

fn convert_i16(sample: i16) -> f32 {
    sample as f32 / i16::MAX as f32
}

fn convert_u16(sample: u16) -> f32 {
    (sample as f32 / u16::MAX as f32) * 2.0 - 1.0
}

/// Split interleaved frames into per-channel vectors. A trailing partial
/// frame is dropped; device callbacks always deliver whole frames.
fn split_frames(interleaved: &[f32], channel_count: usize) -> Vec<Vec<f32>> {
    let frames = interleaved.len() / channel_count;
    let mut channels = vec![Vec::with_capacity(frames); channel_count];
    for frame in interleaved.chunks_exact(channel_count) {
        for (channel, &sample) in channels.iter_mut().zip(frame) {
            channel.push(sample);
        }
    }
    channels
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interleaved_frames_split_per_channel() {
        let channels = split_frames(&[0.1, 0.2, 0.3, 0.4, 0.5, 0.6], 2);
        assert_eq!(channels, vec![vec![0.1, 0.3, 0.5], vec![0.2, 0.4, 0.6]]);
    }

    #[test]
    fn trailing_partial_frame_is_dropped() {
        let channels = split_frames(&[0.1, 0.2, 0.3], 2);
        assert_eq!(channels, vec![vec![0.1], vec![0.2]]);
    }

    #[test]
    fn mono_splitting_is_identity() {
        let channels = split_frames(&[0.1, 0.2, 0.3], 1);
        assert_eq!(channels, vec![vec![0.1, 0.2, 0.3]]);
    }

    #[test]
    fn integer_samples_normalize_to_unit_range() {
        assert_eq!(convert_i16(i16::MAX), 1.0);
        assert!((convert_i16(i16::MIN) + 1.0).abs() < 1e-4);
        assert_eq!(convert_i16(0), 0.0);
        assert_eq!(convert_u16(u16::MAX), 1.0);
        assert_eq!(convert_u16(0), -1.0);
    }
}
