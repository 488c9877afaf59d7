//! Serial acquisition source.
//!
//! The board streams newline-terminated ASCII frames of comma-separated
//! readings, one value per channel, in the raw range [0, 1023]. Readings
//! normalize to [-1, 1] as `value / 512 - 1`. A fixed 10 kHz converter is
//! multiplexed across channels, so the per-channel rate is
//! `floor(10000 / channel_count)`.

use std::io::{Read, Write};
use std::mem;
use std::time::Duration;

use log::{debug, info};
use serialport::SerialPort;

use crate::signal::{make_block, SampleBlock, SampleSource, SignalError};

pub const DEFAULT_BAUD_RATE: u32 = 230_400;
const MULTIPLEXED_RATE_HZ: u32 = 10_000;
/// Complete frames staged before a block is handed out.
const FRAMES_PER_BLOCK: usize = 256;
const READ_TIMEOUT: Duration = Duration::from_millis(10);

pub struct SerialSource {
    port: Box<dyn SerialPort>,
    labels: Vec<String>,
    sample_rate_hz: u32,
    frames: FrameAccumulator,
    emitted_frames: u64,
}

impl SerialSource {
    pub fn open(path: &str, baud_rate: u32, channel_count: usize) -> Result<Self, SignalError> {
        if channel_count == 0 {
            return Err(SignalError::InvalidConfig(
                "channel count must be greater than zero".into(),
            ));
        }
        let sample_rate_hz = MULTIPLEXED_RATE_HZ / channel_count as u32;
        if sample_rate_hz == 0 {
            return Err(SignalError::InvalidConfig(format!(
                "{channel_count} channels leave no per-channel bandwidth"
            )));
        }
        let port = serialport::new(path, baud_rate)
            .timeout(READ_TIMEOUT)
            .open()
            .map_err(|e| SignalError::SourceUnavailable(format!("{path}: {e}")))?;
        info!("serial source open on {path} at {baud_rate} baud, {channel_count} channel(s)");
        Ok(Self {
            port,
            labels: (1..=channel_count)
                .map(|i| format!("serial_ch{i}"))
                .collect(),
            sample_rate_hz,
            frames: FrameAccumulator::new(channel_count),
            emitted_frames: 0,
        })
    }

    pub fn sample_rate_hz(&self) -> u32 {
        self.sample_rate_hz
    }

    /// Send a device command, newline terminated.
    pub fn send_command(&mut self, command: &str) -> Result<(), SignalError> {
        self.port.write_all(&frame_command(command))?;
        Ok(())
    }
}

impl SampleSource for SerialSource {
    fn next_block(&mut self) -> Result<Option<SampleBlock>, SignalError> {
        let mut buf = [0_u8; 1024];
        match self.port.read(&mut buf) {
            Ok(0) => {}
            Ok(n) => self.frames.ingest(&buf[..n]),
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {}
            Err(e) => return Err(SignalError::Io(e)),
        }
        let Some(channels) = self.frames.take_block(FRAMES_PER_BLOCK) else {
            return Ok(None);
        };
        let timestamp = self.emitted_frames as f64 / self.sample_rate_hz as f64;
        self.emitted_frames += FRAMES_PER_BLOCK as u64;
        Ok(Some(make_block(
            timestamp,
            self.sample_rate_hz,
            channels,
            self.labels.clone(),
        )))
    }
}

/// Enumerate serial ports visible to the OS.
pub fn list_ports() -> Result<Vec<String>, SignalError> {
    let ports = serialport::available_ports()
        .map_err(|e| SignalError::SourceUnavailable(e.to_string()))?;
    Ok(ports.into_iter().map(|p| p.port_name).collect())
}

fn frame_command(command: &str) -> Vec<u8> {
    let mut framed = command.as_bytes().to_vec();
    framed.push(b'\n');
    framed
}

/// Reassembles newline-split frames from arbitrary read chunks and stages
/// parsed readings per channel.
struct FrameAccumulator {
    channel_count: usize,
    pending: Vec<u8>,
    staged: Vec<Vec<f32>>,
}

impl FrameAccumulator {
    fn new(channel_count: usize) -> Self {
        Self {
            channel_count,
            pending: Vec::new(),
            staged: vec![Vec::new(); channel_count],
        }
    }

    fn ingest(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            if byte != b'\n' {
                self.pending.push(byte);
                continue;
            }
            let line = mem::take(&mut self.pending);
            match parse_frame(&line, self.channel_count) {
                Some(readings) => {
                    for (staged, reading) in self.staged.iter_mut().zip(readings) {
                        staged.push(reading);
                    }
                }
                None => {
                    if !line.iter().all(u8::is_ascii_whitespace) {
                        debug!(
                            "skipping malformed serial frame: {:?}",
                            String::from_utf8_lossy(&line)
                        );
                    }
                }
            }
        }
    }

    fn staged_frames(&self) -> usize {
        self.staged.first().map(|c| c.len()).unwrap_or(0)
    }

    /// Hand out the oldest `frames` staged readings per channel, or `None`
    /// until that many complete frames have arrived.
    fn take_block(&mut self, frames: usize) -> Option<Vec<Vec<f32>>> {
        if self.staged_frames() < frames {
            return None;
        }
        Some(
            self.staged
                .iter_mut()
                .map(|staged| staged.drain(..frames).collect())
                .collect(),
        )
    }
}

/// Parse one CSV frame into normalized readings.
///
/// Frames with the wrong arity or any unparsable reading are dropped whole;
/// a board glitch should never shift channels against each other.
fn parse_frame(line: &[u8], channel_count: usize) -> Option<Vec<f32>> {
    let text = std::str::from_utf8(line).ok()?;
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    let mut readings = Vec::with_capacity(channel_count);
    for field in text.split(',') {
        let raw: f32 = field.trim().parse().ok()?;
        if !raw.is_finite() {
            return None;
        }
        readings.push(raw / 512.0 - 1.0);
    }
    (readings.len() == channel_count).then_some(readings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readings_normalize_around_midscale() {
        let frame = parse_frame(b"0,512,1023", 3).unwrap();
        assert_eq!(frame[0], -1.0);
        assert_eq!(frame[1], 0.0);
        assert!((frame[2] - 0.998_046_9).abs() < 1e-6);
    }

    #[test]
    fn frames_with_wrong_arity_are_dropped() {
        assert!(parse_frame(b"1,2", 3).is_none());
        assert!(parse_frame(b"1,2,3,4", 3).is_none());
    }

    #[test]
    fn frames_with_garbage_readings_are_dropped() {
        assert!(parse_frame(b"12,oops", 2).is_none());
        assert!(parse_frame(b"", 1).is_none());
        assert!(parse_frame(b"NaN", 1).is_none());
    }

    #[test]
    fn whitespace_around_readings_is_tolerated() {
        let frame = parse_frame(b" 256 , 768 \r", 2).unwrap();
        assert_eq!(frame, vec![-0.5, 0.5]);
    }

    #[test]
    fn accumulator_survives_frames_split_across_reads() {
        let mut acc = FrameAccumulator::new(2);
        acc.ingest(b"100,2");
        assert_eq!(acc.staged_frames(), 0);
        acc.ingest(b"00\n300,400\n");
        assert_eq!(acc.staged_frames(), 2);

        let block = acc.take_block(2).unwrap();
        assert_eq!(block.len(), 2);
        assert!((block[0][0] - (100.0 / 512.0 - 1.0)).abs() < 1e-6);
        assert!((block[1][0] - (200.0 / 512.0 - 1.0)).abs() < 1e-6);
        assert!((block[0][1] - (300.0 / 512.0 - 1.0)).abs() < 1e-6);
        assert!((block[1][1] - (400.0 / 512.0 - 1.0)).abs() < 1e-6);
    }

    #[test]
    fn malformed_lines_do_not_shift_channels() {
        let mut acc = FrameAccumulator::new(2);
        acc.ingest(b"1,2\ngarbage\n\r\n3,4\n");
        assert_eq!(acc.staged_frames(), 2);
        let block = acc.take_block(2).unwrap();
        assert!((block[0][1] - (3.0 / 512.0 - 1.0)).abs() < 1e-6);
    }

    #[test]
    fn take_block_waits_for_enough_frames() {
        let mut acc = FrameAccumulator::new(1);
        acc.ingest(b"1\n2\n3\n");
        assert!(acc.take_block(4).is_none());
        let block = acc.take_block(2).unwrap();
        assert_eq!(block[0].len(), 2);
        assert_eq!(acc.staged_frames(), 1);
    }

    #[test]
    fn commands_are_newline_terminated() {
        assert_eq!(frame_command("conf c:4"), b"conf c:4\n");
    }
}
