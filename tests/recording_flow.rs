//! End-to-end flow over the public API: a live session streamed from a
//! source, recorded to WAV, decoded back, and analyzed offline.

use spikescope::analysis::{analyze, AnalysisOptions};
use spikescope::signal::{
    filter_spikes, make_block, ManualSource, RecordingArtifact, SampleBlock, SampleSource,
    SignalPipeline, Spike, WavDocument,
};

const RATE_HZ: u32 = 1_000;
const BLOCK_LEN: usize = 500;
const SESSION_START: f64 = 10.0;

/// Two channels over four blocks. "left" carries impulses at stream times
/// 10.3, 10.8 and 11.3; "right" carries one at 10.9.
fn session_blocks() -> Vec<SampleBlock> {
    let mut left = vec![0.0_f32; 4 * BLOCK_LEN];
    let mut right = vec![0.0_f32; 4 * BLOCK_LEN];
    for index in [300, 800, 1300] {
        left[index] = 0.9;
    }
    right[900] = 0.9;

    (0..4)
        .map(|b| {
            let range = b * BLOCK_LEN..(b + 1) * BLOCK_LEN;
            make_block(
                SESSION_START + (b * BLOCK_LEN) as f64 / RATE_HZ as f64,
                RATE_HZ,
                vec![left[range.clone()].to_vec(), right[range].to_vec()],
                vec!["left".into(), "right".into()],
            )
        })
        .collect()
}

fn run_session() -> (Vec<Spike>, RecordingArtifact) {
    let mut source = ManualSource::new(session_blocks());
    let mut pipeline = SignalPipeline::with_history_seconds(5.0).unwrap();
    pipeline.set_detection_enabled(true);
    pipeline.start_recording(SESSION_START);

    let mut delivered = 0;
    while let Some(block) = source.next_block().unwrap() {
        pipeline.deliver(&block).unwrap();
        delivered += 1;
        if delivered == 2 {
            pipeline.add_marker(10.75, "space");
        }
    }
    pipeline.add_marker(11.6, "enter");

    let spikes = pipeline.drain_spikes();
    assert!(pipeline.spikes().is_empty());
    let artifact = pipeline.stop_recording().expect("captured session");
    (spikes, artifact)
}

#[test]
fn live_session_detects_and_records() {
    let (spikes, artifact) = run_session();

    let expected = [
        ("left", 10.3),
        ("left", 10.8),
        ("right", 10.9),
        ("left", 11.3),
    ];
    assert_eq!(spikes.len(), expected.len());
    for (spike, (channel, timestamp)) in spikes.iter().zip(expected) {
        assert_eq!(spike.channel, channel);
        assert!((spike.timestamp - timestamp).abs() < 1e-9);
        assert!((spike.amplitude - 0.9).abs() < 1e-6);
    }

    let middle = filter_spikes(&spikes, 10.5, 11.0);
    assert_eq!(middle.len(), 2);
    assert_eq!(middle[0].channel, "left");
    assert_eq!(middle[1].channel, "right");

    assert!((artifact.duration_seconds - 2.0).abs() < 1e-9);

    // 2000 stereo PCM16 frames behind the 44-byte header.
    assert_eq!(artifact.wav_bytes.len(), 44 + 2_000 * 2 * 2);
    assert_eq!(&artifact.wav_bytes[..4], b"RIFF");
    assert_eq!(&artifact.wav_bytes[8..12], b"WAVE");

    let markers = artifact.markers_text.expect("markers");
    let parsed: Vec<(f64, &str)> = markers
        .lines()
        .map(|line| {
            let (time, key) = line.split_once('\t').unwrap();
            (time.parse().unwrap(), key)
        })
        .collect();
    assert_eq!(parsed.len(), 2);
    assert!((parsed[0].0 - 0.75).abs() < 1e-9);
    assert_eq!(parsed[0].1, "space");
    assert!((parsed[1].0 - 1.6).abs() < 1e-9);
    assert_eq!(parsed[1].1, "enter");
}

#[test]
fn offline_pass_matches_the_live_session() {
    let (live_spikes, artifact) = run_session();

    let document = WavDocument::decode(&artifact.wav_bytes).unwrap();
    assert_eq!(document.sample_rate_hz, RATE_HZ);
    assert_eq!(document.num_channels(), 2);
    assert_eq!(document.samples_per_channel(), 2_000);
    assert_eq!(document.channels[0][0], 0.0);
    assert!((document.channels[0][300] - 0.9).abs() < 1e-4);
    assert!((document.channels[1][900] - 0.9).abs() < 1e-4);

    let options = AnalysisOptions {
        include_spikes: true,
        ..AnalysisOptions::default()
    };
    let report = analyze(&document, &options).unwrap();
    assert_eq!(report.channel_count, 2);
    assert!((report.duration_seconds - 2.0).abs() < 1e-9);

    // Channel labels reset to file order offline; the session labels are
    // not part of the container.
    assert_eq!(report.channels[0].channel, "ch1");
    assert_eq!(report.channels[0].spike_count, 3);
    assert_eq!(report.channels[1].spike_count, 1);
    assert!((report.channels[0].mean_isi_seconds.unwrap() - 0.5).abs() < 1e-9);
    assert!(!report.channels[0].firing_rate_hz.is_empty());

    // Offline timestamps count from the start of the file, live ones from
    // the stream clock.
    let offline = report.channels[0].spikes.as_ref().unwrap();
    let live_left: Vec<&Spike> = live_spikes.iter().filter(|s| s.channel == "left").collect();
    assert_eq!(offline.len(), live_left.len());
    for (offline_spike, live_spike) in offline.iter().zip(live_left) {
        assert!((offline_spike.timestamp - (live_spike.timestamp - SESSION_START)).abs() < 1e-9);
    }
}
