// Core signal path: block ingestion, ring-buffered history, spike
// detection, and the WAV container codec.
pub mod buffer;
pub mod detector;
pub mod error;
pub mod pipeline;
pub mod source;
pub mod wav;
// Re-export the working set so callers can stay off the submodule paths.
pub use buffer::{rms, WaveformBuffer};
pub use detector::{
    filter_spikes, firing_rate, inter_spike_intervals, Spike, SpikeDetector,
    DEFAULT_AVERAGE_COUNT, DEFAULT_THRESHOLD, REFRACTORY_SECONDS, WAVEFORM_SAMPLES,
};
pub use error::SignalError;
pub use pipeline::{
    ChannelView, EventMarker, PipelineView, RecordingArtifact, SignalPipeline,
};
pub use source::{make_block, ManualSource, SampleBlock, SampleSource};
pub use wav::{WavDocument, WavEncoder};
