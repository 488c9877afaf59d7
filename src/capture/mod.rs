// Capture edges. Everything here produces `SampleBlock`s through the
// `SampleSource` trait so the engine never knows where samples come from.
pub mod microphone;
pub mod serial;
pub mod synth;

pub use microphone::MicrophoneSource;
pub use serial::{list_ports, SerialSource, DEFAULT_BAUD_RATE};
pub use synth::SynthSource;
