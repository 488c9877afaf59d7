// src/lib.rs

pub mod analysis;
pub mod capture;
pub mod engine;
pub mod signal;
pub mod types;

pub use analysis::{analyze, AnalysisOptions, AnalysisReport};
pub use engine::spawn_engine;
pub use signal::{SignalError, SignalPipeline, Spike, SpikeDetector};
pub use types::{EngineCommand, EngineConfig, EngineEvent};
