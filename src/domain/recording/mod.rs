//! Recording domain: session entity, configuration and timing

pub mod configuration;
pub mod duration;
pub mod session;
pub mod waveform;

pub use configuration::{AudioFormat, QualityTier, RecordingConfiguration};
pub use duration::{format_clock, Duration};
pub use session::{RecordingSession, RecordingState, StopReason};
pub use waveform::{normalize_amplitude, WaveformBuffer, DEFAULT_WAVEFORM_CAPACITY};
