//! Capture engine adapters
//!
//! Desktop builds capture through cpal, stream WAV to disk with hound and
//! transcode to FLAC (flacenc) on stop. Mobile and web builds delegate to a recorder the
//! host shell provides.

mod bridged;
mod cpal_engine;
mod flac_encoder;
mod wav_writer;

pub use bridged::{BridgeProfile, BridgedCaptureEngine, LevelReading, NativeRecorder};
pub use cpal_engine::CpalCaptureEngine;
pub use flac_encoder::{encode_to_flac, transcode_wav_to_flac, EncodingError, PcmLayout};
pub use wav_writer::{quantize, WavSink};

use crate::application::ports::CaptureEngine;

/// Create the capture engine for the desktop build
pub fn create_capture_engine() -> Box<dyn CaptureEngine> {
    Box::new(CpalCaptureEngine::new())
}

/// Create a capture engine over a host-provided recorder
pub fn create_bridged_engine<R>(recorder: R, profile: BridgeProfile) -> Box<dyn CaptureEngine>
where
    R: NativeRecorder + 'static,
{
    Box::new(BridgedCaptureEngine::new(recorder, profile))
}
