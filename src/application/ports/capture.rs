//! Capture engine port interface

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::recording::{AudioFormat, RecordingConfiguration};

/// Capture backend errors
#[derive(Debug, Clone, Error)]
pub enum CaptureError {
    #[error("Capture engine not initialized")]
    NotInitialized,

    #[error("Capture engine has been disposed")]
    Disposed,

    #[error("No audio input device available")]
    NoAudioDevice,

    #[error("Microphone permission not granted")]
    PermissionDenied,

    #[error("Format {0} is not supported by this capture engine")]
    UnsupportedFormat(AudioFormat),

    #[error("Capture already in progress")]
    AlreadyCapturing,

    #[error("No capture in progress")]
    NotCapturing,

    #[error("Failed to start capture: {0}")]
    StartFailed(String),

    #[error("Capture failed: {0}")]
    CaptureFailed(String),

    #[error("Failed to write recording: {0}")]
    WriteFailed(String),
}

/// Native audio capture backend.
///
/// One implementation exists per platform family and is chosen once when the
/// session controller is built. Contract shared by every implementation:
/// - `dispose` is idempotent
/// - `stop` returns `None` when no capture was active
/// - `amplitude` returns 0.0 instead of failing when not capturing
/// - `health` reports a failure that happened inside a live capture (device
///   lost, write error) until the next `start_capture`
#[async_trait]
pub trait CaptureEngine: Send + Sync {
    /// Acquire backend resources. Safe to call more than once.
    async fn initialize(&self) -> Result<(), CaptureError>;

    /// Release all backend resources.
    async fn dispose(&self) -> Result<(), CaptureError>;

    /// Begin capturing into `path` using `configuration`.
    async fn start_capture(
        &self,
        path: &Path,
        configuration: &RecordingConfiguration,
    ) -> Result<(), CaptureError>;

    async fn pause(&self) -> Result<(), CaptureError>;

    async fn resume(&self) -> Result<(), CaptureError>;

    /// Finalize the output file and return where it was written.
    async fn stop(&self) -> Result<Option<PathBuf>, CaptureError>;

    /// Abort capture without finalizing output.
    async fn cancel(&self) -> Result<(), CaptureError>;

    fn is_capturing(&self) -> bool;

    /// `Err` once the running capture has failed underneath the caller.
    async fn health(&self) -> Result<(), CaptureError>;

    /// Latest normalized input level in [0, 1]
    async fn amplitude(&self) -> Result<f32, CaptureError>;

    async fn has_permission(&self) -> Result<bool, CaptureError>;

    async fn request_permission(&self) -> Result<bool, CaptureError>;

    fn supported_formats(&self) -> Vec<AudioFormat>;
}

#[async_trait]
impl CaptureEngine for Box<dyn CaptureEngine> {
    async fn initialize(&self) -> Result<(), CaptureError> {
        self.as_ref().initialize().await
    }

    async fn dispose(&self) -> Result<(), CaptureError> {
        self.as_ref().dispose().await
    }

    async fn start_capture(
        &self,
        path: &Path,
        configuration: &RecordingConfiguration,
    ) -> Result<(), CaptureError> {
        self.as_ref().start_capture(path, configuration).await
    }

    async fn pause(&self) -> Result<(), CaptureError> {
        self.as_ref().pause().await
    }

    async fn resume(&self) -> Result<(), CaptureError> {
        self.as_ref().resume().await
    }

    async fn stop(&self) -> Result<Option<PathBuf>, CaptureError> {
        self.as_ref().stop().await
    }

    async fn cancel(&self) -> Result<(), CaptureError> {
        self.as_ref().cancel().await
    }

    fn is_capturing(&self) -> bool {
        self.as_ref().is_capturing()
    }

    async fn health(&self) -> Result<(), CaptureError> {
        self.as_ref().health().await
    }

    async fn amplitude(&self) -> Result<f32, CaptureError> {
        self.as_ref().amplitude().await
    }

    async fn has_permission(&self) -> Result<bool, CaptureError> {
        self.as_ref().has_permission().await
    }

    async fn request_permission(&self) -> Result<bool, CaptureError> {
        self.as_ref().request_permission().await
    }

    fn supported_formats(&self) -> Vec<AudioFormat> {
        self.as_ref().supported_formats()
    }
}
