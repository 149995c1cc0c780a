//! Capture engine backed by a recorder the host application provides
//!
//! On mobile and in the browser the audio stack belongs to the app shell
//! (platform recorder API, MediaRecorder). The shell implements
//! [`NativeRecorder`]; [`BridgedCaptureEngine`] layers the engine contract,
//! format gating, permission policy and level normalization on top.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tracing::{debug, info};

use crate::application::ports::{CaptureEngine, CaptureError};
use crate::domain::recording::{normalize_amplitude, AudioFormat, RecordingConfiguration};

/// Quietest level shown on the waveform; anything below reads as silence
const DBFS_FLOOR: f32 = -60.0;

/// Input level as reported by the host recorder
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LevelReading {
    /// dBFS, 0.0 is full scale (mobile recorders)
    Decibels(f32),
    /// Already linear in [0, 1] (analyser-node style)
    Linear(f32),
}

impl LevelReading {
    pub fn normalized(self) -> f32 {
        match self {
            Self::Decibels(db) if db.is_finite() => {
                normalize_amplitude((db - DBFS_FLOOR) / -DBFS_FLOOR)
            }
            Self::Decibels(_) => 0.0,
            Self::Linear(level) => normalize_amplitude(level),
        }
    }
}

/// Host-side recorder primitive
#[async_trait]
pub trait NativeRecorder: Send + Sync {
    /// Begin writing to `path` with the given configuration.
    async fn start(
        &self,
        path: &Path,
        configuration: &RecordingConfiguration,
    ) -> Result<(), CaptureError>;

    async fn pause(&self) -> Result<(), CaptureError>;

    async fn resume(&self) -> Result<(), CaptureError>;

    /// Finalize and return the written file.
    async fn finish(&self) -> Result<Option<PathBuf>, CaptureError>;

    /// Abort without finalizing.
    async fn abort(&self) -> Result<(), CaptureError>;

    async fn level(&self) -> Result<LevelReading, CaptureError>;

    /// Error the recorder hit on its own while running (interruption,
    /// storage full, route lost).
    async fn health(&self) -> Result<(), CaptureError>;

    async fn permission_granted(&self) -> Result<bool, CaptureError>;

    /// Show the platform permission prompt.
    async fn request_permission(&self) -> Result<bool, CaptureError>;

    /// Release native resources.
    async fn release(&self) -> Result<(), CaptureError>;
}

/// Platform family of the host recorder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeProfile {
    /// Android/iOS recorder APIs
    Mobile,
    /// Browser MediaRecorder
    Web,
}

impl BridgeProfile {
    pub fn supported_formats(&self) -> Vec<AudioFormat> {
        match self {
            Self::Mobile => vec![AudioFormat::M4a, AudioFormat::Wav],
            Self::Web => vec![AudioFormat::Webm, AudioFormat::Wav],
        }
    }

    /// Mobile runtime grants persist; a browser user can revoke per origin
    /// at any time, so the answer is never cached.
    pub const fn caches_permission(&self) -> bool {
        matches!(self, Self::Mobile)
    }
}

/// [`CaptureEngine`] over a host [`NativeRecorder`]
pub struct BridgedCaptureEngine<R: NativeRecorder> {
    recorder: R,
    profile: BridgeProfile,
    initialized: AtomicBool,
    disposed: AtomicBool,
    capturing: AtomicBool,
    permission_cached: AtomicBool,
}

impl<R: NativeRecorder> BridgedCaptureEngine<R> {
    pub fn new(recorder: R, profile: BridgeProfile) -> Self {
        Self {
            recorder,
            profile,
            initialized: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
            capturing: AtomicBool::new(false),
            permission_cached: AtomicBool::new(false),
        }
    }

    pub fn profile(&self) -> BridgeProfile {
        self.profile
    }

    fn ensure_usable(&self) -> Result<(), CaptureError> {
        if self.disposed.load(Ordering::SeqCst) {
            return Err(CaptureError::Disposed);
        }
        if !self.initialized.load(Ordering::SeqCst) {
            return Err(CaptureError::NotInitialized);
        }
        Ok(())
    }

    fn remember_permission(&self, granted: bool) -> bool {
        if granted && self.profile.caches_permission() {
            self.permission_cached.store(true, Ordering::SeqCst);
        }
        granted
    }
}

#[async_trait]
impl<R: NativeRecorder> CaptureEngine for BridgedCaptureEngine<R> {
    async fn initialize(&self) -> Result<(), CaptureError> {
        if self.disposed.load(Ordering::SeqCst) {
            return Err(CaptureError::Disposed);
        }
        self.initialized.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn dispose(&self) -> Result<(), CaptureError> {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        if self.capturing.swap(false, Ordering::SeqCst) {
            self.recorder.abort().await?;
        }
        self.initialized.store(false, Ordering::SeqCst);
        self.recorder.release().await?;
        debug!(profile = ?self.profile, "Bridged capture engine disposed");
        Ok(())
    }

    async fn start_capture(
        &self,
        path: &Path,
        configuration: &RecordingConfiguration,
    ) -> Result<(), CaptureError> {
        self.ensure_usable()?;
        if !self.profile.supported_formats().contains(&configuration.format) {
            return Err(CaptureError::UnsupportedFormat(configuration.format));
        }
        if self.capturing.load(Ordering::SeqCst) {
            return Err(CaptureError::AlreadyCapturing);
        }

        self.recorder.start(path, configuration).await?;
        self.capturing.store(true, Ordering::SeqCst);
        info!(profile = ?self.profile, path = %path.display(), "Bridged capture started");
        Ok(())
    }

    async fn pause(&self) -> Result<(), CaptureError> {
        if !self.capturing.load(Ordering::SeqCst) {
            return Err(CaptureError::NotCapturing);
        }
        self.recorder.pause().await
    }

    async fn resume(&self) -> Result<(), CaptureError> {
        if !self.capturing.load(Ordering::SeqCst) {
            return Err(CaptureError::NotCapturing);
        }
        self.recorder.resume().await
    }

    async fn stop(&self) -> Result<Option<PathBuf>, CaptureError> {
        if !self.capturing.swap(false, Ordering::SeqCst) {
            return Ok(None);
        }
        self.recorder.finish().await
    }

    async fn cancel(&self) -> Result<(), CaptureError> {
        if !self.capturing.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        self.recorder.abort().await
    }

    fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::SeqCst)
    }

    async fn health(&self) -> Result<(), CaptureError> {
        if !self.capturing.load(Ordering::SeqCst) {
            return Ok(());
        }
        self.recorder.health().await
    }

    async fn amplitude(&self) -> Result<f32, CaptureError> {
        if !self.capturing.load(Ordering::SeqCst) {
            return Ok(0.0);
        }
        Ok(self.recorder.level().await?.normalized())
    }

    async fn has_permission(&self) -> Result<bool, CaptureError> {
        if self.permission_cached.load(Ordering::SeqCst) {
            return Ok(true);
        }
        let granted = self.recorder.permission_granted().await?;
        Ok(self.remember_permission(granted))
    }

    async fn request_permission(&self) -> Result<bool, CaptureError> {
        let granted = self.recorder.request_permission().await?;
        Ok(self.remember_permission(granted))
    }

    fn supported_formats(&self) -> Vec<AudioFormat> {
        self.profile.supported_formats()
    }
}
