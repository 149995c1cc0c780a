//! Shared fakes for the integration tests

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use tokio::sync::Notify;
use uuid::Uuid;

use smart_recorder::application::ports::{
    BackgroundError, BackgroundPlatform, CaptureEngine, CaptureError,
};
use smart_recorder::application::{ControllerSettings, SessionController};
use smart_recorder::domain::background::BackgroundLimitations;
use smart_recorder::domain::recording::{AudioFormat, Duration, RecordingConfiguration};

/// Stand-in bytes for a non-empty recording
const FAKE_WAV: &[u8] = &[0u8; 64];

/// Knobs and observations for [`ScriptedEngine`]
#[derive(Default)]
pub struct EngineProbe {
    pub permission: AtomicBool,
    pub grant_on_request: AtomicBool,
    pub fail_start: AtomicBool,
    pub fail_pause: AtomicBool,
    pub empty_output: AtomicBool,
    pub capturing: AtomicBool,
    pub dispose_calls: AtomicUsize,
    pub cancel_calls: AtomicUsize,
    pub level: Mutex<f32>,
    pub path: Mutex<Option<PathBuf>>,
    /// Reported by `health` while capturing
    pub failure: Mutex<Option<String>>,
    /// `start_capture` parks on `start_gate` while set
    pub hold_start: AtomicBool,
    pub start_gate: Notify,
}

/// In-memory capture engine that writes a small real file per recording
pub struct ScriptedEngine {
    probe: Arc<EngineProbe>,
}

impl ScriptedEngine {
    pub fn new() -> (Self, Arc<EngineProbe>) {
        let probe = Arc::new(EngineProbe::default());
        probe.permission.store(true, Ordering::SeqCst);
        *probe.level.lock().unwrap() = 0.5;
        (
            Self {
                probe: Arc::clone(&probe),
            },
            probe,
        )
    }
}

#[async_trait]
impl CaptureEngine for ScriptedEngine {
    async fn initialize(&self) -> Result<(), CaptureError> {
        Ok(())
    }

    async fn dispose(&self) -> Result<(), CaptureError> {
        self.probe.dispose_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn start_capture(
        &self,
        path: &Path,
        _configuration: &RecordingConfiguration,
    ) -> Result<(), CaptureError> {
        if self.probe.hold_start.load(Ordering::SeqCst) {
            self.probe.start_gate.notified().await;
        }
        if self.probe.fail_start.load(Ordering::SeqCst) {
            return Err(CaptureError::StartFailed("device busy".into()));
        }
        std::fs::write(path, FAKE_WAV).map_err(|e| CaptureError::WriteFailed(e.to_string()))?;
        *self.probe.path.lock().unwrap() = Some(path.to_path_buf());
        self.probe.capturing.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn pause(&self) -> Result<(), CaptureError> {
        if self.probe.fail_pause.load(Ordering::SeqCst) {
            return Err(CaptureError::CaptureFailed("stream lost".into()));
        }
        Ok(())
    }

    async fn resume(&self) -> Result<(), CaptureError> {
        Ok(())
    }

    async fn stop(&self) -> Result<Option<PathBuf>, CaptureError> {
        if !self.probe.capturing.swap(false, Ordering::SeqCst) {
            return Ok(None);
        }
        let path = self.probe.path.lock().unwrap().clone();
        if let Some(path) = &path {
            if self.probe.empty_output.load(Ordering::SeqCst) {
                std::fs::write(path, b"").map_err(|e| CaptureError::WriteFailed(e.to_string()))?;
            }
        }
        Ok(path)
    }

    async fn cancel(&self) -> Result<(), CaptureError> {
        self.probe.cancel_calls.fetch_add(1, Ordering::SeqCst);
        self.probe.capturing.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.probe.capturing.load(Ordering::SeqCst)
    }

    async fn health(&self) -> Result<(), CaptureError> {
        match self.probe.failure.lock().unwrap().clone() {
            Some(reason) if self.is_capturing() => Err(CaptureError::CaptureFailed(reason)),
            _ => Ok(()),
        }
    }

    async fn amplitude(&self) -> Result<f32, CaptureError> {
        Ok(*self.probe.level.lock().unwrap())
    }

    async fn has_permission(&self) -> Result<bool, CaptureError> {
        Ok(self.probe.permission.load(Ordering::SeqCst))
    }

    async fn request_permission(&self) -> Result<bool, CaptureError> {
        let granted = self.probe.grant_on_request.load(Ordering::SeqCst);
        if granted {
            self.probe.permission.store(true, Ordering::SeqCst);
        }
        Ok(granted)
    }

    fn supported_formats(&self) -> Vec<AudioFormat> {
        vec![AudioFormat::Wav]
    }
}

/// Knobs and observations for [`FakePlatform`]
#[derive(Default)]
pub struct PlatformProbe {
    pub permission: AtomicBool,
    pub fail_start: AtomicBool,
    pub session_active: AtomicBool,
    pub task_active: AtomicBool,
    pub started: Mutex<Vec<Uuid>>,
    pub stop_calls: AtomicUsize,
}

pub struct FakePlatform {
    probe: Arc<PlatformProbe>,
    limitations: BackgroundLimitations,
}

impl FakePlatform {
    /// Platform with background permission and the given time budget
    pub fn new(budget: Option<Duration>) -> (Self, Arc<PlatformProbe>) {
        let probe = Arc::new(PlatformProbe::default());
        probe.permission.store(true, Ordering::SeqCst);
        let limitations = BackgroundLimitations {
            max_background_time: budget,
            supports_infinite_background: budget.is_none(),
            ..BackgroundLimitations::default()
        };
        (
            Self {
                probe: Arc::clone(&probe),
                limitations,
            },
            probe,
        )
    }
}

#[async_trait]
impl BackgroundPlatform for FakePlatform {
    async fn enable_background_session(&self) -> Result<(), BackgroundError> {
        self.probe.session_active.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disable_background_session(&self) -> Result<(), BackgroundError> {
        self.probe.session_active.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_background_session_active(&self) -> bool {
        self.probe.session_active.load(Ordering::SeqCst)
    }

    async fn start_background_task(
        &self,
        session_id: Uuid,
        _title: Option<&str>,
        _message: Option<&str>,
    ) -> Result<(), BackgroundError> {
        if self.probe.fail_start.load(Ordering::SeqCst) {
            return Err(BackgroundError::TaskStartFailed("quota exhausted".into()));
        }
        self.probe.started.lock().unwrap().push(session_id);
        self.probe.task_active.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn stop_background_task(&self) -> Result<(), BackgroundError> {
        self.probe.stop_calls.fetch_add(1, Ordering::SeqCst);
        self.probe.task_active.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn request_background_permissions(&self) -> Result<bool, BackgroundError> {
        Ok(self.probe.permission.load(Ordering::SeqCst))
    }

    async fn has_background_permissions(&self) -> Result<bool, BackgroundError> {
        Ok(self.probe.permission.load(Ordering::SeqCst))
    }

    fn background_limitations(&self) -> BackgroundLimitations {
        self.limitations.clone()
    }
}

/// Controller over a fresh [`ScriptedEngine`] with the given waveform size
pub async fn controller_with(capacity: usize) -> (SessionController, Arc<EngineProbe>) {
    let (engine, probe) = ScriptedEngine::new();
    let settings = ControllerSettings {
        waveform_capacity: capacity,
        ..Default::default()
    };
    let controller = SessionController::spawn(engine, settings)
        .await
        .expect("controller should start");
    (controller, probe)
}

pub async fn controller() -> (SessionController, Arc<EngineProbe>) {
    controller_with(100).await
}

pub fn wav_config(dir: &Path) -> RecordingConfiguration {
    RecordingConfiguration::new(dir)
}

/// Let spawned tasks drain their queues without moving the clock
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

pub async fn sleep_ms(ms: u64) {
    tokio::time::sleep(StdDuration::from_millis(ms)).await;
}
