//! Recording session controller
//!
//! [`SessionController`] is a cheap, cloneable handle. The session itself,
//! its timers and the capture engine live in a single actor task that
//! processes commands and timer ticks one at a time, so a tick can never
//! interleave with a command handler.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use super::events::EventBus;
use super::monitor::{AmplitudeMonitor, SessionClock};
use super::ports::{CaptureEngine, CaptureError};
use crate::domain::error::InvalidStateTransition;
use crate::domain::recording::{
    AudioFormat, Duration, RecordingConfiguration, RecordingSession, RecordingState, StopReason,
    DEFAULT_WAVEFORM_CAPACITY,
};

/// Pending commands before `send` starts waiting
const COMMAND_QUEUE_DEPTH: usize = 32;

/// Errors from session commands
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    #[error("Microphone permission denied")]
    PermissionDenied,

    #[error("A recording is already in progress")]
    AlreadyRecording,

    #[error("No active recording")]
    NoActiveRecording,

    #[error("Capture engine failure: {0}")]
    EngineFailure(String),

    #[error("Recording file not found or empty: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Background execution permission denied")]
    BackgroundPermissionDenied,

    #[error("Background time limit exceeded")]
    BackgroundTimeLimitExceeded,

    #[error("Invalid state transition: {0}")]
    InvalidState(#[from] InvalidStateTransition),

    #[error("Failed to prepare output location: {0}")]
    Io(String),

    #[error("Session controller has been disposed")]
    ControllerClosed,
}

impl From<CaptureError> for SessionError {
    fn from(e: CaptureError) -> Self {
        match e {
            CaptureError::PermissionDenied => Self::PermissionDenied,
            other => Self::EngineFailure(other.to_string()),
        }
    }
}

/// A finished recording handed to downstream consumers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedRecording {
    pub session_id: Uuid,
    pub path: PathBuf,
    pub duration: Duration,
    pub file_size: u64,
    pub reason: StopReason,
}

/// Events published by the controller, in the order they happened
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Full snapshot after every transition, duration tick or amplitude sample
    Updated(RecordingSession),
    /// A recording reached Stopped with a verified file
    Completed(CompletedRecording),
    /// The session entered the Error state
    Failed { session_id: Uuid, message: String },
    /// A terminal session was acknowledged and released
    Cleared,
}

/// Receiver side of a [`SessionController::subscribe`] call
pub type SessionEvents = mpsc::UnboundedReceiver<SessionEvent>;

/// Timer periods and buffer sizes
#[derive(Debug, Clone)]
pub struct ControllerSettings {
    pub duration_tick: StdDuration,
    pub amplitude_tick: StdDuration,
    pub waveform_capacity: usize,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            duration_tick: Duration::duration_tick().as_std(),
            amplitude_tick: Duration::amplitude_tick().as_std(),
            waveform_capacity: DEFAULT_WAVEFORM_CAPACITY,
        }
    }
}

type Reply<T> = oneshot::Sender<Result<T, SessionError>>;

enum Command {
    Start {
        configuration: RecordingConfiguration,
        file_name: Option<String>,
        reply: Reply<RecordingSession>,
    },
    Pause {
        reply: Reply<RecordingSession>,
    },
    Resume {
        reply: Reply<RecordingSession>,
    },
    Stop {
        reason: StopReason,
        reply: Reply<CompletedRecording>,
    },
    Cancel {
        reply: Reply<()>,
    },
    Acknowledge {
        reply: Reply<()>,
    },
    Dispose {
        reply: oneshot::Sender<()>,
    },
}

/// State shared between the handle and the actor
struct Shared {
    events: EventBus<SessionEvent>,
    snapshot: watch::Sender<Option<RecordingSession>>,
    ready: AtomicBool,
    formats: Vec<AudioFormat>,
}

/// Handle to the single-session recording controller
#[derive(Clone)]
pub struct SessionController {
    commands: mpsc::Sender<Command>,
    shared: Arc<Shared>,
}

impl SessionController {
    /// Initialize `engine` and spawn the controller task.
    ///
    /// The engine is owned by the controller from here on and released by
    /// [`dispose`](Self::dispose).
    #[instrument(skip(engine, settings))]
    pub async fn spawn<E>(engine: E, settings: ControllerSettings) -> Result<Self, SessionError>
    where
        E: CaptureEngine + 'static,
    {
        engine.initialize().await?;

        let (snapshot, _) = watch::channel(None);
        let shared = Arc::new(Shared {
            events: EventBus::new(),
            snapshot,
            ready: AtomicBool::new(true),
            formats: engine.supported_formats(),
        });

        let (tx, rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);
        let actor = SessionActor {
            clock: SessionClock::new(settings.duration_tick),
            amplitude: AmplitudeMonitor::new(settings.amplitude_tick),
            engine,
            settings,
            session: None,
            shared: Arc::clone(&shared),
            disposed: false,
        };
        tokio::spawn(actor.run(rx));

        info!(formats = ?shared.formats, "Session controller started");

        Ok(Self {
            commands: tx,
            shared,
        })
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> Command,
    ) -> Result<T, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(build(tx))
            .await
            .map_err(|_| SessionError::ControllerClosed)?;
        rx.await.map_err(|_| SessionError::ControllerClosed)?
    }

    /// Start a new recording.
    ///
    /// # Arguments
    /// * `configuration` - Format, quality, limit and output directory
    /// * `file_name` - Output file stem; a timestamped name is used if `None`
    ///
    /// # Returns
    /// The session snapshot in the Recording state
    pub async fn start_recording(
        &self,
        configuration: RecordingConfiguration,
        file_name: Option<String>,
    ) -> Result<RecordingSession, SessionError> {
        self.request(|reply| Command::Start {
            configuration,
            file_name,
            reply,
        })
        .await
    }

    /// Pause the active recording; duration is frozen, not reset.
    pub async fn pause_recording(&self) -> Result<RecordingSession, SessionError> {
        self.request(|reply| Command::Pause { reply }).await
    }

    pub async fn resume_recording(&self) -> Result<RecordingSession, SessionError> {
        self.request(|reply| Command::Resume { reply }).await
    }

    /// Finalize the recording and return the verified output.
    pub async fn stop_recording(&self) -> Result<CompletedRecording, SessionError> {
        self.stop_recording_with_reason(StopReason::Manual).await
    }

    pub(crate) async fn stop_recording_with_reason(
        &self,
        reason: StopReason,
    ) -> Result<CompletedRecording, SessionError> {
        self.request(|reply| Command::Stop { reason, reply }).await
    }

    /// Abort the recording and delete any partial output.
    pub async fn cancel_recording(&self) -> Result<(), SessionError> {
        self.request(|reply| Command::Cancel { reply }).await
    }

    /// Release a Stopped or Error session, returning the controller to Idle.
    pub async fn acknowledge(&self) -> Result<(), SessionError> {
        self.request(|reply| Command::Acknowledge { reply }).await
    }

    /// Cancel timers, release the capture resource and stop the controller.
    /// Calling this more than once is harmless.
    pub async fn dispose(&self) {
        let (tx, rx) = oneshot::channel();
        if self.commands.send(Command::Dispose { reply: tx }).await.is_ok() {
            let _ = rx.await;
        }
    }

    /// Subscribe to session events published from now on.
    pub fn subscribe(&self) -> SessionEvents {
        self.shared.events.subscribe()
    }

    /// Latest published snapshot, if a session exists
    pub fn session(&self) -> Option<RecordingSession> {
        self.shared.snapshot.borrow().clone()
    }

    pub fn state(&self) -> RecordingState {
        self.shared
            .snapshot
            .borrow()
            .as_ref()
            .map(|s| s.state())
            .unwrap_or_default()
    }

    /// Whether the engine is initialized and the controller accepts commands
    pub fn is_ready(&self) -> bool {
        self.shared.ready.load(Ordering::SeqCst) && !self.commands.is_closed()
    }

    pub fn supported_formats(&self) -> Vec<AudioFormat> {
        self.shared.formats.clone()
    }
}

struct SessionActor<E: CaptureEngine> {
    engine: E,
    settings: ControllerSettings,
    session: Option<RecordingSession>,
    clock: SessionClock,
    amplitude: AmplitudeMonitor,
    shared: Arc<Shared>,
    disposed: bool,
}

impl<E: CaptureEngine> SessionActor<E> {
    async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        loop {
            // Timers are polled first so a due recording-limit stop wins
            // over any stop command queued at the same instant.
            tokio::select! {
                biased;
                _ = self.clock.tick() => self.on_duration_tick().await,
                _ = self.amplitude.tick() => self.on_amplitude_tick().await,
                command = commands.recv() => match command {
                    Some(Command::Dispose { reply }) => {
                        self.dispose().await;
                        let _ = reply.send(());
                        break;
                    }
                    Some(command) => self.handle(command).await,
                    None => {
                        self.dispose().await;
                        break;
                    }
                },
            }
        }
        debug!("Session controller task exited");
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::Start {
                configuration,
                file_name,
                reply,
            } => {
                let result = self.start(configuration, file_name).await;
                let _ = reply.send(result);
            }
            Command::Pause { reply } => {
                let _ = reply.send(self.pause().await);
            }
            Command::Resume { reply } => {
                let _ = reply.send(self.resume().await);
            }
            Command::Stop { reason, reply } => {
                let _ = reply.send(self.stop(reason).await);
            }
            Command::Cancel { reply } => {
                let _ = reply.send(self.cancel().await);
            }
            Command::Acknowledge { reply } => {
                let _ = reply.send(self.acknowledge());
            }
            Command::Dispose { reply } => {
                self.dispose().await;
                let _ = reply.send(());
            }
        }
    }

    fn current_state(&self) -> RecordingState {
        self.session
            .as_ref()
            .map(|s| s.state())
            .unwrap_or_default()
    }

    fn publish_snapshot(&self) {
        if let Some(session) = &self.session {
            self.shared.snapshot.send_replace(Some(session.clone()));
            self.shared.events.publish(SessionEvent::Updated(session.clone()));
        }
    }

    async fn check_permission(&self) -> Result<(), SessionError> {
        if self.engine.has_permission().await? {
            return Ok(());
        }
        debug!("Microphone permission missing, requesting");
        match self.engine.request_permission().await {
            Ok(true) => Ok(()),
            Ok(false) | Err(CaptureError::PermissionDenied) => Err(SessionError::PermissionDenied),
            Err(e) => Err(e.into()),
        }
    }

    async fn start(
        &mut self,
        configuration: RecordingConfiguration,
        file_name: Option<String>,
    ) -> Result<RecordingSession, SessionError> {
        if self.current_state().is_active() {
            return Err(SessionError::AlreadyRecording);
        }

        // Everything that can be rejected is rejected before a session exists.
        self.check_permission().await?;
        if !self.shared.formats.contains(&configuration.format) {
            return Err(CaptureError::UnsupportedFormat(configuration.format).into());
        }
        tokio::fs::create_dir_all(&configuration.output_directory)
            .await
            .map_err(|e| {
                SessionError::Io(format!(
                    "{}: {}",
                    configuration.output_directory.display(),
                    e
                ))
            })?;

        let file_name = file_name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(default_file_name);
        let path = configuration.output_path_for(&file_name);

        let mut session = RecordingSession::new(configuration, self.settings.waveform_capacity);
        session.begin_initializing()?;
        let session_id = session.id();
        self.session = Some(session);
        self.publish_snapshot();

        let capture_config = match &self.session {
            Some(s) => s.configuration().clone(),
            None => return Err(SessionError::NoActiveRecording),
        };
        if let Err(e) = self.engine.start_capture(&path, &capture_config).await {
            error!(session_id = %session_id, "Failed to start capture: {}", e);
            return Err(self.fail(e.to_string()).await);
        }

        let session = self.session.as_mut().ok_or(SessionError::NoActiveRecording)?;
        session.mark_recording(path.clone())?;
        self.clock.start();
        self.amplitude.start();
        self.publish_snapshot();

        info!(
            session_id = %session_id,
            path = %path.display(),
            format = %capture_config.format,
            limit = ?capture_config.recording_limit.map(|d| d.to_string()),
            "Recording started"
        );

        self.session.clone().ok_or(SessionError::NoActiveRecording)
    }

    async fn pause(&mut self) -> Result<RecordingSession, SessionError> {
        if self.current_state() != RecordingState::Recording {
            return Err(SessionError::NoActiveRecording);
        }

        let frozen = self.clock.pause();
        self.amplitude.stop();
        if let Some(session) = self.session.as_mut() {
            session.advance_duration(frozen);
        }

        if let Err(e) = self.engine.pause().await {
            return Err(self.fail(e.to_string()).await);
        }

        let session = self.session.as_mut().ok_or(SessionError::NoActiveRecording)?;
        session.pause()?;
        info!(session_id = %session.id(), duration = %frozen, "Recording paused");
        self.publish_snapshot();
        self.session.clone().ok_or(SessionError::NoActiveRecording)
    }

    async fn resume(&mut self) -> Result<RecordingSession, SessionError> {
        if self.current_state() != RecordingState::Paused {
            return Err(SessionError::NoActiveRecording);
        }

        self.clock.resume();
        self.amplitude.start();

        if let Err(e) = self.engine.resume().await {
            return Err(self.fail(e.to_string()).await);
        }

        let session = self.session.as_mut().ok_or(SessionError::NoActiveRecording)?;
        session.resume()?;
        info!(session_id = %session.id(), "Recording resumed");
        self.publish_snapshot();
        self.session.clone().ok_or(SessionError::NoActiveRecording)
    }

    async fn stop(&mut self, reason: StopReason) -> Result<CompletedRecording, SessionError> {
        if !matches!(
            self.current_state(),
            RecordingState::Recording | RecordingState::Paused
        ) {
            return Err(SessionError::NoActiveRecording);
        }

        let final_duration = self.clock.stop();
        self.amplitude.stop();
        let (session_id, expected_path) = {
            let session = self.session.as_mut().ok_or(SessionError::NoActiveRecording)?;
            session.advance_duration(final_duration);
            session.begin_stopping()?;
            (session.id(), session.file_path().map(Path::to_path_buf))
        };
        self.publish_snapshot();

        let path = match self.engine.stop().await {
            Ok(Some(path)) => path,
            Ok(None) => {
                let path = expected_path.unwrap_or_default();
                let err = SessionError::FileNotFound(path);
                self.fail(err.to_string()).await;
                return Err(err);
            }
            Err(e) => {
                error!(session_id = %session_id, "Failed to stop capture: {}", e);
                return Err(self.fail(e.to_string()).await);
            }
        };

        let file_size = match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() && meta.len() > 0 => meta.len(),
            _ => {
                remove_partial_file(&path).await;
                let err = SessionError::FileNotFound(path);
                self.fail(err.to_string()).await;
                return Err(err);
            }
        };

        let session = self.session.as_mut().ok_or(SessionError::NoActiveRecording)?;
        session.mark_stopped(path.clone(), file_size, reason)?;
        let completed = CompletedRecording {
            session_id,
            path,
            duration: session.duration(),
            file_size,
            reason,
        };

        info!(
            session_id = %session_id,
            path = %completed.path.display(),
            duration = %completed.duration,
            file_size,
            reason = ?reason,
            "Recording stopped"
        );

        self.publish_snapshot();
        self.shared.events.publish(SessionEvent::Completed(completed.clone()));
        Ok(completed)
    }

    async fn cancel(&mut self) -> Result<(), SessionError> {
        if !self.current_state().is_active() {
            return Err(SessionError::NoActiveRecording);
        }

        let engine_result = self.release_capture().await;
        if let Some(path) = self
            .session
            .as_ref()
            .and_then(|s| s.file_path())
            .map(Path::to_path_buf)
        {
            remove_partial_file(&path).await;
        }

        if let Err(e) = engine_result {
            return Err(self.fail(e.to_string()).await);
        }

        let session = self.session.as_mut().ok_or(SessionError::NoActiveRecording)?;
        session.mark_cancelled()?;
        info!(session_id = %session.id(), "Recording cancelled");
        self.publish_snapshot();
        Ok(())
    }

    fn acknowledge(&mut self) -> Result<(), SessionError> {
        match &self.session {
            None => Ok(()),
            Some(session) if session.state().is_terminal() => {
                debug!(session_id = %session.id(), "Session acknowledged");
                self.session = None;
                self.shared.snapshot.send_replace(None);
                self.shared.events.publish(SessionEvent::Cleared);
                Ok(())
            }
            Some(session) => Err(InvalidStateTransition {
                current_state: session.state(),
                action: "acknowledge".to_string(),
            }
            .into()),
        }
    }

    /// Cancel timers and abort any capture in flight. Shared by the error,
    /// cancel and dispose paths.
    async fn release_capture(&mut self) -> Result<(), CaptureError> {
        let frozen = self.clock.stop();
        self.amplitude.stop();
        if let Some(session) = self.session.as_mut() {
            session.advance_duration(frozen);
        }
        if self.engine.is_capturing() {
            self.engine.cancel().await
        } else {
            Ok(())
        }
    }

    /// Move the session to Error, cleaning up like `dispose` does.
    /// Returns the error to hand back to the caller.
    async fn fail(&mut self, message: String) -> SessionError {
        if let Err(e) = self.release_capture().await {
            warn!("Capture cleanup after failure also failed: {}", e);
        }

        if let Some(session) = self.session.as_mut() {
            if session.fail(message.clone()).is_ok() {
                let session_id = session.id();
                error!(session_id = %session_id, "Recording failed: {}", message);
                self.publish_snapshot();
                self.shared.events.publish(SessionEvent::Failed {
                    session_id,
                    message: message.clone(),
                });
            }
        }

        SessionError::EngineFailure(message)
    }

    async fn on_duration_tick(&mut self) {
        if !self.session.as_ref().is_some_and(|s| s.is_recording()) {
            return;
        }
        if let Err(e) = self.engine.health().await {
            error!("Capture failed mid-recording: {}", e);
            self.fail(e.to_string()).await;
            return;
        }

        let elapsed = self.clock.elapsed();
        let limit = {
            let Some(session) = self.session.as_mut() else {
                return;
            };
            session.advance_duration(elapsed);
            session.configuration().recording_limit
        };
        self.publish_snapshot();

        if let Some(limit) = limit {
            if elapsed >= limit {
                info!(limit = %limit, "Recording limit reached, auto-stopping");
                if let Err(e) = self.stop(StopReason::RecordingLimit).await {
                    warn!("Auto-stop failed: {}", e);
                }
            }
        }
    }

    async fn on_amplitude_tick(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if self.amplitude.sample(&self.engine, session).await {
            self.publish_snapshot();
        }
    }

    async fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.shared.ready.store(false, Ordering::SeqCst);

        let was_active = self.current_state().is_active();
        if let Err(e) = self.release_capture().await {
            warn!("Failed to cancel capture during dispose: {}", e);
        }
        if was_active {
            if let Some(path) = self
                .session
                .as_ref()
                .and_then(|s| s.file_path())
                .map(Path::to_path_buf)
            {
                remove_partial_file(&path).await;
            }
            if let Some(session) = self.session.as_mut() {
                if session.mark_cancelled().is_ok() {
                    warn!(session_id = %session.id(), "Active recording discarded by dispose");
                    self.publish_snapshot();
                }
            }
        }

        if let Err(e) = self.engine.dispose().await {
            warn!("Capture engine dispose failed: {}", e);
        }
        info!("Session controller disposed");
    }
}

/// Timestamped default file stem, unique per call
fn default_file_name() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!(
        "recording_{}_{}",
        Utc::now().format("%Y%m%d_%H%M%S"),
        &id[..8]
    )
}

async fn remove_partial_file(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "Removed partial recording"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), "Failed to remove partial recording: {}", e),
    }
}
