//! Background execution coordinator
//!
//! Decides what happens to an active recording when the app loses the
//! foreground: keep capturing under a platform background task, or pause
//! and resume once the app is visible again. Platform time budgets are
//! enforced with a single deadline owned by the coordinator task.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, instrument, warn};

use super::events::EventBus;
use super::ports::{BackgroundError, BackgroundPlatform};
use super::session::{SessionController, SessionError, SessionEvent, SessionEvents};
use crate::domain::background::{AppVisibility, BackgroundLimitations};
use crate::domain::config::AppConfig;
use crate::domain::recording::{RecordingState, StopReason};

const COMMAND_QUEUE_DEPTH: usize = 16;

impl From<BackgroundError> for SessionError {
    fn from(e: BackgroundError) -> Self {
        match e {
            BackgroundError::PermissionDenied => Self::BackgroundPermissionDenied,
            other => Self::EngineFailure(other.to_string()),
        }
    }
}

/// What the coordinator did in response to a visibility change or budget
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackgroundEvent {
    /// Recording was paused because it could not continue in background
    RecordingPausedForBackground,
    /// A platform background task is keeping capture alive
    BackgroundTaskStarted,
    BackgroundTaskStopped,
    /// A platform call failed; the coordinator fell back to pausing
    BackgroundTaskFailed { reason: String },
    /// The platform budget ran out and the recording was stopped
    BackgroundTimeLimitExceeded,
    /// A recording paused for background was resumed on return
    RecordingResumedFromBackground,
}

/// Receiver side of [`BackgroundCoordinator::subscribe`]
pub type BackgroundEvents = mpsc::UnboundedReceiver<BackgroundEvent>;

/// Coordinator options
#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    /// Whether recording may continue while backgrounded at all
    pub background_enabled: bool,
    /// Title of the user-visible indicator on platforms that need one
    pub task_title: String,
    pub task_message: String,
}

impl CoordinatorSettings {
    /// Settings for a merged app config; unset keys keep their defaults.
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            background_enabled: config.background_enabled_or_default(),
            ..Self::default()
        }
    }
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            background_enabled: true,
            task_title: "Recording in progress".to_string(),
            task_message: "Audio is being recorded in the background".to_string(),
        }
    }
}

enum Command {
    Visibility {
        visibility: AppVisibility,
        reply: oneshot::Sender<()>,
    },
    SetEnabled {
        enabled: bool,
        reply: oneshot::Sender<()>,
    },
    RequestPermissions {
        reply: oneshot::Sender<Result<bool, BackgroundError>>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

struct Shared {
    events: EventBus<BackgroundEvent>,
    visibility: watch::Sender<AppVisibility>,
    limitations: BackgroundLimitations,
}

/// Handle to the background coordinator task
#[derive(Clone)]
pub struct BackgroundCoordinator {
    commands: mpsc::Sender<Command>,
    shared: Arc<Shared>,
}

impl BackgroundCoordinator {
    /// Spawn the coordinator for `controller` on top of `platform`.
    pub fn spawn<P>(platform: P, controller: SessionController, settings: CoordinatorSettings) -> Self
    where
        P: BackgroundPlatform + 'static,
    {
        let (visibility, _) = watch::channel(AppVisibility::Foreground);
        let shared = Arc::new(Shared {
            events: EventBus::new(),
            visibility,
            limitations: platform.background_limitations(),
        });

        let session_events = controller.subscribe();
        let (tx, rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);
        let actor = CoordinatorActor {
            platform,
            controller,
            settings,
            shared: Arc::clone(&shared),
            visibility: AppVisibility::Foreground,
            auto_paused: false,
            task_active: false,
            session_enabled: false,
            deadline: None,
        };
        tokio::spawn(actor.run(rx, session_events));

        debug!(limitations = ?shared.limitations, "Background coordinator started");

        Self {
            commands: tx,
            shared,
        }
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(build(tx))
            .await
            .map_err(|_| SessionError::ControllerClosed)?;
        rx.await.map_err(|_| SessionError::ControllerClosed)
    }

    /// Apply a foreground/background change. Repeats of the current
    /// visibility are ignored. Returns once the change has been handled.
    pub async fn handle_visibility(&self, visibility: AppVisibility) -> Result<(), SessionError> {
        self.request(|reply| Command::Visibility { visibility, reply })
            .await
    }

    /// Allow or forbid continuing capture while backgrounded
    pub async fn set_background_enabled(&self, enabled: bool) -> Result<(), SessionError> {
        self.request(|reply| Command::SetEnabled { enabled, reply })
            .await
    }

    /// Ask the platform for background-execution rights.
    pub async fn request_background_permissions(&self) -> Result<(), SessionError> {
        match self
            .request(|reply| Command::RequestPermissions { reply })
            .await??
        {
            true => Ok(()),
            false => Err(SessionError::BackgroundPermissionDenied),
        }
    }

    pub fn background_limitations(&self) -> BackgroundLimitations {
        self.shared.limitations.clone()
    }

    pub fn visibility(&self) -> AppVisibility {
        *self.shared.visibility.borrow()
    }

    pub fn subscribe(&self) -> BackgroundEvents {
        self.shared.events.subscribe()
    }

    /// Release any background task and stop the coordinator.
    pub async fn shutdown(&self) {
        let _ = self.request(|reply| Command::Shutdown { reply }).await;
    }
}

struct CoordinatorActor<P: BackgroundPlatform> {
    platform: P,
    controller: SessionController,
    settings: CoordinatorSettings,
    shared: Arc<Shared>,
    visibility: AppVisibility,
    auto_paused: bool,
    task_active: bool,
    /// The platform background session was enabled by this coordinator
    session_enabled: bool,
    deadline: Option<Instant>,
}

async fn wait_for(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => std::future::pending::<()>().await,
    }
}

impl<P: BackgroundPlatform> CoordinatorActor<P> {
    async fn run(mut self, mut commands: mpsc::Receiver<Command>, mut sessions: SessionEvents) {
        let mut sessions_open = true;
        loop {
            tokio::select! {
                biased;
                _ = wait_for(self.deadline) => self.on_budget_expired().await,
                event = sessions.recv(), if sessions_open => match event {
                    Some(event) => self.on_session_event(event).await,
                    None => sessions_open = false,
                },
                command = commands.recv() => match command {
                    Some(Command::Visibility { visibility, reply }) => {
                        self.on_visibility(visibility).await;
                        let _ = reply.send(());
                    }
                    Some(Command::SetEnabled { enabled, reply }) => {
                        info!(enabled, "Background recording setting changed");
                        self.settings.background_enabled = enabled;
                        let _ = reply.send(());
                    }
                    Some(Command::RequestPermissions { reply }) => {
                        let _ = reply.send(self.platform.request_background_permissions().await);
                    }
                    Some(Command::Shutdown { reply }) => {
                        self.release_task().await;
                        let _ = reply.send(());
                        break;
                    }
                    None => {
                        self.release_task().await;
                        break;
                    }
                },
            }
        }
        debug!("Background coordinator task exited");
    }

    #[instrument(skip(self))]
    async fn on_visibility(&mut self, visibility: AppVisibility) {
        if visibility == self.visibility {
            debug!("Visibility unchanged, ignoring");
            return;
        }
        self.visibility = visibility;
        self.shared.visibility.send_replace(visibility);

        match visibility {
            AppVisibility::Background => self.enter_background().await,
            AppVisibility::Foreground => self.enter_foreground().await,
        }
    }

    async fn enter_background(&mut self) {
        let Some(session) = self.controller.session() else {
            return;
        };
        let state = session.state();
        if !matches!(state, RecordingState::Recording | RecordingState::Paused) {
            return;
        }

        if self.settings.background_enabled {
            match self.try_start_task(session.id()).await {
                Ok(true) => return,
                Ok(false) => debug!("Background execution not permitted"),
                Err(e) => {
                    warn!("Background task unavailable: {}", e);
                    self.emit(BackgroundEvent::BackgroundTaskFailed {
                        reason: e.to_string(),
                    });
                }
            }
        }

        if state == RecordingState::Recording {
            match self.controller.pause_recording().await {
                Ok(_) => {
                    info!(session_id = %session.id(), "Recording paused for background");
                    self.auto_paused = true;
                    self.emit(BackgroundEvent::RecordingPausedForBackground);
                }
                Err(e) => warn!("Failed to pause for background: {}", e),
            }
        }
    }

    /// Returns `Ok(false)` when the platform does not allow background
    /// execution, `Ok(true)` once the task is running.
    async fn try_start_task(&mut self, session_id: uuid::Uuid) -> Result<bool, BackgroundError> {
        if !self.platform.has_background_permissions().await? {
            return Ok(false);
        }
        if !self.platform.is_background_session_active() {
            self.platform.enable_background_session().await?;
            self.session_enabled = true;
        }
        let started = self
            .platform
            .start_background_task(
                session_id,
                Some(self.settings.task_title.as_str()),
                Some(self.settings.task_message.as_str()),
            )
            .await;
        if let Err(e) = started {
            self.release_session().await;
            return Err(e);
        }

        self.task_active = true;
        self.deadline = self
            .shared
            .limitations
            .max_background_time
            .map(|budget| Instant::now() + budget.as_std());

        info!(
            session_id = %session_id,
            budget = ?self.shared.limitations.max_background_time.map(|d| d.to_string()),
            "Background task started"
        );
        self.emit(BackgroundEvent::BackgroundTaskStarted);
        Ok(true)
    }

    async fn enter_foreground(&mut self) {
        self.release_task().await;

        if !self.auto_paused {
            return;
        }
        self.auto_paused = false;

        // A user action while hidden (stop, cancel) takes precedence.
        if self.controller.state() != RecordingState::Paused {
            debug!("Session no longer paused, not resuming");
            return;
        }
        match self.controller.resume_recording().await {
            Ok(_) => {
                info!("Recording resumed from background");
                self.emit(BackgroundEvent::RecordingResumedFromBackground);
            }
            Err(e) => warn!("Failed to resume after background: {}", e),
        }
    }

    async fn on_budget_expired(&mut self) {
        self.deadline = None;
        warn!("Background time budget exhausted, stopping recording");

        match self
            .controller
            .stop_recording_with_reason(StopReason::BackgroundTimeLimit)
            .await
        {
            Ok(completed) => {
                info!(path = %completed.path.display(), "Recording stopped at background limit");
                self.emit(BackgroundEvent::BackgroundTimeLimitExceeded);
            }
            Err(SessionError::NoActiveRecording) => {
                debug!("Recording already finished before background budget expired");
            }
            Err(e) => {
                self.emit(BackgroundEvent::BackgroundTaskFailed {
                    reason: format!("{}: {}", SessionError::BackgroundTimeLimitExceeded, e),
                });
            }
        }

        self.release_task().await;
    }

    async fn on_session_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Completed(_) | SessionEvent::Failed { .. } | SessionEvent::Cleared => {
                if self.task_active {
                    debug!("Session ended while backgrounded, releasing task");
                    self.release_task().await;
                }
                self.auto_paused = false;
            }
            SessionEvent::Updated(session) => {
                // Cancel lands in Stopped without a Completed event.
                if session.state().is_terminal() && self.task_active {
                    self.release_task().await;
                }
            }
        }
    }

    /// Stop the background task and the platform session behind it.
    async fn release_task(&mut self) {
        self.deadline = None;
        if self.task_active {
            self.task_active = false;

            match self.platform.stop_background_task().await {
                Ok(()) => {
                    debug!("Background task stopped");
                    self.emit(BackgroundEvent::BackgroundTaskStopped);
                }
                Err(e) => {
                    warn!("Failed to stop background task: {}", e);
                    self.emit(BackgroundEvent::BackgroundTaskFailed {
                        reason: e.to_string(),
                    });
                }
            }
        }
        self.release_session().await;
    }

    async fn release_session(&mut self) {
        if !self.session_enabled {
            return;
        }
        self.session_enabled = false;

        match self.platform.disable_background_session().await {
            Ok(()) => debug!("Background session disabled"),
            Err(e) => {
                warn!("Failed to disable background session: {}", e);
                self.emit(BackgroundEvent::BackgroundTaskFailed {
                    reason: e.to_string(),
                });
            }
        }
    }

    fn emit(&self, event: BackgroundEvent) {
        self.shared.events.publish(event);
    }
}
