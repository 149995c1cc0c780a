//! Background execution port interface

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::background::BackgroundLimitations;

/// Background execution errors
#[derive(Debug, Clone, Error)]
pub enum BackgroundError {
    #[error("Background execution permission not granted")]
    PermissionDenied,

    #[error("Background session is not enabled")]
    SessionNotEnabled,

    #[error("Failed to start background task: {0}")]
    TaskStartFailed(String),

    #[error("Failed to stop background task: {0}")]
    TaskStopFailed(String),

    #[error("Platform background API failed: {0}")]
    PlatformFailure(String),
}

/// Platform background-execution capabilities
/// (foreground service, background task, background audio session).
#[async_trait]
pub trait BackgroundPlatform: Send + Sync {
    /// Opt in to keeping capture alive while backgrounded.
    async fn enable_background_session(&self) -> Result<(), BackgroundError>;

    async fn disable_background_session(&self) -> Result<(), BackgroundError>;

    fn is_background_session_active(&self) -> bool;

    /// Ask the platform to keep the process alive for `session_id`.
    ///
    /// # Arguments
    /// * `title` / `message` - Text for the user-visible indicator on
    ///   platforms that require one
    async fn start_background_task(
        &self,
        session_id: Uuid,
        title: Option<&str>,
        message: Option<&str>,
    ) -> Result<(), BackgroundError>;

    async fn stop_background_task(&self) -> Result<(), BackgroundError>;

    async fn request_background_permissions(&self) -> Result<bool, BackgroundError>;

    async fn has_background_permissions(&self) -> Result<bool, BackgroundError>;

    fn background_limitations(&self) -> BackgroundLimitations;
}

#[async_trait]
impl BackgroundPlatform for Box<dyn BackgroundPlatform> {
    async fn enable_background_session(&self) -> Result<(), BackgroundError> {
        self.as_ref().enable_background_session().await
    }

    async fn disable_background_session(&self) -> Result<(), BackgroundError> {
        self.as_ref().disable_background_session().await
    }

    fn is_background_session_active(&self) -> bool {
        self.as_ref().is_background_session_active()
    }

    async fn start_background_task(
        &self,
        session_id: Uuid,
        title: Option<&str>,
        message: Option<&str>,
    ) -> Result<(), BackgroundError> {
        self.as_ref()
            .start_background_task(session_id, title, message)
            .await
    }

    async fn stop_background_task(&self) -> Result<(), BackgroundError> {
        self.as_ref().stop_background_task().await
    }

    async fn request_background_permissions(&self) -> Result<bool, BackgroundError> {
        self.as_ref().request_background_permissions().await
    }

    async fn has_background_permissions(&self) -> Result<bool, BackgroundError> {
        self.as_ref().has_background_permissions().await
    }

    fn background_limitations(&self) -> BackgroundLimitations {
        self.as_ref().background_limitations()
    }
}
