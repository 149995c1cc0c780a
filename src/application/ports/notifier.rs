//! Notification port interface

use async_trait::async_trait;
use thiserror::Error;

/// Notification errors
#[derive(Debug, Clone, Error)]
pub enum NotificationError {
    #[error("Failed to show notification: {0}")]
    SendFailed(String),

    #[error("Failed to dismiss notification: {0}")]
    DismissFailed(String),
}

/// Notification icon types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationIcon {
    Info,
    Warning,
    Recording,
    Paused,
}

impl NotificationIcon {
    /// Get the freedesktop icon name
    pub const fn icon_name(&self) -> &'static str {
        match self {
            Self::Info => "dialog-information",
            Self::Warning => "dialog-warning",
            Self::Recording => "audio-input-microphone",
            Self::Paused => "media-playback-pause",
        }
    }
}

/// Port for user-visible indicators (desktop notification, foreground
/// service notification)
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Show (or replace) the ongoing indicator.
    async fn notify(
        &self,
        title: &str,
        message: &str,
        icon: NotificationIcon,
    ) -> Result<(), NotificationError>;

    /// Remove the ongoing indicator if one is shown.
    async fn dismiss(&self) -> Result<(), NotificationError>;
}

/// Blanket implementation for boxed notifier types
#[async_trait]
impl Notifier for Box<dyn Notifier> {
    async fn notify(
        &self,
        title: &str,
        message: &str,
        icon: NotificationIcon,
    ) -> Result<(), NotificationError> {
        self.as_ref().notify(title, message, icon).await
    }

    async fn dismiss(&self) -> Result<(), NotificationError> {
        self.as_ref().dismiss().await
    }
}
