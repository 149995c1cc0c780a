//! Cross-platform notification adapter using notify-rust
//!
//! Works on Windows, macOS, and Linux. Dismissal is only supported where
//! the notification server hands back a handle (freedesktop).

use std::sync::Mutex;

use async_trait::async_trait;
use tracing::debug;

use crate::application::ports::{NotificationError, NotificationIcon, Notifier};

#[cfg(all(unix, not(target_os = "macos")))]
type ShownHandle = notify_rust::NotificationHandle;
#[cfg(not(all(unix, not(target_os = "macos"))))]
type ShownHandle = ();

/// Cross-platform notifier using notify-rust
pub struct NotifyRustNotifier {
    /// Application name for notifications
    app_name: String,
    /// Handle of the indicator currently on screen
    shown: Mutex<Option<ShownHandle>>,
}

impl NotifyRustNotifier {
    /// Create a new notify-rust notifier
    pub fn new() -> Self {
        Self::with_app_name("SmartRecorder")
    }

    /// Create with custom app name
    pub fn with_app_name(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            shown: Mutex::new(None),
        }
    }

    fn take_shown(&self) -> Option<ShownHandle> {
        self.shown.lock().unwrap_or_else(|e| e.into_inner()).take()
    }
}

impl Default for NotifyRustNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Notifier for NotifyRustNotifier {
    async fn notify(
        &self,
        title: &str,
        message: &str,
        icon: NotificationIcon,
    ) -> Result<(), NotificationError> {
        // Replace rather than stack indicators.
        self.dismiss().await?;

        let title = title.to_owned();
        let message = message.to_owned();
        let app_name = self.app_name.clone();
        let icon_name = icon.icon_name().to_string();

        // notify-rust operations can block, so run in spawn_blocking
        let handle = tokio::task::spawn_blocking(move || {
            let mut notification = notify_rust::Notification::new();
            notification
                .appname(&app_name)
                .summary(&title)
                .body(&message)
                .icon(&icon_name);

            #[cfg(all(unix, not(target_os = "macos")))]
            {
                notification.show()
            }
            #[cfg(not(all(unix, not(target_os = "macos"))))]
            {
                notification.show().map(|_| ())
            }
        })
        .await
        .map_err(|e| NotificationError::SendFailed(format!("Task join error: {}", e)))?
        .map_err(|e| NotificationError::SendFailed(e.to_string()))?;

        *self.shown.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
        Ok(())
    }

    async fn dismiss(&self) -> Result<(), NotificationError> {
        let Some(handle) = self.take_shown() else {
            return Ok(());
        };

        #[cfg(all(unix, not(target_os = "macos")))]
        tokio::task::spawn_blocking(move || handle.close())
            .await
            .map_err(|e| NotificationError::DismissFailed(format!("Task join error: {}", e)))?;

        #[cfg(not(all(unix, not(target_os = "macos"))))]
        let () = handle;

        debug!("Notification dismissed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notifier_with_custom_app_name() {
        let notifier = NotifyRustNotifier::with_app_name("TestApp");
        assert_eq!(notifier.app_name, "TestApp");
    }

    #[test]
    fn notifier_default_app_name() {
        let notifier = NotifyRustNotifier::default();
        assert_eq!(notifier.app_name, "SmartRecorder");
    }

    #[tokio::test]
    async fn dismiss_without_notification_is_noop() {
        let notifier = NotifyRustNotifier::new();
        assert!(notifier.dismiss().await.is_ok());
    }
}
