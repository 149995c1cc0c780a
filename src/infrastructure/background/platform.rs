//! Platform background-execution adapter
//!
//! One adapter serves every platform family: the [`BackgroundProfile`]
//! supplies the rules (time budget, audio session, visible indicator) and a
//! [`BackgroundHost`] supplies the native primitive behind them.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::application::ports::{BackgroundError, BackgroundPlatform, NotificationIcon, Notifier};
use crate::domain::background::{BackgroundLimitations, BackgroundProfile};

const DEFAULT_TITLE: &str = "Recording in progress";
const DEFAULT_MESSAGE: &str = "Audio recording continues in the background";

/// Native keep-alive primitive (foreground service, background task,
/// page keep-alive)
#[async_trait]
pub trait BackgroundHost: Send + Sync {
    async fn begin_task(&self, session_id: Uuid) -> Result<(), BackgroundError>;

    async fn end_task(&self) -> Result<(), BackgroundError>;

    /// Activate or deactivate the audio session that keeps capture alive
    async fn set_audio_session_active(&self, active: bool) -> Result<(), BackgroundError>;

    async fn permission_granted(&self) -> Result<bool, BackgroundError>;

    async fn request_permission(&self) -> Result<bool, BackgroundError>;
}

/// Desktop processes keep running when their window is hidden
pub struct DesktopHost;

#[async_trait]
impl BackgroundHost for DesktopHost {
    async fn begin_task(&self, _session_id: Uuid) -> Result<(), BackgroundError> {
        Ok(())
    }

    async fn end_task(&self) -> Result<(), BackgroundError> {
        Ok(())
    }

    async fn set_audio_session_active(&self, _active: bool) -> Result<(), BackgroundError> {
        Ok(())
    }

    async fn permission_granted(&self) -> Result<bool, BackgroundError> {
        Ok(true)
    }

    async fn request_permission(&self) -> Result<bool, BackgroundError> {
        Ok(true)
    }
}

/// [`BackgroundPlatform`] implementation driven by a profile
pub struct PlatformBackground<H: BackgroundHost> {
    profile: BackgroundProfile,
    host: H,
    notifier: Box<dyn Notifier>,
    /// Show the indicator even where the platform does not demand one
    always_notify: bool,
    session_active: AtomicBool,
    task_active: AtomicBool,
}

impl<H: BackgroundHost> PlatformBackground<H> {
    pub fn new(profile: BackgroundProfile, host: H, notifier: Box<dyn Notifier>) -> Self {
        Self {
            profile,
            host,
            notifier,
            always_notify: false,
            session_active: AtomicBool::new(false),
            task_active: AtomicBool::new(false),
        }
    }

    pub fn with_notifications(mut self, always: bool) -> Self {
        self.always_notify = always;
        self
    }

    pub fn profile(&self) -> BackgroundProfile {
        self.profile
    }

    pub fn is_task_active(&self) -> bool {
        self.task_active.load(Ordering::SeqCst)
    }
}

impl PlatformBackground<DesktopHost> {
    pub fn desktop(notifier: Box<dyn Notifier>) -> Self {
        Self::new(BackgroundProfile::Desktop, DesktopHost, notifier)
    }
}

#[async_trait]
impl<H: BackgroundHost> BackgroundPlatform for PlatformBackground<H> {
    async fn enable_background_session(&self) -> Result<(), BackgroundError> {
        if self.profile.limitations().requires_active_audio_session {
            self.host.set_audio_session_active(true).await?;
        }
        self.session_active.store(true, Ordering::SeqCst);
        debug!(profile = %self.profile, "Background session enabled");
        Ok(())
    }

    async fn disable_background_session(&self) -> Result<(), BackgroundError> {
        if self.is_task_active() {
            self.stop_background_task().await?;
        }
        if self.session_active.swap(false, Ordering::SeqCst)
            && self.profile.limitations().requires_active_audio_session
        {
            self.host.set_audio_session_active(false).await?;
        }
        debug!(profile = %self.profile, "Background session disabled");
        Ok(())
    }

    fn is_background_session_active(&self) -> bool {
        self.session_active.load(Ordering::SeqCst)
    }

    async fn start_background_task(
        &self,
        session_id: Uuid,
        title: Option<&str>,
        message: Option<&str>,
    ) -> Result<(), BackgroundError> {
        let limitations = self.profile.limitations();
        if limitations.requires_active_audio_session && !self.is_background_session_active() {
            return Err(BackgroundError::SessionNotEnabled);
        }
        if !self.host.permission_granted().await? {
            return Err(BackgroundError::PermissionDenied);
        }
        if self.is_task_active() {
            debug!("Background task already running");
            return Ok(());
        }

        self.host.begin_task(session_id).await?;

        if limitations.requires_user_visible || self.always_notify {
            let shown = self
                .notifier
                .notify(
                    title.unwrap_or(DEFAULT_TITLE),
                    message.unwrap_or(DEFAULT_MESSAGE),
                    NotificationIcon::Recording,
                )
                .await;
            match shown {
                Ok(()) => {}
                Err(e) if limitations.requires_user_visible => {
                    // The platform would kill a service without its indicator.
                    if let Err(end_err) = self.host.end_task().await {
                        warn!("Failed to end task after indicator failure: {}", end_err);
                    }
                    return Err(BackgroundError::TaskStartFailed(e.to_string()));
                }
                Err(e) => warn!("Recording indicator not shown: {}", e),
            }
        }

        self.task_active.store(true, Ordering::SeqCst);
        info!(profile = %self.profile, session_id = %session_id, "Background task running");
        Ok(())
    }

    async fn stop_background_task(&self) -> Result<(), BackgroundError> {
        if !self.task_active.swap(false, Ordering::SeqCst) {
            return Ok(());
        }

        if let Err(e) = self.notifier.dismiss().await {
            warn!("Failed to dismiss recording indicator: {}", e);
        }
        self.host
            .end_task()
            .await
            .map_err(|e| BackgroundError::TaskStopFailed(e.to_string()))?;

        info!(profile = %self.profile, "Background task ended");
        Ok(())
    }

    async fn request_background_permissions(&self) -> Result<bool, BackgroundError> {
        self.host.request_permission().await
    }

    async fn has_background_permissions(&self) -> Result<bool, BackgroundError> {
        self.host.permission_granted().await
    }

    fn background_limitations(&self) -> BackgroundLimitations {
        self.profile.limitations()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::NotificationError;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct RecordingHost {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl BackgroundHost for Arc<RecordingHost> {
        async fn begin_task(&self, _: Uuid) -> Result<(), BackgroundError> {
            self.calls.lock().unwrap().push("begin".into());
            Ok(())
        }
        async fn end_task(&self) -> Result<(), BackgroundError> {
            self.calls.lock().unwrap().push("end".into());
            Ok(())
        }
        async fn set_audio_session_active(&self, active: bool) -> Result<(), BackgroundError> {
            self.calls.lock().unwrap().push(format!("audio:{active}"));
            Ok(())
        }
        async fn permission_granted(&self) -> Result<bool, BackgroundError> {
            Ok(true)
        }
        async fn request_permission(&self) -> Result<bool, BackgroundError> {
            Ok(true)
        }
    }

    struct ScriptedNotifier {
        fail: bool,
        shown: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Notifier for ScriptedNotifier {
        async fn notify(
            &self,
            title: &str,
            _: &str,
            _: NotificationIcon,
        ) -> Result<(), NotificationError> {
            if self.fail {
                return Err(NotificationError::SendFailed("no server".into()));
            }
            self.shown.lock().unwrap().push(title.to_string());
            Ok(())
        }
        async fn dismiss(&self) -> Result<(), NotificationError> {
            self.shown.lock().unwrap().push("dismissed".into());
            Ok(())
        }
    }

    fn notifier(fail: bool) -> (Box<dyn Notifier>, Arc<Mutex<Vec<String>>>) {
        let shown = Arc::new(Mutex::new(Vec::new()));
        (
            Box::new(ScriptedNotifier {
                fail,
                shown: Arc::clone(&shown),
            }),
            shown,
        )
    }

    #[tokio::test]
    async fn android_shows_indicator_for_task() {
        let host = Arc::new(RecordingHost::default());
        let (notifier, shown) = notifier(false);
        let platform = PlatformBackground::new(BackgroundProfile::Android, Arc::clone(&host), notifier);

        platform
            .start_background_task(Uuid::new_v4(), Some("Recording"), None)
            .await
            .unwrap();
        assert!(platform.is_task_active());
        platform.stop_background_task().await.unwrap();

        assert_eq!(*shown.lock().unwrap(), vec!["Recording", "dismissed"]);
        assert_eq!(*host.calls.lock().unwrap(), vec!["begin", "end"]);
    }

    #[tokio::test]
    async fn android_task_fails_without_indicator() {
        let host = Arc::new(RecordingHost::default());
        let (notifier, _) = notifier(true);
        let platform = PlatformBackground::new(BackgroundProfile::Android, Arc::clone(&host), notifier);

        let err = platform
            .start_background_task(Uuid::new_v4(), None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, BackgroundError::TaskStartFailed(_)));
        assert!(!platform.is_task_active());
        assert_eq!(*host.calls.lock().unwrap(), vec!["begin", "end"]);
    }

    #[tokio::test]
    async fn ios_needs_audio_session_first() {
        let host = Arc::new(RecordingHost::default());
        let (notifier, _) = notifier(false);
        let platform = PlatformBackground::new(BackgroundProfile::Ios, Arc::clone(&host), notifier);

        let err = platform
            .start_background_task(Uuid::new_v4(), None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, BackgroundError::SessionNotEnabled));

        platform.enable_background_session().await.unwrap();
        platform
            .start_background_task(Uuid::new_v4(), None, None)
            .await
            .unwrap();
        platform.disable_background_session().await.unwrap();

        assert_eq!(
            *host.calls.lock().unwrap(),
            vec!["audio:true", "begin", "end", "audio:false"]
        );
    }

    #[tokio::test]
    async fn desktop_is_silent_by_default() {
        let (notifier, shown) = notifier(false);
        let platform = PlatformBackground::desktop(notifier);

        platform
            .start_background_task(Uuid::new_v4(), None, None)
            .await
            .unwrap();
        assert!(shown.lock().unwrap().is_empty());
        assert!(platform.background_limitations().max_background_time.is_none());
        assert!(platform.has_background_permissions().await.unwrap());
    }

    #[tokio::test]
    async fn stop_without_task_is_noop() {
        let (notifier, shown) = notifier(false);
        let platform = PlatformBackground::desktop(notifier).with_notifications(true);
        platform.stop_background_task().await.unwrap();
        assert!(shown.lock().unwrap().is_empty());
    }
}
