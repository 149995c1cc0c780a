//! App lifecycle bridge

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::background::BackgroundCoordinator;
use crate::domain::background::{AppLifecycleState, AppVisibility};

/// Maps raw lifecycle signals to visibility changes and forwards them, in
/// order, to a [`BackgroundCoordinator`].
///
/// `notify` never blocks the host's lifecycle callback; the coordinator is
/// driven from the observer's own task.
pub struct LifecycleObserver {
    signals: mpsc::UnboundedSender<AppLifecycleState>,
    task: JoinHandle<()>,
}

impl LifecycleObserver {
    pub fn spawn(coordinator: BackgroundCoordinator) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<AppLifecycleState>();

        let task = tokio::spawn(async move {
            let mut last = AppVisibility::Foreground;
            while let Some(signal) = rx.recv().await {
                let Some(visibility) = signal.visibility() else {
                    debug!(?signal, "Transitional lifecycle signal ignored");
                    continue;
                };
                if visibility == last {
                    continue;
                }
                last = visibility;

                debug!(?signal, ?visibility, "Lifecycle visibility change");
                if let Err(e) = coordinator.handle_visibility(visibility).await {
                    warn!("Background coordinator unavailable: {}", e);
                    break;
                }
            }
        });

        Self { signals: tx, task }
    }

    /// Report a lifecycle signal from the host application.
    pub fn notify(&self, state: AppLifecycleState) {
        if self.signals.send(state).is_err() {
            debug!(?state, "Lifecycle observer already stopped");
        }
    }

    /// Stop observing after every queued signal has been forwarded.
    pub async fn shutdown(self) {
        drop(self.signals);
        if let Err(e) = self.task.await {
            warn!("Lifecycle observer task failed: {}", e);
        }
    }
}
