//! Signal handling for the `record` command
//!
//! Ctrl+C (and SIGTERM on Unix) stops the recording; SIGUSR1 toggles
//! pause so a window-manager keybinding can drive a running recorder.

use colored::Colorize;
use tokio::sync::mpsc;
use tracing::debug;

/// Requests coming from the OS
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderSignal {
    /// Finalize the recording (SIGINT/SIGTERM)
    Stop,
    /// Pause if recording, resume if paused (SIGUSR1)
    TogglePause,
}

/// Recorder signal handler
///
/// Listens for OS signals on background tasks and delivers them, in
/// arrival order, through a channel.
pub struct RecorderSignalHandler {
    receiver: mpsc::Receiver<RecorderSignal>,
}

impl RecorderSignalHandler {
    /// Create the handler and start listening.
    pub async fn new() -> Result<Self, std::io::Error> {
        let (tx, rx) = mpsc::channel(10);

        // Ctrl+C works on every platform
        let tx_int = tx.clone();
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("{} Received Ctrl+C (stop)", "↓".cyan());
                if tx_int.send(RecorderSignal::Stop).await.is_err() {
                    break;
                }
            }
        });

        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            let tx_term = tx.clone();
            let mut sigterm = signal(SignalKind::terminate())?;
            tokio::spawn(async move {
                while sigterm.recv().await.is_some() {
                    debug!("SIGTERM received");
                    if tx_term.send(RecorderSignal::Stop).await.is_err() {
                        break;
                    }
                }
            });

            let tx_usr1 = tx.clone();
            let mut sigusr1 = signal(SignalKind::user_defined1())?;
            tokio::spawn(async move {
                while sigusr1.recv().await.is_some() {
                    debug!("SIGUSR1 received");
                    if tx_usr1.send(RecorderSignal::TogglePause).await.is_err() {
                        break;
                    }
                }
            });
        }

        drop(tx);
        Ok(Self { receiver: rx })
    }

    /// Wait for the next signal
    pub async fn recv(&mut self) -> Option<RecorderSignal> {
        self.receiver.recv().await
    }
}
