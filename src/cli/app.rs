//! Command runners for `record`, `formats` and `limitations`

use std::process::ExitCode;

use serde_json::json;
use tracing::{debug, info, warn};

use crate::application::ports::{ConfigStore, NotificationIcon, Notifier};
use crate::application::{
    CompletedRecording, ControllerSettings, SessionController, SessionError, SessionEvent,
    SessionEvents,
};
use crate::domain::background::BackgroundProfile;
use crate::domain::config::AppConfig;
use crate::domain::recording::{format_clock, AudioFormat, Duration, QualityTier, RecordingState};
use crate::infrastructure::{create_capture_engine, create_notifier, XdgConfigStore};

use super::args::{PlatformArg, RecordArgs};
use super::presenter::{format_file_size, Presenter};
use super::signals::{RecorderSignal, RecorderSignalHandler};

/// Exit codes
pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_ERROR: u8 = 1;
pub const EXIT_USAGE_ERROR: u8 = 2;

/// Translate `record` flags into a partial config for merging
pub fn record_args_config(args: &RecordArgs) -> AppConfig {
    AppConfig {
        output_dir: args
            .output_dir
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned()),
        format: args.format.map(|f| AudioFormat::from(f).to_string()),
        quality: args.quality.map(|q| QualityTier::from(q).to_string()),
        channels: args.channels,
        recording_limit: args.limit.clone(),
        notify: if args.notify { Some(true) } else { None },
        ..Default::default()
    }
}

/// Load and merge configuration from file and CLI
pub async fn load_merged_config<S: ConfigStore>(store: &S, cli_config: AppConfig) -> AppConfig {
    let file_config = match store.load().await {
        Ok(config) => config,
        Err(e) => {
            warn!(error = %e, "Ignoring unreadable config file");
            AppConfig::empty()
        }
    };

    // Merge: defaults < file < cli
    AppConfig::defaults().merge(file_config).merge(cli_config)
}

/// Record from the default input device until stopped
pub async fn run_record(args: RecordArgs) -> ExitCode {
    let mut presenter = Presenter::new();
    let store = XdgConfigStore::new();
    let config = load_merged_config(&store, record_args_config(&args)).await;

    if let Some(limit) = config.recording_limit.as_deref() {
        if let Err(e) = limit.parse::<Duration>() {
            presenter.error(&format!("Invalid recording limit: {}", e));
            return ExitCode::from(EXIT_USAGE_ERROR);
        }
    }

    let recording_config = config.recording_configuration(&store.default_output_dir());
    let settings = ControllerSettings {
        waveform_capacity: config.waveform_capacity_or_default(),
        ..Default::default()
    };

    let controller = match SessionController::spawn(create_capture_engine(), settings).await {
        Ok(controller) => controller,
        Err(e) => {
            presenter.error(&e.to_string());
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let mut signals = match RecorderSignalHandler::new().await {
        Ok(handler) => handler,
        Err(e) => {
            presenter.error(&format!("Failed to setup signal handler: {}", e));
            controller.dispose().await;
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let notifier = create_notifier(config.notify_or_default());
    let mut events = controller.subscribe();

    let session = match controller
        .start_recording(recording_config, args.name.clone())
        .await
    {
        Ok(session) => session,
        Err(e) => {
            presenter.error(&e.to_string());
            controller.dispose().await;
            return ExitCode::from(EXIT_ERROR);
        }
    };

    info!(session_id = %session.id(), "Recording started");
    show_indicator(notifier.as_ref(), RecordingState::Recording).await;
    if !args.json {
        let status = presenter.format_status(&session);
        presenter.start_spinner(&status);
    }

    let outcome = record_loop(
        &controller,
        &mut events,
        &mut signals,
        notifier.as_ref(),
        &presenter,
        args.json,
    )
    .await;

    if let Err(e) = notifier.dismiss().await {
        debug!(error = %e, "Failed to dismiss indicator");
    }
    controller.dispose().await;

    match outcome {
        Ok(completed) => {
            report_completed(&mut presenter, &completed, args.json);
            ExitCode::from(EXIT_SUCCESS)
        }
        Err(message) => {
            presenter.spinner_fail("Recording failed");
            presenter.error(&message);
            ExitCode::from(EXIT_ERROR)
        }
    }
}

async fn record_loop(
    controller: &SessionController,
    events: &mut SessionEvents,
    signals: &mut RecorderSignalHandler,
    notifier: &dyn Notifier,
    presenter: &Presenter,
    json_output: bool,
) -> Result<CompletedRecording, String> {
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(SessionEvent::Updated(session)) => {
                    if json_output {
                        match serde_json::to_string(&session) {
                            Ok(line) => presenter.output(&line),
                            Err(e) => debug!(error = %e, "Failed to serialize snapshot"),
                        }
                    } else {
                        presenter.update_spinner(&presenter.format_status(&session));
                    }
                }
                Some(SessionEvent::Completed(completed)) => return Ok(completed),
                Some(SessionEvent::Failed { message, .. }) => return Err(message),
                Some(SessionEvent::Cleared) => {}
                None => return Err(SessionError::ControllerClosed.to_string()),
            },
            Some(signal) = signals.recv() => match signal {
                RecorderSignal::Stop => {
                    match controller.stop_recording().await {
                        Ok(completed) => return Ok(completed),
                        // Already finalizing on its own; the Completed event follows
                        Err(SessionError::NoActiveRecording) => {}
                        Err(e) => return Err(e.to_string()),
                    }
                }
                RecorderSignal::TogglePause => {
                    let result = match controller.state() {
                        RecordingState::Recording => controller.pause_recording().await,
                        RecordingState::Paused => controller.resume_recording().await,
                        state => {
                            debug!(%state, "Ignoring pause toggle");
                            continue;
                        }
                    };
                    match result {
                        Ok(session) => show_indicator(notifier, session.state()).await,
                        Err(e) => presenter.warn(&e.to_string()),
                    }
                }
            },
        }
    }
}

async fn show_indicator(notifier: &dyn Notifier, state: RecordingState) {
    let (message, icon) = match state {
        RecordingState::Paused => ("Recording paused", NotificationIcon::Paused),
        _ => ("Recording in progress", NotificationIcon::Recording),
    };
    if let Err(e) = notifier.notify("SmartRecorder", message, icon).await {
        debug!(error = %e, "Failed to show indicator");
    }
}

fn report_completed(presenter: &mut Presenter, completed: &CompletedRecording, json_output: bool) {
    if json_output {
        let summary = json!({
            "session_id": completed.session_id.to_string(),
            "path": completed.path,
            "duration_ms": completed.duration.as_millis(),
            "file_size": completed.file_size,
            "reason": completed.reason,
        });
        presenter.output(&summary.to_string());
        return;
    }

    presenter.spinner_success(&format!(
        "Recorded {} ({})",
        format_clock(completed.duration),
        format_file_size(completed.file_size)
    ));
    presenter.output(&completed.path.to_string_lossy());
}

/// List every output format and whether the local engine can produce it
pub fn run_formats() -> ExitCode {
    let presenter = Presenter::new();
    let supported = create_capture_engine().supported_formats();

    for format in AudioFormat::ALL {
        let status = if supported.contains(&format) {
            "supported"
        } else {
            "unsupported"
        };
        presenter.key_value(format.as_str(), &format!("{} ({})", status, format.mime_type()));
    }

    ExitCode::from(EXIT_SUCCESS)
}

/// Describe what a platform allows while the app is backgrounded
pub fn run_limitations(platform: Option<PlatformArg>) -> ExitCode {
    let presenter = Presenter::new();
    let profile = platform
        .map(BackgroundProfile::from)
        .unwrap_or_else(BackgroundProfile::current);
    let limits = profile.limitations();

    presenter.key_value("platform", profile.as_str());
    presenter.key_value(
        "max_background_time",
        &limits
            .max_background_time
            .map(|d| d.to_string())
            .unwrap_or_else(|| "unlimited".to_string()),
    );
    presenter.key_value(
        "requires_active_audio_session",
        &limits.requires_active_audio_session.to_string(),
    );
    presenter.key_value(
        "supports_infinite_background",
        &limits.supports_infinite_background.to_string(),
    );
    presenter.key_value(
        "requires_user_visible",
        &limits.requires_user_visible.to_string(),
    );
    for (key, value) in &limits.platform_specific {
        presenter.key_value(key, value);
    }

    ExitCode::from(EXIT_SUCCESS)
}
