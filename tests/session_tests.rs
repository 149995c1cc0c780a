//! Session controller behaviour over a scripted capture engine

mod common;

use std::sync::atomic::Ordering;
use std::time::Duration as StdDuration;

use tokio::time::timeout;

use common::{controller, controller_with, settle, sleep_ms, wav_config};
use smart_recorder::application::{SessionError, SessionEvent, SessionEvents};
use smart_recorder::domain::recording::{AudioFormat, Duration, RecordingState, StopReason};

fn drain(events: &mut SessionEvents) -> Vec<SessionEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

#[tokio::test(start_paused = true)]
async fn start_then_stop_produces_verified_file() {
    let dir = tempfile::tempdir().unwrap();
    let (controller, _probe) = controller().await;

    let session = controller
        .start_recording(wav_config(dir.path()), Some("standup".into()))
        .await
        .unwrap();
    assert_eq!(session.state(), RecordingState::Recording);
    assert_eq!(
        session.file_path(),
        Some(dir.path().join("standup.wav").as_path())
    );

    sleep_ms(2500).await;
    let completed = controller.stop_recording().await.unwrap();

    assert_eq!(completed.session_id, session.id());
    assert_eq!(completed.reason, StopReason::Manual);
    assert!(completed.path.exists());
    assert!(completed.file_size > 0);
    assert!(completed.duration >= Duration::from_secs(2));
    assert!(completed.duration < Duration::from_secs(3));

    let snapshot = controller.session().unwrap();
    assert_eq!(snapshot.state(), RecordingState::Stopped);
    assert_eq!(snapshot.file_size(), Some(completed.file_size));
    assert!(snapshot.end_time().is_some());
}

#[tokio::test(start_paused = true)]
async fn first_events_are_initializing_then_recording() {
    let dir = tempfile::tempdir().unwrap();
    let (controller, _probe) = controller().await;
    let mut events = controller.subscribe();

    controller
        .start_recording(wav_config(dir.path()), None)
        .await
        .unwrap();

    let states: Vec<RecordingState> = drain(&mut events)
        .into_iter()
        .filter_map(|e| match e {
            SessionEvent::Updated(s) => Some(s.state()),
            _ => None,
        })
        .collect();
    assert_eq!(
        states,
        vec![RecordingState::Initializing, RecordingState::Recording]
    );
}

#[tokio::test(start_paused = true)]
async fn duration_never_decreases_and_freezes_while_paused() {
    let dir = tempfile::tempdir().unwrap();
    let (controller, _probe) = controller().await;
    let mut events = controller.subscribe();

    controller
        .start_recording(wav_config(dir.path()), None)
        .await
        .unwrap();
    sleep_ms(2500).await;

    let paused = controller.pause_recording().await.unwrap();
    let frozen = paused.duration();
    assert_eq!(paused.state(), RecordingState::Paused);
    assert!(frozen >= Duration::from_secs(2));

    sleep_ms(5000).await;
    assert_eq!(controller.session().unwrap().duration(), frozen);

    let resumed = controller.resume_recording().await.unwrap();
    assert_eq!(resumed.duration(), frozen);

    sleep_ms(1500).await;
    let later = controller.session().unwrap().duration();
    assert!(later > frozen);
    assert!(later < frozen + Duration::from_secs(2));

    let durations: Vec<Duration> = drain(&mut events)
        .into_iter()
        .filter_map(|e| match e {
            SessionEvent::Updated(s) => Some(s.duration()),
            _ => None,
        })
        .collect();
    assert!(durations.windows(2).all(|w| w[0] <= w[1]));
}

#[tokio::test(start_paused = true)]
async fn cancel_removes_partial_file() {
    let dir = tempfile::tempdir().unwrap();
    let (controller, probe) = controller().await;

    let session = controller
        .start_recording(wav_config(dir.path()), None)
        .await
        .unwrap();
    let path = session.file_path().unwrap().to_path_buf();
    assert!(path.exists());

    controller.cancel_recording().await.unwrap();

    assert!(!path.exists());
    assert_eq!(probe.cancel_calls.load(Ordering::SeqCst), 1);
    let snapshot = controller.session().unwrap();
    assert_eq!(snapshot.state(), RecordingState::Stopped);
    assert_eq!(snapshot.stop_reason(), Some(StopReason::Cancelled));
    assert!(snapshot.file_path().is_none());
}

#[tokio::test(start_paused = true)]
async fn recording_limit_stops_within_one_tick() {
    let dir = tempfile::tempdir().unwrap();
    let (controller, _probe) = controller().await;
    let mut events = controller.subscribe();

    let config = wav_config(dir.path()).with_recording_limit(Some(Duration::from_secs(3)));
    controller.start_recording(config, None).await.unwrap();

    let completed = timeout(StdDuration::from_secs(5), async {
        loop {
            match events.recv().await {
                Some(SessionEvent::Completed(completed)) => return completed,
                Some(_) => continue,
                None => panic!("event stream closed"),
            }
        }
    })
    .await
    .expect("limit should stop the recording");

    assert_eq!(completed.reason, StopReason::RecordingLimit);
    assert!(completed.duration >= Duration::from_secs(3));
    assert!(completed.duration < Duration::from_secs(4));
    assert_eq!(controller.state(), RecordingState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn paused_time_does_not_count_toward_limit() {
    let dir = tempfile::tempdir().unwrap();
    let (controller, _probe) = controller().await;

    let config = wav_config(dir.path()).with_recording_limit(Some(Duration::from_secs(3)));
    controller.start_recording(config, None).await.unwrap();
    sleep_ms(1500).await;
    controller.pause_recording().await.unwrap();

    sleep_ms(10_000).await;
    assert_eq!(controller.state(), RecordingState::Paused);

    // Ticks land 1s and 2s after resuming: 2.5s then 3.5s of active time
    controller.resume_recording().await.unwrap();
    sleep_ms(500).await;
    assert_eq!(controller.state(), RecordingState::Recording);

    sleep_ms(2000).await;
    assert_eq!(controller.state(), RecordingState::Stopped);
    assert_eq!(
        controller.session().unwrap().stop_reason(),
        Some(StopReason::RecordingLimit)
    );
}

#[tokio::test(start_paused = true)]
async fn waveform_is_capped_and_clamped() {
    let dir = tempfile::tempdir().unwrap();
    let (controller, probe) = controller_with(10).await;
    *probe.level.lock().unwrap() = 3.0;

    controller
        .start_recording(wav_config(dir.path()), None)
        .await
        .unwrap();
    sleep_ms(3000).await;

    let session = controller.session().unwrap();
    assert_eq!(session.waveform_data().len(), 10);
    assert!(session.waveform_data().iter().all(|s| s == 1.0));
    assert_eq!(session.current_amplitude(), 1.0);
}

#[tokio::test(start_paused = true)]
async fn second_start_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let (controller, _probe) = controller().await;

    let first = controller
        .start_recording(wav_config(dir.path()), None)
        .await
        .unwrap();
    let err = controller
        .start_recording(wav_config(dir.path()), None)
        .await
        .unwrap_err();

    assert!(matches!(err, SessionError::AlreadyRecording));
    assert_eq!(controller.session().unwrap().id(), first.id());
}

#[tokio::test(start_paused = true)]
async fn start_during_initialization_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let (controller, probe) = controller().await;
    probe.hold_start.store(true, Ordering::SeqCst);

    let (first, second, ()) = tokio::join!(
        controller.start_recording(wav_config(dir.path()), Some("first".into())),
        controller.start_recording(wav_config(dir.path()), Some("second".into())),
        async {
            settle().await;
            assert_eq!(controller.state(), RecordingState::Initializing);
            probe.start_gate.notify_one();
        }
    );

    let first = first.unwrap();
    assert!(matches!(second, Err(SessionError::AlreadyRecording)));

    let current = controller.session().unwrap();
    assert_eq!(current.id(), first.id());
    assert_eq!(current.state(), RecordingState::Recording);
    assert_eq!(
        current.file_path(),
        Some(dir.path().join("first.wav").as_path())
    );
    assert!(!dir.path().join("second.wav").exists());
}

#[tokio::test(start_paused = true)]
async fn capture_failure_mid_recording_moves_session_to_error() {
    let dir = tempfile::tempdir().unwrap();
    let (controller, probe) = controller().await;
    let mut events = controller.subscribe();

    controller
        .start_recording(wav_config(dir.path()), None)
        .await
        .unwrap();
    sleep_ms(1500).await;
    *probe.failure.lock().unwrap() = Some("input device unplugged".into());
    sleep_ms(1000).await;

    let failed = controller.session().unwrap();
    assert_eq!(failed.state(), RecordingState::Error);
    assert!(failed
        .error_message()
        .unwrap()
        .contains("input device unplugged"));
    assert_eq!(probe.cancel_calls.load(Ordering::SeqCst), 1);
    assert!(!probe.capturing.load(Ordering::SeqCst));
    assert!(drain(&mut events)
        .iter()
        .any(|e| matches!(e, SessionEvent::Failed { .. })));

    // Timers are gone: the duration stays put and there is nothing to stop
    sleep_ms(3000).await;
    assert_eq!(controller.session().unwrap().duration(), failed.duration());
    assert!(matches!(
        controller.stop_recording().await,
        Err(SessionError::NoActiveRecording)
    ));
}

#[tokio::test(start_paused = true)]
async fn start_is_rejected_while_paused() {
    let dir = tempfile::tempdir().unwrap();
    let (controller, _probe) = controller().await;

    controller
        .start_recording(wav_config(dir.path()), None)
        .await
        .unwrap();
    controller.pause_recording().await.unwrap();

    let err = controller
        .start_recording(wav_config(dir.path()), None)
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::AlreadyRecording));
}

#[tokio::test(start_paused = true)]
async fn denied_permission_leaves_controller_idle() {
    let dir = tempfile::tempdir().unwrap();
    let (controller, probe) = controller().await;
    probe.permission.store(false, Ordering::SeqCst);

    let err = controller
        .start_recording(wav_config(dir.path()), None)
        .await
        .unwrap_err();

    assert!(matches!(err, SessionError::PermissionDenied));
    assert_eq!(controller.state(), RecordingState::Idle);
    assert!(controller.session().is_none());
}

#[tokio::test(start_paused = true)]
async fn permission_granted_on_request_starts_recording() {
    let dir = tempfile::tempdir().unwrap();
    let (controller, probe) = controller().await;
    probe.permission.store(false, Ordering::SeqCst);
    probe.grant_on_request.store(true, Ordering::SeqCst);

    let session = controller
        .start_recording(wav_config(dir.path()), None)
        .await
        .unwrap();
    assert_eq!(session.state(), RecordingState::Recording);
}

#[tokio::test(start_paused = true)]
async fn unsupported_format_is_rejected_before_a_session_exists() {
    let dir = tempfile::tempdir().unwrap();
    let (controller, _probe) = controller().await;

    let config = wav_config(dir.path()).with_format(AudioFormat::Flac);
    let err = controller.start_recording(config, None).await.unwrap_err();

    assert!(err.to_string().contains("flac"));
    assert!(controller.session().is_none());
}

#[tokio::test(start_paused = true)]
async fn engine_failure_moves_session_to_error() {
    let dir = tempfile::tempdir().unwrap();
    let (controller, probe) = controller().await;
    let mut events = controller.subscribe();
    probe.fail_start.store(true, Ordering::SeqCst);

    let err = controller
        .start_recording(wav_config(dir.path()), None)
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::EngineFailure(_)));

    let snapshot = controller.session().unwrap();
    assert_eq!(snapshot.state(), RecordingState::Error);
    assert!(snapshot.error_message().unwrap().contains("device busy"));

    let failed = drain(&mut events)
        .into_iter()
        .any(|e| matches!(e, SessionEvent::Failed { message, .. } if message.contains("device busy")));
    assert!(failed);

    // Acknowledging releases the failed session so a new one can start
    controller.acknowledge().await.unwrap();
    assert_eq!(controller.state(), RecordingState::Idle);
    probe.fail_start.store(false, Ordering::SeqCst);
    controller
        .start_recording(wav_config(dir.path()), None)
        .await
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn pause_failure_stops_timers() {
    let dir = tempfile::tempdir().unwrap();
    let (controller, probe) = controller().await;
    probe.fail_pause.store(true, Ordering::SeqCst);

    controller
        .start_recording(wav_config(dir.path()), None)
        .await
        .unwrap();
    sleep_ms(1500).await;
    assert!(controller.pause_recording().await.is_err());

    let failed = controller.session().unwrap();
    assert_eq!(failed.state(), RecordingState::Error);
    assert!(!probe.capturing.load(Ordering::SeqCst));

    sleep_ms(3000).await;
    assert_eq!(controller.session().unwrap().duration(), failed.duration());
}

#[tokio::test(start_paused = true)]
async fn empty_output_is_reported_as_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let (controller, probe) = controller().await;
    probe.empty_output.store(true, Ordering::SeqCst);

    controller
        .start_recording(wav_config(dir.path()), None)
        .await
        .unwrap();
    sleep_ms(1000).await;

    let err = controller.stop_recording().await.unwrap_err();
    assert!(matches!(err, SessionError::FileNotFound(_)));
    assert_eq!(controller.state(), RecordingState::Error);

    let empty = probe.path.lock().unwrap().clone().unwrap();
    assert!(!empty.exists());
}

#[tokio::test(start_paused = true)]
async fn commands_without_a_session_are_rejected() {
    let (controller, _probe) = controller().await;

    assert!(matches!(
        controller.pause_recording().await,
        Err(SessionError::NoActiveRecording)
    ));
    assert!(matches!(
        controller.resume_recording().await,
        Err(SessionError::NoActiveRecording)
    ));
    assert!(matches!(
        controller.stop_recording().await,
        Err(SessionError::NoActiveRecording)
    ));
    assert!(matches!(
        controller.cancel_recording().await,
        Err(SessionError::NoActiveRecording)
    ));
}

#[tokio::test(start_paused = true)]
async fn acknowledge_rejected_while_recording() {
    let dir = tempfile::tempdir().unwrap();
    let (controller, _probe) = controller().await;
    controller
        .start_recording(wav_config(dir.path()), None)
        .await
        .unwrap();

    assert!(matches!(
        controller.acknowledge().await,
        Err(SessionError::InvalidState(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn dispose_discards_active_recording_and_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let (controller, probe) = controller().await;
    assert!(controller.is_ready());

    let session = controller
        .start_recording(wav_config(dir.path()), None)
        .await
        .unwrap();
    let path = session.file_path().unwrap().to_path_buf();

    controller.dispose().await;
    controller.dispose().await;
    settle().await;

    assert!(!controller.is_ready());
    assert!(!path.exists());
    assert_eq!(probe.dispose_calls.load(Ordering::SeqCst), 1);
    assert!(!probe.capturing.load(Ordering::SeqCst));
    assert!(matches!(
        controller.start_recording(wav_config(dir.path()), None).await,
        Err(SessionError::ControllerClosed)
    ));
}

#[tokio::test(start_paused = true)]
async fn supported_formats_come_from_engine() {
    let (controller, _probe) = controller().await;
    assert_eq!(controller.supported_formats(), vec![AudioFormat::Wav]);
}
