//! Recording session entity and its state machine

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::configuration::RecordingConfiguration;
use super::waveform::{normalize_amplitude, WaveformBuffer};
use super::Duration;
use crate::domain::error::InvalidStateTransition;

/// Recording states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordingState {
    #[default]
    Idle,
    Initializing,
    Recording,
    Paused,
    Stopping,
    Stopped,
    Error,
}

impl RecordingState {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Initializing => "initializing",
            Self::Recording => "recording",
            Self::Paused => "paused",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Error => "error",
        }
    }

    /// States in which a capture resource may be held
    pub const fn is_active(&self) -> bool {
        matches!(
            self,
            Self::Initializing | Self::Recording | Self::Paused | Self::Stopping
        )
    }

    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped | Self::Error)
    }
}

impl fmt::Display for RecordingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why a session reached Stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    Manual,
    RecordingLimit,
    BackgroundTimeLimit,
    Cancelled,
}

/// One recording attempt: state, timing, output and waveform.
///
/// State machine:
///   IDLE -> INITIALIZING (begin_initializing)
///   INITIALIZING -> RECORDING (mark_recording)
///   RECORDING <-> PAUSED (pause / resume)
///   RECORDING | PAUSED -> STOPPING (begin_stopping)
///   STOPPING -> STOPPED (mark_stopped)
///   any active -> STOPPED (mark_cancelled)
///   any active -> ERROR (fail)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingSession {
    id: Uuid,
    state: RecordingState,
    start_time: DateTime<Utc>,
    end_time: Option<DateTime<Utc>>,
    duration: Duration,
    configuration: RecordingConfiguration,
    file_path: Option<PathBuf>,
    file_size: Option<u64>,
    current_amplitude: f32,
    waveform_data: WaveformBuffer,
    error_message: Option<String>,
    stop_reason: Option<StopReason>,
}

impl RecordingSession {
    /// Create a new idle session with a fresh identifier
    pub fn new(configuration: RecordingConfiguration, waveform_capacity: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            state: RecordingState::Idle,
            start_time: Utc::now(),
            end_time: None,
            duration: Duration::ZERO,
            configuration,
            file_path: None,
            file_size: None,
            current_amplitude: 0.0,
            waveform_data: WaveformBuffer::new(waveform_capacity),
            error_message: None,
            stop_reason: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> RecordingState {
        self.state
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.end_time
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn configuration(&self) -> &RecordingConfiguration {
        &self.configuration
    }

    pub fn file_path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }

    pub fn file_size(&self) -> Option<u64> {
        self.file_size
    }

    pub fn current_amplitude(&self) -> f32 {
        self.current_amplitude
    }

    pub fn waveform_data(&self) -> &WaveformBuffer {
        &self.waveform_data
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        self.stop_reason
    }

    pub fn is_recording(&self) -> bool {
        self.state == RecordingState::Recording
    }

    pub fn is_paused(&self) -> bool {
        self.state == RecordingState::Paused
    }

    fn reject(&self, action: &str) -> InvalidStateTransition {
        InvalidStateTransition {
            current_state: self.state,
            action: action.to_string(),
        }
    }

    /// Transition from IDLE to INITIALIZING
    pub(crate) fn begin_initializing(&mut self) -> Result<(), InvalidStateTransition> {
        if self.state != RecordingState::Idle {
            return Err(self.reject("initialize"));
        }
        self.state = RecordingState::Initializing;
        Ok(())
    }

    /// Transition from INITIALIZING to RECORDING once capture has started
    pub(crate) fn mark_recording(&mut self, file_path: PathBuf) -> Result<(), InvalidStateTransition> {
        if self.state != RecordingState::Initializing {
            return Err(self.reject("start recording"));
        }
        self.state = RecordingState::Recording;
        self.file_path = Some(file_path);
        Ok(())
    }

    /// Transition from RECORDING to PAUSED
    pub(crate) fn pause(&mut self) -> Result<(), InvalidStateTransition> {
        if self.state != RecordingState::Recording {
            return Err(self.reject("pause recording"));
        }
        self.state = RecordingState::Paused;
        Ok(())
    }

    /// Transition from PAUSED to RECORDING
    pub(crate) fn resume(&mut self) -> Result<(), InvalidStateTransition> {
        if self.state != RecordingState::Paused {
            return Err(self.reject("resume recording"));
        }
        self.state = RecordingState::Recording;
        Ok(())
    }

    /// Transition from RECORDING or PAUSED to STOPPING
    pub(crate) fn begin_stopping(&mut self) -> Result<(), InvalidStateTransition> {
        if !matches!(self.state, RecordingState::Recording | RecordingState::Paused) {
            return Err(self.reject("stop recording"));
        }
        self.state = RecordingState::Stopping;
        Ok(())
    }

    /// Transition from STOPPING to STOPPED with the verified output
    pub(crate) fn mark_stopped(
        &mut self,
        file_path: PathBuf,
        file_size: u64,
        reason: StopReason,
    ) -> Result<(), InvalidStateTransition> {
        if self.state != RecordingState::Stopping {
            return Err(self.reject("finish stopping"));
        }
        self.state = RecordingState::Stopped;
        self.end_time = Some(Utc::now());
        self.file_path = Some(file_path);
        self.file_size = Some(file_size);
        self.stop_reason = Some(reason);
        self.current_amplitude = 0.0;
        Ok(())
    }

    /// Transition from any active state to STOPPED, dropping the artifact
    pub(crate) fn mark_cancelled(&mut self) -> Result<(), InvalidStateTransition> {
        if !self.state.is_active() {
            return Err(self.reject("cancel recording"));
        }
        self.state = RecordingState::Stopped;
        self.end_time = Some(Utc::now());
        self.file_path = None;
        self.file_size = None;
        self.stop_reason = Some(StopReason::Cancelled);
        self.current_amplitude = 0.0;
        Ok(())
    }

    /// Transition from any active state to ERROR
    pub(crate) fn fail(&mut self, message: impl Into<String>) -> Result<(), InvalidStateTransition> {
        if !self.state.is_active() {
            return Err(self.reject("fail"));
        }
        self.state = RecordingState::Error;
        self.end_time = Some(Utc::now());
        self.error_message = Some(message.into());
        self.current_amplitude = 0.0;
        Ok(())
    }

    /// Advance the elapsed active time. Never moves backwards.
    pub(crate) fn advance_duration(&mut self, elapsed: Duration) {
        if elapsed > self.duration {
            self.duration = elapsed;
        }
    }

    /// Record an amplitude sample into the waveform history
    pub(crate) fn record_amplitude(&mut self, sample: f32) {
        let sample = normalize_amplitude(sample);
        self.current_amplitude = sample;
        self.waveform_data.push(sample);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> RecordingSession {
        RecordingSession::new(RecordingConfiguration::new("/tmp/rec"), 8)
    }

    fn recording() -> RecordingSession {
        let mut s = session();
        s.begin_initializing().unwrap();
        s.mark_recording(PathBuf::from("/tmp/rec/a.wav")).unwrap();
        s
    }

    #[test]
    fn new_session_is_idle_without_path() {
        let s = session();
        assert_eq!(s.state(), RecordingState::Idle);
        assert!(s.file_path().is_none());
        assert_eq!(s.duration(), Duration::ZERO);
    }

    #[test]
    fn file_path_only_set_on_recording() {
        let mut s = session();
        s.begin_initializing().unwrap();
        assert!(s.file_path().is_none());
        s.mark_recording(PathBuf::from("/tmp/rec/a.wav")).unwrap();
        assert_eq!(s.file_path(), Some(Path::new("/tmp/rec/a.wav")));
    }

    #[test]
    fn mark_recording_from_idle_fails() {
        let mut s = session();
        let err = s.mark_recording(PathBuf::from("/x.wav")).unwrap_err();
        assert_eq!(err.current_state, RecordingState::Idle);
        assert!(s.file_path().is_none());
    }

    #[test]
    fn pause_resume_cycle() {
        let mut s = recording();
        s.pause().unwrap();
        assert!(s.is_paused());
        assert!(s.pause().is_err());
        s.resume().unwrap();
        assert!(s.is_recording());
        assert!(s.resume().is_err());
    }

    #[test]
    fn stop_requires_stopping_first() {
        let mut s = recording();
        assert!(s
            .mark_stopped(PathBuf::from("/tmp/rec/a.wav"), 10, StopReason::Manual)
            .is_err());
        s.begin_stopping().unwrap();
        s.mark_stopped(PathBuf::from("/tmp/rec/a.wav"), 10, StopReason::Manual)
            .unwrap();
        assert_eq!(s.state(), RecordingState::Stopped);
        assert_eq!(s.file_size(), Some(10));
        assert!(s.end_time().is_some());
    }

    #[test]
    fn cancel_clears_artifact() {
        let mut s = recording();
        s.mark_cancelled().unwrap();
        assert_eq!(s.state(), RecordingState::Stopped);
        assert!(s.file_path().is_none());
        assert_eq!(s.stop_reason(), Some(StopReason::Cancelled));
    }

    #[test]
    fn fail_only_from_active_states() {
        let mut s = session();
        assert!(s.fail("boom").is_err());
        let mut s = recording();
        s.fail("device lost").unwrap();
        assert_eq!(s.state(), RecordingState::Error);
        assert_eq!(s.error_message(), Some("device lost"));
        assert!(s.fail("again").is_err());
    }

    #[test]
    fn duration_never_decreases() {
        let mut s = recording();
        s.advance_duration(Duration::from_secs(3));
        s.advance_duration(Duration::from_secs(2));
        assert_eq!(s.duration(), Duration::from_secs(3));
    }

    #[test]
    fn amplitude_feeds_waveform() {
        let mut s = recording();
        for _ in 0..20 {
            s.record_amplitude(0.5);
        }
        s.record_amplitude(3.0);
        assert_eq!(s.current_amplitude(), 1.0);
        assert_eq!(s.waveform_data().len(), 8);
    }

    #[test]
    fn state_display() {
        assert_eq!(RecordingState::Initializing.to_string(), "initializing");
        assert_eq!(RecordingState::Error.to_string(), "error");
    }

    #[test]
    fn error_display() {
        let err = InvalidStateTransition {
            current_state: RecordingState::Stopped,
            action: "pause recording".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("pause recording"));
        assert!(msg.contains("stopped"));
    }
}
