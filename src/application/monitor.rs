//! Session timers: active-time clock and amplitude sampling
//!
//! Both timers are polled from the session controller's own loop, so their
//! callbacks never overlap with each other or with a command.

use std::time::Duration as StdDuration;

use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, warn};

use super::ports::CaptureEngine;
use crate::domain::recording::{Duration, RecordingSession};

/// Amplitude read failures are logged at warn level once per this many
const AMPLITUDE_WARN_EVERY: u32 = 50;

/// Periodic tick that stays pending while stopped
#[derive(Debug)]
pub(crate) struct PeriodicTimer {
    period: StdDuration,
    interval: Option<Interval>,
}

impl PeriodicTimer {
    pub(crate) fn new(period: StdDuration) -> Self {
        Self {
            period,
            interval: None,
        }
    }

    /// (Re)arm the timer; the first tick fires one period from now.
    pub(crate) fn start(&mut self) {
        let mut interval = interval_at(Instant::now() + self.period, self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        self.interval = Some(interval);
    }

    pub(crate) fn cancel(&mut self) {
        self.interval = None;
    }

    pub(crate) fn is_running(&self) -> bool {
        self.interval.is_some()
    }

    pub(crate) async fn tick(&mut self) {
        match self.interval.as_mut() {
            Some(interval) => {
                interval.tick().await;
            }
            None => std::future::pending::<()>().await,
        }
    }
}

/// Tracks active recording time across pause/resume and drives the
/// duration timer.
#[derive(Debug)]
pub(crate) struct SessionClock {
    timer: PeriodicTimer,
    accumulated: StdDuration,
    running_since: Option<Instant>,
}

impl SessionClock {
    pub(crate) fn new(tick: StdDuration) -> Self {
        Self {
            timer: PeriodicTimer::new(tick),
            accumulated: StdDuration::ZERO,
            running_since: None,
        }
    }

    /// Reset to zero and start counting.
    pub(crate) fn start(&mut self) {
        self.accumulated = StdDuration::ZERO;
        self.running_since = Some(Instant::now());
        self.timer.start();
    }

    /// Freeze the elapsed time and cancel the tick.
    pub(crate) fn pause(&mut self) -> Duration {
        if let Some(since) = self.running_since.take() {
            self.accumulated += since.elapsed();
        }
        self.timer.cancel();
        self.elapsed()
    }

    pub(crate) fn resume(&mut self) {
        if self.running_since.is_none() {
            self.running_since = Some(Instant::now());
        }
        self.timer.start();
    }

    /// Stop for good, returning the final elapsed time.
    pub(crate) fn stop(&mut self) -> Duration {
        self.pause()
    }

    pub(crate) fn elapsed(&self) -> Duration {
        let running = self
            .running_since
            .map(|since| since.elapsed())
            .unwrap_or_default();
        Duration::from(self.accumulated + running)
    }

    pub(crate) fn is_running(&self) -> bool {
        self.timer.is_running()
    }

    pub(crate) async fn tick(&mut self) {
        self.timer.tick().await
    }
}

/// Samples the capture engine's level into the session's waveform buffer.
///
/// Amplitude is cosmetic: read failures are logged and skipped, never
/// escalated into a session error.
#[derive(Debug)]
pub struct AmplitudeMonitor {
    timer: PeriodicTimer,
    consecutive_failures: u32,
}

impl AmplitudeMonitor {
    pub fn new(tick: StdDuration) -> Self {
        Self {
            timer: PeriodicTimer::new(tick),
            consecutive_failures: 0,
        }
    }

    pub fn start(&mut self) {
        self.consecutive_failures = 0;
        self.timer.start();
    }

    pub fn stop(&mut self) {
        self.timer.cancel();
    }

    pub fn is_running(&self) -> bool {
        self.timer.is_running()
    }

    pub async fn tick(&mut self) {
        self.timer.tick().await
    }

    /// Take one sample. Returns true when the session changed and should be
    /// republished.
    pub async fn sample<E>(&mut self, engine: &E, session: &mut RecordingSession) -> bool
    where
        E: CaptureEngine + ?Sized,
    {
        if !session.is_recording() {
            return false;
        }

        match engine.amplitude().await {
            Ok(level) => {
                self.consecutive_failures = 0;
                session.record_amplitude(level);
                true
            }
            Err(e) => {
                self.consecutive_failures += 1;
                if self.consecutive_failures % AMPLITUDE_WARN_EVERY == 1 {
                    warn!(
                        session_id = %session.id(),
                        failures = self.consecutive_failures,
                        "Amplitude sample failed: {}", e
                    );
                } else {
                    debug!(session_id = %session.id(), "Amplitude sample failed: {}", e);
                }
                false
            }
        }
    }
}
