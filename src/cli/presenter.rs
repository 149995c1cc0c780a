//! CLI presenter for output formatting

use std::io::{self, Write};

use colored::*;
use indicatif::{ProgressBar, ProgressStyle};

use crate::domain::recording::{format_clock, RecordingSession, RecordingState};

/// Block glyphs used for the live level meter, quietest first
const LEVEL_GLYPHS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Number of waveform samples shown next to the clock
const METER_WIDTH: usize = 24;

/// Presenter for CLI output formatting
pub struct Presenter {
    spinner: Option<ProgressBar>,
}

impl Presenter {
    /// Create a new presenter
    pub fn new() -> Self {
        Self { spinner: None }
    }

    /// Start a spinner with message
    pub fn start_spinner(&mut self, message: &str) {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::default_spinner()
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
                .template("{spinner:.red} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.set_message(message.to_string());
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        self.spinner = Some(spinner);
    }

    /// Update spinner message
    pub fn update_spinner(&self, message: &str) {
        if let Some(ref spinner) = self.spinner {
            spinner.set_message(message.to_string());
        }
    }

    /// Mark spinner as success and finish
    pub fn spinner_success(&mut self, message: &str) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_with_message(format!("{} {}", "✓".green(), message));
        }
    }

    /// Mark spinner as failed and finish
    pub fn spinner_fail(&mut self, message: &str) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_with_message(format!("{} {}", "✗".red(), message));
        }
    }

    /// Stop spinner without status
    pub fn stop_spinner(&mut self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }
    }

    /// Print info message to stderr
    pub fn info(&self, message: &str) {
        self.suspend(|| eprintln!("{} {}", "ℹ".cyan(), message));
    }

    /// Print success message to stderr
    pub fn success(&self, message: &str) {
        self.suspend(|| eprintln!("{} {}", "✓".green(), message));
    }

    /// Print warning message to stderr
    pub fn warn(&self, message: &str) {
        self.suspend(|| eprintln!("{} {}", "⚠".yellow(), message));
    }

    /// Print error message to stderr
    pub fn error(&self, message: &str) {
        self.suspend(|| eprintln!("{} {}", "✗".red(), message));
    }

    /// Output text to stdout (paths, values, JSON lines)
    pub fn output(&self, text: &str) {
        self.suspend(|| {
            println!("{}", text);
            let _ = io::stdout().flush();
        });
    }

    /// Print a key-value pair (for config list)
    pub fn key_value(&self, key: &str, value: &str) {
        println!("{}: {}", key.cyan(), value);
    }

    fn suspend(&self, f: impl FnOnce()) {
        match &self.spinner {
            Some(spinner) => spinner.suspend(f),
            None => f(),
        }
    }

    /// One-line live status for a session snapshot
    pub fn format_status(&self, session: &RecordingSession) -> String {
        let clock = format_clock(session.duration());
        let limit = session
            .configuration()
            .recording_limit
            .map(|l| format!(" / {}", format_clock(l)))
            .unwrap_or_default();
        let samples = session.waveform_data().to_vec();
        let tail = &samples[samples.len().saturating_sub(METER_WIDTH)..];

        match session.state() {
            RecordingState::Recording => format!(
                "{} {}{} {}",
                "REC".red().bold(),
                clock,
                limit,
                level_meter(tail).red()
            ),
            RecordingState::Paused => format!(
                "{} {}{} {}",
                "PAUSED".yellow().bold(),
                clock,
                limit,
                "(send SIGUSR1 to resume)".dimmed()
            ),
            state => format!("{} {}", state.as_str().cyan(), clock),
        }
    }
}

impl Default for Presenter {
    fn default() -> Self {
        Self::new()
    }
}

/// Render normalized levels as block glyphs
pub fn level_meter(levels: &[f32]) -> String {
    levels
        .iter()
        .map(|&level| {
            let idx = (level.clamp(0.0, 1.0) * (LEVEL_GLYPHS.len() - 1) as f32).round() as usize;
            LEVEL_GLYPHS[idx]
        })
        .collect()
}

/// Human-readable byte count
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}
