//! Application configuration value object

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::recording::{
    AudioFormat, Duration, QualityTier, RecordingConfiguration, DEFAULT_WAVEFORM_CAPACITY,
};

/// Application configuration.
/// All fields are optional to support partial configs and merging.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    pub output_dir: Option<String>,
    pub format: Option<String>,
    pub quality: Option<String>,
    pub channels: Option<u16>,
    pub recording_limit: Option<String>,
    pub background_enabled: Option<bool>,
    pub notify: Option<bool>,
    pub waveform_capacity: Option<usize>,
    pub auto_gain: Option<bool>,
    pub noise_reduction: Option<bool>,
}

impl AppConfig {
    /// Create config with default values.
    /// `output_dir` stays unset; the config store supplies a platform default.
    pub fn defaults() -> Self {
        Self {
            output_dir: None,
            format: Some("wav".to_string()),
            quality: Some("medium".to_string()),
            channels: Some(1),
            recording_limit: None,
            background_enabled: Some(true),
            notify: Some(false),
            waveform_capacity: Some(DEFAULT_WAVEFORM_CAPACITY),
            auto_gain: Some(true),
            noise_reduction: Some(true),
        }
    }

    /// Create an empty config (all None)
    pub fn empty() -> Self {
        Self::default()
    }

    /// Merge this config with another, where other takes precedence.
    /// Only non-None values from other will override this.
    pub fn merge(self, other: Self) -> Self {
        Self {
            output_dir: other.output_dir.or(self.output_dir),
            format: other.format.or(self.format),
            quality: other.quality.or(self.quality),
            channels: other.channels.or(self.channels),
            recording_limit: other.recording_limit.or(self.recording_limit),
            background_enabled: other.background_enabled.or(self.background_enabled),
            notify: other.notify.or(self.notify),
            waveform_capacity: other.waveform_capacity.or(self.waveform_capacity),
            auto_gain: other.auto_gain.or(self.auto_gain),
            noise_reduction: other.noise_reduction.or(self.noise_reduction),
        }
    }

    /// Get format, or WAV if not set/invalid
    pub fn format_or_default(&self) -> AudioFormat {
        self.format
            .as_ref()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default()
    }

    /// Get quality tier, or medium if not set/invalid
    pub fn quality_or_default(&self) -> QualityTier {
        self.quality
            .as_ref()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default()
    }

    pub fn channels_or_default(&self) -> u16 {
        self.channels.unwrap_or(1).clamp(1, 2)
    }

    /// Parsed recording limit; an unparsable value means no limit
    pub fn recording_limit(&self) -> Option<Duration> {
        self.recording_limit.as_ref().and_then(|s| s.parse().ok())
    }

    pub fn background_enabled_or_default(&self) -> bool {
        self.background_enabled.unwrap_or(true)
    }

    pub fn notify_or_default(&self) -> bool {
        self.notify.unwrap_or(false)
    }

    pub fn waveform_capacity_or_default(&self) -> usize {
        self.waveform_capacity
            .filter(|&c| c > 0)
            .unwrap_or(DEFAULT_WAVEFORM_CAPACITY)
    }

    pub fn output_dir_or(&self, fallback: &Path) -> PathBuf {
        self.output_dir
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| fallback.to_path_buf())
    }

    /// Build the per-recording configuration handed to the controller
    pub fn recording_configuration(&self, fallback_dir: &Path) -> RecordingConfiguration {
        let mut cfg = RecordingConfiguration::new(self.output_dir_or(fallback_dir))
            .with_format(self.format_or_default())
            .with_quality(self.quality_or_default())
            .with_channels(self.channels_or_default())
            .with_recording_limit(self.recording_limit());
        cfg.auto_gain = self.auto_gain.unwrap_or(true);
        cfg.noise_reduction = self.noise_reduction.unwrap_or(true);
        cfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_have_expected_values() {
        let config = AppConfig::defaults();
        assert!(config.output_dir.is_none());
        assert_eq!(config.format, Some("wav".to_string()));
        assert_eq!(config.quality, Some("medium".to_string()));
        assert_eq!(config.channels, Some(1));
        assert!(config.recording_limit.is_none());
        assert_eq!(config.background_enabled, Some(true));
        assert_eq!(config.waveform_capacity, Some(DEFAULT_WAVEFORM_CAPACITY));
    }

    #[test]
    fn empty_has_all_none() {
        let config = AppConfig::empty();
        assert!(config.format.is_none());
        assert!(config.quality.is_none());
        assert!(config.notify.is_none());
        assert!(config.background_enabled.is_none());
    }

    #[test]
    fn merge_other_takes_precedence() {
        let base = AppConfig {
            format: Some("wav".to_string()),
            quality: Some("low".to_string()),
            recording_limit: Some("10m".to_string()),
            ..Default::default()
        };

        let other = AppConfig {
            format: Some("flac".to_string()),
            quality: None,
            ..Default::default()
        };

        let merged = base.merge(other);

        assert_eq!(merged.format, Some("flac".to_string()));
        assert_eq!(merged.quality, Some("low".to_string()));
        assert_eq!(merged.recording_limit, Some("10m".to_string()));
    }

    #[test]
    fn parsed_accessors_fall_back_on_invalid() {
        let config = AppConfig {
            format: Some("mp3".to_string()),
            quality: Some("ultra".to_string()),
            recording_limit: Some("forever".to_string()),
            channels: Some(8),
            waveform_capacity: Some(0),
            ..Default::default()
        };
        assert_eq!(config.format_or_default(), AudioFormat::Wav);
        assert_eq!(config.quality_or_default(), QualityTier::Medium);
        assert!(config.recording_limit().is_none());
        assert_eq!(config.channels_or_default(), 2);
        assert_eq!(config.waveform_capacity_or_default(), DEFAULT_WAVEFORM_CAPACITY);
    }

    #[test]
    fn boolean_defaults() {
        let config = AppConfig::empty();
        assert!(config.background_enabled_or_default());
        assert!(!config.notify_or_default());
    }

    #[test]
    fn recording_configuration_uses_fallback_dir() {
        let config = AppConfig {
            format: Some("flac".to_string()),
            recording_limit: Some("90s".to_string()),
            auto_gain: Some(false),
            ..Default::default()
        };
        let rc = config.recording_configuration(Path::new("/data/rec"));
        assert_eq!(rc.output_directory, PathBuf::from("/data/rec"));
        assert_eq!(rc.format, AudioFormat::Flac);
        assert_eq!(rc.recording_limit, Some(Duration::from_secs(90)));
        assert!(!rc.auto_gain);
        assert!(rc.noise_reduction);
    }

    #[test]
    fn configured_output_dir_wins() {
        let config = AppConfig {
            output_dir: Some("/custom".to_string()),
            ..Default::default()
        };
        assert_eq!(config.output_dir_or(Path::new("/data")), PathBuf::from("/custom"));
    }
}
