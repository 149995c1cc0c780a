//! Recording configuration value objects

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::Duration;
use crate::domain::error::{InvalidFormatError, InvalidQualityError};

/// Container/codec of the produced recording file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    #[default]
    Wav,
    Flac,
    M4a,
    Webm,
}

impl AudioFormat {
    pub const ALL: [AudioFormat; 4] = [Self::Wav, Self::Flac, Self::M4a, Self::Webm];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Wav => "wav",
            Self::Flac => "flac",
            Self::M4a => "m4a",
            Self::Webm => "webm",
        }
    }

    /// File extension (without the dot)
    pub const fn extension(&self) -> &'static str {
        self.as_str()
    }

    pub const fn mime_type(&self) -> &'static str {
        match self {
            Self::Wav => "audio/wav",
            Self::Flac => "audio/flac",
            Self::M4a => "audio/mp4",
            Self::Webm => "audio/webm",
        }
    }

    /// Whether the format stores samples without lossy compression
    pub const fn is_lossless(&self) -> bool {
        matches!(self, Self::Wav | Self::Flac)
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AudioFormat {
    type Err = InvalidFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "wav" | "wave" => Ok(Self::Wav),
            "flac" => Ok(Self::Flac),
            "m4a" | "aac" => Ok(Self::M4a),
            "webm" => Ok(Self::Webm),
            _ => Err(InvalidFormatError {
                input: s.to_string(),
            }),
        }
    }
}

/// Quality tier, bundling sample rate, bit depth and bit rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityTier {
    Low,
    #[default]
    Medium,
    High,
    Lossless,
}

impl QualityTier {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Lossless => "lossless",
        }
    }

    /// Sample rate in Hz
    pub const fn sample_rate(&self) -> u32 {
        match self {
            Self::Low => 16_000,
            Self::Medium => 22_050,
            Self::High => 44_100,
            Self::Lossless => 48_000,
        }
    }

    /// Output container depth.
    ///
    /// Samples are quantized from the device's float stream, so a device
    /// that only delivers 16-bit PCM still carries 16-bit precision inside
    /// a 24-bit Lossless file.
    pub const fn bit_depth(&self) -> u16 {
        match self {
            Self::Lossless => 24,
            _ => 16,
        }
    }

    /// Target bit rate in bits per second for lossy encoders
    pub const fn bit_rate(&self) -> u32 {
        match self {
            Self::Low => 64_000,
            Self::Medium => 96_000,
            Self::High => 128_000,
            Self::Lossless => 1_536_000,
        }
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QualityTier {
    type Err = InvalidQualityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "lossless" => Ok(Self::Lossless),
            _ => Err(InvalidQualityError {
                input: s.to_string(),
            }),
        }
    }
}

/// Everything a capture backend needs to know about one recording
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordingConfiguration {
    pub format: AudioFormat,
    pub quality: QualityTier,
    pub channels: u16,
    /// Auto-stop once this much active time has been recorded
    pub recording_limit: Option<Duration>,
    pub auto_gain: bool,
    pub noise_reduction: bool,
    pub output_directory: PathBuf,
}

impl RecordingConfiguration {
    pub fn new(output_directory: impl Into<PathBuf>) -> Self {
        Self {
            format: AudioFormat::default(),
            quality: QualityTier::default(),
            channels: 1,
            recording_limit: None,
            auto_gain: true,
            noise_reduction: true,
            output_directory: output_directory.into(),
        }
    }

    pub fn with_format(mut self, format: AudioFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_quality(mut self, quality: QualityTier) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_channels(mut self, channels: u16) -> Self {
        self.channels = channels.clamp(1, 2);
        self
    }

    pub fn with_recording_limit(mut self, limit: Option<Duration>) -> Self {
        self.recording_limit = limit;
        self
    }

    pub fn sample_rate(&self) -> u32 {
        self.quality.sample_rate()
    }

    pub fn bit_depth(&self) -> u16 {
        self.quality.bit_depth()
    }

    pub fn bit_rate(&self) -> u32 {
        self.quality.bit_rate()
    }

    /// Output path for a recording, appending the format's extension
    /// unless the caller's name already carries it.
    pub fn output_path_for(&self, file_name: &str) -> PathBuf {
        let ext = self.format.extension();
        let has_ext = Path::new(file_name)
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case(ext));
        if has_ext {
            self.output_directory.join(file_name)
        } else {
            self.output_directory.join(format!("{}.{}", file_name, ext))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_parses_aliases() {
        assert_eq!("WAV".parse::<AudioFormat>().unwrap(), AudioFormat::Wav);
        assert_eq!("aac".parse::<AudioFormat>().unwrap(), AudioFormat::M4a);
        assert!("mp3".parse::<AudioFormat>().is_err());
    }

    #[test]
    fn quality_tiers_increase() {
        assert!(QualityTier::Low.sample_rate() < QualityTier::High.sample_rate());
        assert_eq!(QualityTier::Lossless.bit_depth(), 24);
        assert_eq!(QualityTier::Medium.bit_rate(), 96_000);
    }

    #[test]
    fn output_path_appends_extension() {
        let cfg = RecordingConfiguration::new("/tmp/rec").with_format(AudioFormat::Flac);
        assert_eq!(cfg.output_path_for("memo"), PathBuf::from("/tmp/rec/memo.flac"));
        assert_eq!(cfg.output_path_for("memo.FLAC"), PathBuf::from("/tmp/rec/memo.FLAC"));
    }

    #[test]
    fn channels_are_clamped() {
        let cfg = RecordingConfiguration::new("/tmp").with_channels(6);
        assert_eq!(cfg.channels, 2);
        let cfg = RecordingConfiguration::new("/tmp").with_channels(0);
        assert_eq!(cfg.channels, 1);
    }

    #[test]
    fn serde_uses_lowercase_names() {
        let json = serde_json::to_string(&AudioFormat::Webm).unwrap();
        assert_eq!(json, "\"webm\"");
        let tier: QualityTier = serde_json::from_str("\"high\"").unwrap();
        assert_eq!(tier, QualityTier::High);
    }
}
