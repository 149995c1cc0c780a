//! CLI argument definitions using Clap

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::domain::background::BackgroundProfile;
use crate::domain::recording::{AudioFormat, QualityTier};

/// SmartRecorder - voice recording with pause/resume and background limits
#[derive(Parser, Debug)]
#[command(name = "smart-recorder")]
#[command(version)]
#[command(about = "Record voice notes from the microphone")]
#[command(long_about = None)]
pub struct Cli {
    /// Verbose logging (repeat for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Record until Ctrl+C or the recording limit
    Record(RecordArgs),
    /// List output formats supported by the capture engine
    Formats,
    /// Show background-execution limits per platform
    Limitations {
        /// Platform to describe (default: this build's platform)
        #[arg(long, value_enum)]
        platform: Option<PlatformArg>,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Options for `record`
#[derive(Args, Debug, Default, Clone)]
pub struct RecordArgs {
    /// Output format
    #[arg(short, long, value_enum)]
    pub format: Option<FormatArg>,

    /// Quality tier
    #[arg(short, long, value_enum)]
    pub quality: Option<QualityArg>,

    /// Stop automatically after this much recorded time (e.g., 30s, 10m, 1h)
    #[arg(short, long, value_name = "TIME")]
    pub limit: Option<String>,

    /// Directory for the recording
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// File name without extension
    #[arg(long, value_name = "NAME")]
    pub name: Option<String>,

    /// Number of channels (1 or 2)
    #[arg(long, value_parser = clap::value_parser!(u16).range(1..=2))]
    pub channels: Option<u16>,

    /// Show a desktop notification while recording
    #[arg(short, long)]
    pub notify: bool,

    /// Print session snapshots as JSON lines instead of a progress display
    #[arg(long)]
    pub json: bool,
}

/// Config action subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Create config file with defaults
    Init,
    /// Set a config value
    Set {
        /// Config key
        key: String,
        /// Config value
        value: String,
    },
    /// Get a config value
    Get {
        /// Config key
        key: String,
    },
    /// List all config values
    List,
    /// Show config file path
    Path,
}

/// Format argument for clap ValueEnum
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    Wav,
    Flac,
    M4a,
    Webm,
}

impl From<FormatArg> for AudioFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Wav => AudioFormat::Wav,
            FormatArg::Flac => AudioFormat::Flac,
            FormatArg::M4a => AudioFormat::M4a,
            FormatArg::Webm => AudioFormat::Webm,
        }
    }
}

/// Quality argument for clap ValueEnum
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum QualityArg {
    Low,
    Medium,
    High,
    Lossless,
}

impl From<QualityArg> for QualityTier {
    fn from(arg: QualityArg) -> Self {
        match arg {
            QualityArg::Low => QualityTier::Low,
            QualityArg::Medium => QualityTier::Medium,
            QualityArg::High => QualityTier::High,
            QualityArg::Lossless => QualityTier::Lossless,
        }
    }
}

/// Platform argument for `limitations`
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum PlatformArg {
    Desktop,
    Android,
    Ios,
    Web,
}

impl From<PlatformArg> for BackgroundProfile {
    fn from(arg: PlatformArg) -> Self {
        match arg {
            PlatformArg::Desktop => BackgroundProfile::Desktop,
            PlatformArg::Android => BackgroundProfile::Android,
            PlatformArg::Ios => BackgroundProfile::Ios,
            PlatformArg::Web => BackgroundProfile::Web,
        }
    }
}

/// Valid config keys
pub const VALID_CONFIG_KEYS: &[&str] = &[
    "output_dir",
    "format",
    "quality",
    "channels",
    "recording_limit",
    "background_enabled",
    "notify",
    "waveform_capacity",
    "auto_gain",
    "noise_reduction",
];

/// Check if a config key is valid
pub fn is_valid_config_key(key: &str) -> bool {
    VALID_CONFIG_KEYS.contains(&key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn record_parses_defaults() {
        let cli = Cli::parse_from(["smart-recorder", "record"]);
        let Commands::Record(args) = cli.command else {
            panic!("Expected Record command");
        };
        assert!(args.format.is_none());
        assert!(args.quality.is_none());
        assert!(args.limit.is_none());
        assert!(!args.json);
        assert!(!args.notify);
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn record_parses_options() {
        let cli = Cli::parse_from([
            "smart-recorder",
            "-v",
            "record",
            "-f",
            "flac",
            "-q",
            "lossless",
            "--limit",
            "90s",
            "--name",
            "standup",
            "--channels",
            "2",
            "--json",
        ]);
        let Commands::Record(args) = cli.command else {
            panic!("Expected Record command");
        };
        assert_eq!(args.format, Some(FormatArg::Flac));
        assert_eq!(args.quality, Some(QualityArg::Lossless));
        assert_eq!(args.limit.as_deref(), Some("90s"));
        assert_eq!(args.name.as_deref(), Some("standup"));
        assert_eq!(args.channels, Some(2));
        assert!(args.json);
        assert_eq!(cli.verbose, 1);
    }

    #[test]
    fn record_rejects_three_channels() {
        assert!(Cli::try_parse_from(["smart-recorder", "record", "--channels", "3"]).is_err());
    }

    #[test]
    fn limitations_parses_platform() {
        let cli = Cli::parse_from(["smart-recorder", "limitations", "--platform", "ios"]);
        assert!(matches!(
            cli.command,
            Commands::Limitations {
                platform: Some(PlatformArg::Ios)
            }
        ));
    }

    #[test]
    fn cli_parses_config_set() {
        let cli = Cli::parse_from(["smart-recorder", "config", "set", "format", "flac"]);
        if let Commands::Config {
            action: ConfigAction::Set { key, value },
        } = cli.command
        {
            assert_eq!(key, "format");
            assert_eq!(value, "flac");
        } else {
            panic!("Expected Config Set command");
        }
    }

    #[test]
    fn args_convert_to_domain() {
        assert_eq!(AudioFormat::from(FormatArg::Webm), AudioFormat::Webm);
        assert_eq!(QualityTier::from(QualityArg::High), QualityTier::High);
        assert_eq!(
            BackgroundProfile::from(PlatformArg::Android),
            BackgroundProfile::Android
        );
    }

    #[test]
    fn valid_config_keys() {
        assert!(is_valid_config_key("format"));
        assert!(is_valid_config_key("recording_limit"));
        assert!(!is_valid_config_key("api_key"));
    }

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }
}
