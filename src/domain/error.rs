//! Domain error types

use thiserror::Error;

use crate::domain::recording::RecordingState;

/// Error when parsing a duration string
#[derive(Debug, Clone, Error)]
#[error("Invalid duration format: \"{input}\". Expected format: <number>h, <number>m, <number>s or a combination (e.g., 30s, 10m, 1h30m)")]
pub struct DurationParseError {
    pub input: String,
}

/// Error when an unknown audio format name is provided
#[derive(Debug, Clone, Error)]
#[error("Invalid format: \"{input}\". Valid formats are: wav, flac, m4a, webm")]
pub struct InvalidFormatError {
    pub input: String,
}

/// Error when an unknown quality tier name is provided
#[derive(Debug, Clone, Error)]
#[error("Invalid quality: \"{input}\". Valid tiers are: low, medium, high, lossless")]
pub struct InvalidQualityError {
    pub input: String,
}

/// Error when a recording session is asked to move along an edge
/// the state machine does not have
#[derive(Debug, Clone, Error)]
#[error("Invalid state transition: cannot {action} while in {current_state} state")]
pub struct InvalidStateTransition {
    pub current_state: RecordingState,
    pub action: String,
}

/// Error when configuration fails
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(String),

    #[error("Failed to parse config file: {0}")]
    ParseError(String),

    #[error("Failed to write config file: {0}")]
    WriteError(String),

    #[error("Invalid config value for '{key}': {message}")]
    ValidationError { key: String, message: String },

    #[error("Config file already exists at: {0}")]
    AlreadyExists(String),
}
