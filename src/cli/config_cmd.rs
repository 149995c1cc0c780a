//! Config command handler

use crate::application::ports::ConfigStore;
use crate::domain::config::AppConfig;
use crate::domain::error::ConfigError;
use crate::domain::recording::{AudioFormat, Duration, QualityTier};

use super::args::{is_valid_config_key, ConfigAction, VALID_CONFIG_KEYS};
use super::presenter::Presenter;

/// Handle config subcommand
pub async fn handle_config_command<S: ConfigStore>(
    action: ConfigAction,
    store: &S,
    presenter: &Presenter,
) -> Result<(), ConfigError> {
    match action {
        ConfigAction::Init => handle_init(store, presenter).await,
        ConfigAction::Set { key, value } => handle_set(store, presenter, &key, &value).await,
        ConfigAction::Get { key } => handle_get(store, presenter, &key).await,
        ConfigAction::List => handle_list(store, presenter).await,
        ConfigAction::Path => handle_path(store, presenter),
    }
}

async fn handle_init<S: ConfigStore>(store: &S, presenter: &Presenter) -> Result<(), ConfigError> {
    store.init().await?;
    presenter.success(&format!(
        "Config file created at: {}",
        store.path().display()
    ));
    Ok(())
}

async fn handle_set<S: ConfigStore>(
    store: &S,
    presenter: &Presenter,
    key: &str,
    value: &str,
) -> Result<(), ConfigError> {
    ensure_known_key(key)?;

    let mut config = store.load().await?;
    apply_config_value(&mut config, key, value)?;

    store.save(&config).await?;
    presenter.success(&format!("{} = {}", key, value));

    Ok(())
}

async fn handle_get<S: ConfigStore>(
    store: &S,
    presenter: &Presenter,
    key: &str,
) -> Result<(), ConfigError> {
    ensure_known_key(key)?;

    let config = store.load().await?;
    match config_value(&config, key) {
        Some(v) => presenter.output(&v),
        None => presenter.output("(not set)"),
    }

    Ok(())
}

async fn handle_list<S: ConfigStore>(store: &S, presenter: &Presenter) -> Result<(), ConfigError> {
    let config = store.load().await?;

    for key in VALID_CONFIG_KEYS {
        presenter.key_value(
            key,
            &config_value(&config, key).unwrap_or_else(|| "(not set)".to_string()),
        );
    }

    Ok(())
}

fn handle_path<S: ConfigStore>(store: &S, presenter: &Presenter) -> Result<(), ConfigError> {
    presenter.output(&store.path().to_string_lossy());
    Ok(())
}

fn ensure_known_key(key: &str) -> Result<(), ConfigError> {
    if is_valid_config_key(key) {
        Ok(())
    } else {
        Err(ConfigError::ValidationError {
            key: key.to_string(),
            message: format!("Unknown key. Valid keys: {}", VALID_CONFIG_KEYS.join(", ")),
        })
    }
}

/// Validate `value` for `key` and store it in `config`
fn apply_config_value(config: &mut AppConfig, key: &str, value: &str) -> Result<(), ConfigError> {
    let invalid = |message: String| ConfigError::ValidationError {
        key: key.to_string(),
        message,
    };
    let boolean =
        || parse_bool(value).map_err(|_| invalid("Value must be 'true' or 'false'".to_string()));

    match key {
        "output_dir" => config.output_dir = Some(value.to_string()),
        "format" => {
            let format = value
                .parse::<AudioFormat>()
                .map_err(|e| invalid(e.to_string()))?;
            config.format = Some(format.to_string());
        }
        "quality" => {
            let quality = value
                .parse::<QualityTier>()
                .map_err(|e| invalid(e.to_string()))?;
            config.quality = Some(quality.to_string());
        }
        "channels" => {
            let channels = value
                .parse::<u16>()
                .ok()
                .filter(|c| (1..=2).contains(c))
                .ok_or_else(|| invalid("Value must be 1 or 2".to_string()))?;
            config.channels = Some(channels);
        }
        "recording_limit" => {
            value
                .parse::<Duration>()
                .map_err(|e| invalid(e.to_string()))?;
            config.recording_limit = Some(value.to_string());
        }
        "waveform_capacity" => {
            let capacity = value
                .parse::<usize>()
                .ok()
                .filter(|&c| c > 0)
                .ok_or_else(|| invalid("Value must be a positive integer".to_string()))?;
            config.waveform_capacity = Some(capacity);
        }
        "background_enabled" => config.background_enabled = Some(boolean()?),
        "notify" => config.notify = Some(boolean()?),
        "auto_gain" => config.auto_gain = Some(boolean()?),
        "noise_reduction" => config.noise_reduction = Some(boolean()?),
        _ => unreachable!(), // Already validated
    }
    Ok(())
}

fn config_value(config: &AppConfig, key: &str) -> Option<String> {
    match key {
        "output_dir" => config.output_dir.clone(),
        "format" => config.format.clone(),
        "quality" => config.quality.clone(),
        "channels" => config.channels.map(|c| c.to_string()),
        "recording_limit" => config.recording_limit.clone(),
        "background_enabled" => config.background_enabled.map(|b| b.to_string()),
        "notify" => config.notify.map(|b| b.to_string()),
        "waveform_capacity" => config.waveform_capacity.map(|c| c.to_string()),
        "auto_gain" => config.auto_gain.map(|b| b.to_string()),
        "noise_reduction" => config.noise_reduction.map(|b| b.to_string()),
        _ => None,
    }
}

/// Parse a boolean value
fn parse_bool(value: &str) -> Result<bool, ()> {
    match value.to_lowercase().as_str() {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        _ => Err(()),
    }
}
