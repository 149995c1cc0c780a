//! Platform background-execution descriptions

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::recording::Duration;

/// iOS grants roughly three minutes to a background task
pub const IOS_BACKGROUND_TASK_SECS: u64 = 180;

/// Browsers freeze hidden tabs after about five minutes
pub const WEB_HIDDEN_TAB_SECS: u64 = 300;

/// Immutable description of what a platform allows while backgrounded
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BackgroundLimitations {
    /// `None` means no time budget
    pub max_background_time: Option<Duration>,
    pub requires_active_audio_session: bool,
    pub supports_infinite_background: bool,
    pub requires_user_visible: bool,
    pub platform_specific: BTreeMap<String, String>,
}

impl BackgroundLimitations {
    pub fn unbounded() -> Self {
        Self {
            supports_infinite_background: true,
            ..Self::default()
        }
    }

    pub fn is_time_boxed(&self) -> bool {
        self.max_background_time.is_some()
    }
}

/// Platform family whose background rules apply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackgroundProfile {
    Desktop,
    Android,
    Ios,
    Web,
}

impl BackgroundProfile {
    pub const ALL: [BackgroundProfile; 4] = [Self::Desktop, Self::Android, Self::Ios, Self::Web];

    /// Profile of the compilation target
    pub fn current() -> Self {
        if cfg!(target_os = "android") {
            Self::Android
        } else if cfg!(target_os = "ios") {
            Self::Ios
        } else if cfg!(target_family = "wasm") {
            Self::Web
        } else {
            Self::Desktop
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Desktop => "desktop",
            Self::Android => "android",
            Self::Ios => "ios",
            Self::Web => "web",
        }
    }

    pub fn limitations(&self) -> BackgroundLimitations {
        let mut platform_specific = BTreeMap::new();
        match self {
            Self::Desktop => {
                platform_specific.insert("mechanism".into(), "process".into());
                BackgroundLimitations {
                    platform_specific,
                    ..BackgroundLimitations::unbounded()
                }
            }
            Self::Android => {
                platform_specific.insert("mechanism".into(), "foreground_service".into());
                platform_specific.insert("service_type".into(), "microphone".into());
                BackgroundLimitations {
                    max_background_time: None,
                    requires_active_audio_session: false,
                    supports_infinite_background: true,
                    requires_user_visible: true,
                    platform_specific,
                }
            }
            Self::Ios => {
                platform_specific.insert("mechanism".into(), "background_task".into());
                platform_specific.insert("audio_session_category".into(), "play_and_record".into());
                BackgroundLimitations {
                    max_background_time: Some(Duration::from_secs(IOS_BACKGROUND_TASK_SECS)),
                    requires_active_audio_session: true,
                    supports_infinite_background: false,
                    requires_user_visible: false,
                    platform_specific,
                }
            }
            Self::Web => {
                platform_specific.insert("mechanism".into(), "visibility_api".into());
                platform_specific.insert("suspension".into(), "tab_freeze".into());
                BackgroundLimitations {
                    max_background_time: Some(Duration::from_secs(WEB_HIDDEN_TAB_SECS)),
                    requires_active_audio_session: false,
                    supports_infinite_background: false,
                    requires_user_visible: false,
                    platform_specific,
                }
            }
        }
    }
}

impl fmt::Display for BackgroundProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackgroundProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "desktop" => Ok(Self::Desktop),
            "android" => Ok(Self::Android),
            "ios" => Ok(Self::Ios),
            "web" => Ok(Self::Web),
            _ => Err(format!(
                "Invalid platform: \"{}\". Valid platforms are: desktop, android, ios, web",
                s
            )),
        }
    }
}

/// Whether the application is visible to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppVisibility {
    #[default]
    Foreground,
    Background,
}

/// Raw lifecycle signals as reported by the host application shell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppLifecycleState {
    Resumed,
    /// Transitional (focus lost, system dialog shown); not a visibility change
    Inactive,
    Hidden,
    Paused,
    Detached,
}

impl AppLifecycleState {
    /// Visibility implied by this signal, `None` for transitional states
    pub const fn visibility(&self) -> Option<AppVisibility> {
        match self {
            Self::Resumed => Some(AppVisibility::Foreground),
            Self::Inactive => None,
            Self::Hidden | Self::Paused | Self::Detached => Some(AppVisibility::Background),
        }
    }
}
