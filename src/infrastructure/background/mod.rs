//! Background execution adapters

mod platform;

pub use platform::{BackgroundHost, DesktopHost, PlatformBackground};

use crate::application::ports::BackgroundPlatform;
use crate::infrastructure::notification::create_notifier;

/// Background adapter for the desktop build.
/// `notify` shows a recording indicator while backgrounded.
pub fn create_background_platform(notify: bool) -> Box<dyn BackgroundPlatform> {
    Box::new(PlatformBackground::desktop(create_notifier(notify)).with_notifications(notify))
}
