//! Port interfaces (traits) for external systems
//!
//! These traits define the boundaries between the application
//! and infrastructure layers.

pub mod background;
pub mod capture;
pub mod config;
pub mod notifier;

// Re-export common types
pub use background::{BackgroundError, BackgroundPlatform};
pub use capture::{CaptureEngine, CaptureError};
pub use config::ConfigStore;
pub use notifier::{NotificationError, NotificationIcon, Notifier};
