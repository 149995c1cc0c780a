//! Infrastructure layer - Adapter implementations
//!
//! Contains concrete implementations of the port interfaces,
//! integrating with cpal, host recorder bridges, platform background
//! primitives, desktop notifications and the XDG config directory.

pub mod background;
pub mod capture;
pub mod config;
pub mod notification;

// Re-export adapters
pub use background::{create_background_platform, BackgroundHost, DesktopHost, PlatformBackground};
pub use capture::{
    create_bridged_engine, create_capture_engine, BridgeProfile, BridgedCaptureEngine,
    CpalCaptureEngine, LevelReading, NativeRecorder,
};
pub use config::XdgConfigStore;
pub use notification::{create_notifier, NoOpNotifier, NotifyRustNotifier};
