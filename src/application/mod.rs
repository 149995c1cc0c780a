//! Application layer - Use cases and port interfaces
//!
//! Contains the recording session controller, the background coordinator
//! and the trait definitions for external system interactions.

pub mod background;
mod events;
pub mod lifecycle;
pub mod monitor;
pub mod ports;
pub mod session;

// Re-export use cases
pub use background::{
    BackgroundCoordinator, BackgroundEvent, BackgroundEvents, CoordinatorSettings,
};
pub use lifecycle::LifecycleObserver;
pub use monitor::AmplitudeMonitor;
pub use session::{
    CompletedRecording, ControllerSettings, SessionController, SessionError, SessionEvent,
    SessionEvents,
};
