//! SmartRecorder - voice recording with pause/resume and background limits
//!
//! This crate drives one recording session at a time: it owns the capture
//! engine, tracks duration and a rolling waveform, and decides what happens
//! to a live recording when the host application leaves the foreground.
//!
//! # Architecture
//!
//! The crate follows hexagonal (ports & adapters) architecture:
//!
//! - **Domain**: Session state machine, configuration value objects, platform limits
//! - **Application**: Session controller, background coordinator, and port traits
//! - **Infrastructure**: Adapter implementations (cpal, host bridges, notify-rust, XDG config)
//! - **CLI**: Command-line interface, argument parsing, and signal handling

pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;
