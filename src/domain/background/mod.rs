//! Background-execution domain types

pub mod limitations;

pub use limitations::{AppLifecycleState, AppVisibility, BackgroundLimitations, BackgroundProfile};
