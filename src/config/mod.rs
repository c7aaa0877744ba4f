//! Configuration module.
//!
//! Session-scoped planner knobs and the optional TOML settings file.

mod settings;

pub use settings::{BufferSettings, PlannerMode, PlannerSettings, Settings, SettingsError};
