//! TOML-based configuration.
//!
//! Supports a config file (quarry.toml) holding session defaults for the
//! planner. Every field has a default, so an empty file (or no file at all)
//! yields a working configuration.
//!
//! Example configuration:
//! ```toml
//! [planner]
//! mode = "cost_based"
//! sort_merge_join = true
//! index_join = true
//! hash_join = true
//!
//! [planner.buffers]
//! sort_buffer = 128
//! sort_final_buffer = 16
//! bnlj_buffer = 64
//! hash_buffer = 128
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Planner session defaults.
    pub planner: PlannerSettings,
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_path(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }
        let contents = fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }
}

/// Plan-search strategy for the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlannerMode {
    /// Left-deep plan in declaration order, no cost comparison.
    Naive,
    /// Greedy rule-based plan; deterministic quality floor.
    Baseline,
    /// Full dynamic-programming search minimizing estimated I/O.
    CostBased,
}

/// Session-scoped planner configuration.
///
/// Threaded explicitly through every planner entry point; two sessions with
/// different settings can plan concurrently against the same catalog.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PlannerSettings {
    /// Active plan-search strategy.
    pub mode: PlannerMode,

    /// Consider sort-merge joins.
    pub sort_merge_join: bool,

    /// Consider index nested-loop joins.
    pub index_join: bool,

    /// Consider hash joins (cost-based mode only).
    pub hash_join: bool,

    /// Log the chosen plan tree at debug level.
    pub debug: bool,

    /// Memory budgets used by the cost formulas.
    pub buffers: BufferSettings,
}

impl Default for PlannerSettings {
    fn default() -> Self {
        Self {
            mode: PlannerMode::CostBased,
            sort_merge_join: true,
            index_join: true,
            hash_join: true,
            debug: false,
            buffers: BufferSettings::default(),
        }
    }
}

impl PlannerSettings {
    pub fn with_mode(mode: PlannerMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }
}

/// Operator memory budgets, in rows buffered.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BufferSettings {
    /// Rows buffered per external-sort run.
    pub sort_buffer: u64,

    /// Fan-in of the final merge pass.
    pub sort_final_buffer: u64,

    /// Rows of the outer input buffered per block nested-loop pass.
    pub bnlj_buffer: u64,

    /// Rows buffered while partitioning a hash join.
    pub hash_buffer: u64,
}

impl Default for BufferSettings {
    fn default() -> Self {
        Self {
            sort_buffer: 128,
            sort_final_buffer: 16,
            bnlj_buffer: 64,
            hash_buffer: 128,
        }
    }
}
