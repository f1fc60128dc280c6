//! Looper configuration
//!
//! Every field has a default, so an empty JSON object is a valid config.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{LoopGridError, Result};

/// Loop length used when neither the caller nor the grid provides one.
pub const DEFAULT_LOOP_LENGTH: f64 = 8.0;

/// Beats the recording must advance before the log is truncated again.
pub const DEFAULT_TRUNCATE_INTERVAL: f64 = 16.0;

/// Beats of history kept in the event log.
pub const DEFAULT_RETENTION_WINDOW: f64 = 64.0;

/// Swing cells per beat.
pub const DEFAULT_SWING_GRID: f64 = 2.0;

/// Shortest loop that is swung without tiling it first.
pub const DEFAULT_MIN_SWING_LENGTH: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LooperConfig {
    pub default_loop_length: f64,
    pub truncate_interval: f64,
    pub retention_window: f64,
    pub swing_grid: f64,
    pub min_swing_length: f64,
    /// Undo depth; `None` keeps every entry
    pub max_undo_levels: Option<usize>,
}

impl Default for LooperConfig {
    fn default() -> Self {
        Self {
            default_loop_length: DEFAULT_LOOP_LENGTH,
            truncate_interval: DEFAULT_TRUNCATE_INTERVAL,
            retention_window: DEFAULT_RETENTION_WINDOW,
            swing_grid: DEFAULT_SWING_GRID,
            min_swing_length: DEFAULT_MIN_SWING_LENGTH,
            max_undo_levels: None,
        }
    }
}

impl LooperConfig {
    /// Load and validate a JSON config file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| LoopGridError::FileReadError {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        positive("default_loop_length", self.default_loop_length)?;
        positive("truncate_interval", self.truncate_interval)?;
        positive("retention_window", self.retention_window)?;
        positive("swing_grid", self.swing_grid)?;
        positive("min_swing_length", self.min_swing_length)?;

        if self.retention_window < self.default_loop_length {
            return Err(LoopGridError::InvalidConfig {
                field: "retention_window",
                reason: format!(
                    "must cover default_loop_length ({})",
                    self.default_loop_length
                ),
            });
        }
        if self.max_undo_levels == Some(0) {
            return Err(LoopGridError::InvalidConfig {
                field: "max_undo_levels",
                reason: "must be at least 1 when set".to_string(),
            });
        }
        Ok(())
    }
}

fn positive(field: &'static str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(LoopGridError::InvalidConfig {
            field,
            reason: format!("must be a positive number, got {}", value),
        })
    }
}
