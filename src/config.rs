//! Engine configuration
//!
//! Tunables for the allocation engine, loadable from YAML. Every field has a
//! default so an empty document is a valid configuration:
//!
//! ```yaml
//! minSegmentPercent: 5
//! minSpanMinutes: 1
//! roundDragWeights: true
//! difficultyWeights:
//!   easy: 60
//!   medium: 100
//!   hard: 140
//! ```

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use crate::types::Difficulty;
use crate::{AllocationError, Result};

/// Default weights seeded into segments by difficulty.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct DifficultyWeights {
    pub easy: f64,
    pub medium: f64,
    pub hard: f64,
}

impl Default for DifficultyWeights {
    fn default() -> Self {
        Self { easy: 60.0, medium: 100.0, hard: 140.0 }
    }
}

impl DifficultyWeights {
    /// Weight for a difficulty level.
    pub fn weight_for(&self, difficulty: Difficulty) -> f64 {
        match difficulty {
            Difficulty::Easy => self.easy,
            Difficulty::Medium => self.medium,
            Difficulty::Hard => self.hard,
        }
    }
}

/// Allocation engine tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct EngineConfig {
    /// Smallest share of the whole timeline, in percent, either side of a dragged
    /// handle may shrink to.
    pub min_segment_percent: u32,
    /// Smallest span a timeline may have after a boundary edit.
    pub min_span_minutes: i64,
    /// Whether drag renegotiation stores whole-unit weights when they reproduce
    /// the target split exactly.
    pub round_drag_weights: bool,
    pub difficulty_weights: DifficultyWeights,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_segment_percent: 5,
            min_span_minutes: 1,
            round_drag_weights: true,
            difficulty_weights: DifficultyWeights::default(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate a YAML configuration document.
    pub fn parse(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Self = serde_yaml_ng::from_str(yaml)?;
        config.validate()?;
        debug!(
            min_segment_percent = config.min_segment_percent,
            min_span_minutes = config.min_span_minutes,
            "Parsed engine configuration"
        );
        Ok(config)
    }

    /// Read, parse and validate a YAML configuration file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read engine config from {}", path.display()))?;
        let config = Self::parse(&contents)
            .with_context(|| format!("Invalid engine config in {}", path.display()))?;
        Ok(config)
    }

    /// Check that every tunable is in range.
    pub fn validate(&self) -> Result<()> {
        if !(1..=49).contains(&self.min_segment_percent) {
            return Err(AllocationError::config_error(
                "minSegmentPercent",
                format!("{} is outside 1..=49", self.min_segment_percent),
            ));
        }

        if self.min_span_minutes < 1 {
            return Err(AllocationError::config_error(
                "minSpanMinutes",
                format!("{} must be at least 1", self.min_span_minutes),
            ));
        }

        for difficulty in Difficulty::ALL {
            let weight = self.difficulty_weights.weight_for(difficulty);
            if !(weight.is_finite() && weight > 0.0) {
                return Err(AllocationError::config_error(
                    "difficultyWeights",
                    format!("{:?} weight {} must be positive", difficulty, weight),
                ));
            }
        }

        Ok(())
    }

    /// Default weight for a new segment of the given difficulty.
    pub fn default_weight(&self, difficulty: Difficulty) -> f64 {
        self.difficulty_weights.weight_for(difficulty)
    }
}
