//! Configuration types
//!
//! All sections are optional in YAML; missing fields fall back to defaults.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::detector::DetectorConfig;
use crate::core::graph::LogBase;
use crate::error::AppError;

use super::constants;

// ============================================================================
// Configuration Structs
// ============================================================================

/// Detection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorSettings {
    /// Logarithm base shared by graph weights and factor decoding
    pub log_base: LogBase,
    /// Abort a detection after this many milliseconds (0 = no deadline)
    pub deadline_ms: u64,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            log_base: LogBase::Natural,
            deadline_ms: 0,
        }
    }
}

impl DetectorSettings {
    pub fn detector_config(&self) -> DetectorConfig {
        DetectorConfig {
            deadline: (self.deadline_ms > 0).then(|| Duration::from_millis(self.deadline_ms)),
        }
    }
}

/// Synthetic price feed settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Delay between ticks
    pub update_interval_ms: u64,
    /// Levels generated per side of each book
    pub levels_per_side: usize,
    /// Maximum distance of a level from the mid price
    pub price_range: f64,
    /// Quantities are drawn from `[1, max_quantity)`
    pub max_quantity: u32,
    /// RNG seed, fixed for reproducible runs
    pub seed: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            update_interval_ms: 1_000,
            levels_per_side: 5,
            price_range: 0.2,
            max_quantity: 50,
            seed: 3_093_942_254_212_528,
        }
    }
}

impl FeedConfig {
    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval_ms)
    }
}

/// Channel sizing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Capacity of the feed -> coordinator update channel
    pub channel_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            channel_capacity: constants::update_channel_capacity(),
        }
    }
}

/// Root application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub detector: DetectorSettings,
    pub feed: FeedConfig,
    pub pipeline: PipelineConfig,
}

impl AppConfig {
    /// Validate all configuration rules
    pub fn validate(&self) -> Result<(), AppError> {
        let feed = &self.feed;

        if feed.update_interval_ms == 0 {
            return Err(AppError::Config("feed.update_interval_ms must be > 0".to_string()));
        }

        // A tick deletes the top level and modifies the next one
        if feed.levels_per_side < 2 {
            return Err(AppError::Config(format!(
                "feed.levels_per_side must be >= 2, got {}",
                feed.levels_per_side
            )));
        }

        // Every generated price must stay positive: lowest mid is 0.818
        if !(feed.price_range > 0.001 && feed.price_range < 0.8) {
            return Err(AppError::Config(format!(
                "feed.price_range must be in (0.001, 0.8), got {}",
                feed.price_range
            )));
        }

        if feed.max_quantity < 2 {
            return Err(AppError::Config(format!(
                "feed.max_quantity must be >= 2, got {}",
                feed.max_quantity
            )));
        }

        if self.pipeline.channel_capacity == 0 {
            return Err(AppError::Config("pipeline.channel_capacity must be > 0".to_string()));
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
