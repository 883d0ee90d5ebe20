//! Application-wide constants and configuration defaults
//!
//! Values that sit outside the YAML file, overridable via environment
//! variables.

use std::path::PathBuf;

use crate::core::channels::DEFAULT_CHANNEL_CAPACITY;

use super::types::AppConfig;

/// Default configuration file, relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

/// Path of the YAML configuration file (default: `config.yaml`)
///
/// Environment variable: `CONFIG_PATH`
pub fn config_path() -> PathBuf {
    std::env::var("CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Default capacity of the feed -> coordinator update channel (default: 100)
///
/// Used when the YAML omits `pipeline.channel_capacity`.
///
/// Environment variable: `UPDATE_CHANNEL_CAPACITY`
pub fn update_channel_capacity() -> usize {
    std::env::var("UPDATE_CHANNEL_CAPACITY")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_CHANNEL_CAPACITY)
}

/// Print the effective configuration (startup logs)
pub fn log_configuration(config: &AppConfig) {
    tracing::info!("=== Application Configuration ===");
    tracing::info!("Detector:");
    tracing::info!("  - Log base: {}", config.detector.log_base);
    tracing::info!("  - Deadline: {}ms (0 = none)", config.detector.deadline_ms);

    tracing::info!("Feed:");
    tracing::info!("  - Update interval: {:?}", config.feed.update_interval());
    tracing::info!("  - Levels per side: {}", config.feed.levels_per_side);
    tracing::info!("  - Price range: {}", config.feed.price_range);
    tracing::info!("  - Max quantity: {}", config.feed.max_quantity);
    tracing::info!("  - Seed: {}", config.feed.seed);

    tracing::info!("Pipeline:");
    tracing::info!("  - Update channel capacity: {}", config.pipeline.channel_capacity);
    tracing::info!("==================================");
}
