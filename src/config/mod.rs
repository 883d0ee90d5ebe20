//! Configuration module
//!
//! This module provides:
//! - Configuration types (`AppConfig`, `DetectorSettings`, `FeedConfig`, `PipelineConfig`)
//! - YAML loading functionality (`load_config`)
//! - Application constants with environment variable overrides

pub mod constants;
mod loader;
mod types;

// Re-export types
pub use types::{AppConfig, DetectorSettings, FeedConfig, PipelineConfig};

// Re-export loader functions
pub use loader::{load_config, load_config_from_str};
