//! Triangular FX arbitrage detector
//!
//! Maintains best bid/ask per currency pair from a stream of price level
//! updates and, on every update, looks for a loop of conversions that returns
//! more than it started with:
//! - Concurrent per-instrument order books
//! - Conversion graph weighted by `-log(rate)`
//! - Bellman–Ford negative-cycle detection and factor pricing

pub mod config;
pub mod core;
pub mod error;
pub mod feed;

pub use error::AppError;
