//! Core module - order books, conversion graph, cycle detection, coordination
//!
//! This module uses **explicit re-exports** instead of glob exports (`pub use module::*`)
//! to keep the public API visible in one place.
//!
//! ## Usage
//! Prefer importing from `crate::core`:
//! ```ignore
//! use tri_arb::core::{Coordinator, GraphBuilder, NegativeCycleDetector, OrderBookStore};
//! ```
//!
//! ## Adding New Public Types
//! When adding new public types to submodules, explicitly add them to the
//! re-exports below to make them part of the public API.

pub mod channels;
pub mod coordinator;
pub mod detector;
pub mod factor;
pub mod graph;
pub mod logging;
pub mod orderbook;
pub mod report;
pub mod types;

// Explicit re-exports for types module
pub use types::{Action, Currency, CurrencyPair, CurrencyPairLookup, PriceLevel, PriceUpdate, Side};

// Explicit re-exports for orderbook module
pub use orderbook::{BestPrices, InstrumentBook, OrderBookError, OrderBookSide, OrderBookStore, UpdateOutcome};

// Explicit re-exports for graph module
pub use graph::{BestPriceSnapshot, Edge, Graph, GraphBuilder, GraphError, LogBase, Vertex};

// Explicit re-exports for factor module
pub use factor::{FactorCalculator, FactorError};

// Explicit re-exports for detector module
pub use detector::{ArbitrageCycle, DetectError, DetectionReport, DetectorConfig, NegativeCycleDetector};

// Explicit re-exports for report module
pub use report::{ArbitrageElement, ArbitrageRecord, ArbitrageReporter, ChannelReporter, TracingReporter};

// Explicit re-exports for coordinator module
pub use coordinator::{
    Coordinator, CoordinatorError, CoordinatorStats, EvaluationOutcome, SnapshotOutcome, Stage,
    MIN_PRICED_INSTRUMENTS,
};

// Explicit re-exports for channels module
pub use channels::{ChannelBundle, DEFAULT_CHANNEL_CAPACITY};

// Explicit re-exports for logging module
pub use logging::{init_logging, init_logging_with_config, LoggingConfig, DEFAULT_LOG_LEVEL};
