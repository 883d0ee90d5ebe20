//! Application-wide error types using thiserror
//!
//! Module errors fold into `AppError` so the binary and integration code
//! handle every failure through one type.

use thiserror::Error;

use crate::core::coordinator::CoordinatorError;
use crate::core::detector::DetectError;
use crate::core::factor::FactorError;
use crate::core::graph::GraphError;
use crate::core::orderbook::OrderBookError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Order book error: {0}")]
    OrderBook(#[from] OrderBookError),

    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("Factor error: {0}")]
    Factor(#[from] FactorError),

    #[error("Detection error: {0}")]
    Detect(#[from] DetectError),

    #[error("Coordinator error: {0}")]
    Coordinator(#[from] CoordinatorError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
