//! Market data feed
//!
//! The inbound side of the pipeline: anything producing price level updates
//! talks to an [`OrderbookListener`]. The shipped producer is the synthetic
//! [`PriceGenerator`]; consumers are the [`Coordinator`] itself or a
//! [`ChannelListener`] forwarding into the coordinator's update channel.

pub mod generator;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{trace, warn};

use crate::core::coordinator::Coordinator;
use crate::core::types::{Action, PriceLevel, PriceUpdate};

pub use generator::PriceGenerator;

/// Receiver of order book updates
///
/// Called once per update, in feed order. Implementations must not assume
/// anything about the calling task.
#[async_trait]
pub trait OrderbookListener: Send + Sync {
    async fn on_price_update(&self, action: Action, level: PriceLevel);
}

/// Forwards updates into an mpsc channel, waiting for capacity.
#[derive(Debug, Clone)]
pub struct ChannelListener {
    tx: mpsc::Sender<PriceUpdate>,
}

impl ChannelListener {
    pub fn new(tx: mpsc::Sender<PriceUpdate>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl OrderbookListener for ChannelListener {
    async fn on_price_update(&self, action: Action, level: PriceLevel) {
        let pair = level.instrument;
        let id = level.id;
        if self.tx.send(PriceUpdate::new(action, level)).await.is_err() {
            warn!(pair = %pair, id = id, action = %action, "Update channel closed, price update dropped");
        }
    }
}

/// Direct wiring: apply and evaluate inline on the caller's task
#[async_trait]
impl OrderbookListener for Coordinator {
    async fn on_price_update(&self, action: Action, level: PriceLevel) {
        let pair = level.instrument;
        match self.handle_update(action, level).await {
            Ok(outcome) => trace!(pair = %pair, action = %action, outcome = ?outcome, "Update evaluated"),
            Err(e) => warn!(pair = %pair, action = %action, error = %e, stage = %e.stage(), "Update failed"),
        }
    }
}
