//! Channel bundle wiring the feed, coordinator and reporters together.

use tokio::sync::{broadcast, mpsc};

use super::report::ArbitrageRecord;
use super::types::PriceUpdate;

/// Default channel capacity for bounded channels
pub const DEFAULT_CHANNEL_CAPACITY: usize = 100;

/// Bundle of all inter-task communication channels
#[derive(Debug)]
pub struct ChannelBundle {
    /// Feed -> Coordinator: price level updates
    pub update_tx: mpsc::Sender<PriceUpdate>,
    pub update_rx: mpsc::Receiver<PriceUpdate>,

    /// Coordinator -> consumers: arbitrage records (via `ChannelReporter`)
    pub record_tx: mpsc::Sender<ArbitrageRecord>,
    pub record_rx: mpsc::Receiver<ArbitrageRecord>,

    /// Shutdown broadcast: main -> all tasks
    pub shutdown_tx: broadcast::Sender<()>,
}

impl ChannelBundle {
    pub fn new(capacity: usize) -> Self {
        let (update_tx, update_rx) = mpsc::channel(capacity);
        let (record_tx, record_rx) = mpsc::channel(capacity);
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            update_tx,
            update_rx,
            record_tx,
            record_rx,
            shutdown_tx,
        }
    }

    pub fn subscribe_shutdown(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }
}

impl Default for ChannelBundle {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}
