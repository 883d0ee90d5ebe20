//! Arbitrage records and the reporters that receive them.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use super::types::{CurrencyPair, PriceLevel};

/// One instrument taking part in an arbitrage, with the prices it was found at
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArbitrageElement {
    pub pair: CurrencyPair,
    pub best_bid: PriceLevel,
    pub best_ask: PriceLevel,
}

/// Every instrument sharing one factor within one evaluation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArbitrageRecord {
    /// Shared by all records of one evaluation
    pub evaluation_id: Uuid,
    pub detected_at: DateTime<Utc>,
    pub factor: Decimal,
    /// Sorted by pair
    pub elements: Vec<ArbitrageElement>,
}

impl ArbitrageRecord {
    pub fn pairs(&self) -> impl Iterator<Item = CurrencyPair> + '_ {
        self.elements.iter().map(|e| e.pair)
    }

    fn pair_list(&self) -> String {
        self.pairs()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Outbound sink for detected arbitrage
pub trait ArbitrageReporter: Send + Sync {
    fn report_arbitrage(&self, record: &ArbitrageRecord);
}

/// Emits each record as a structured log event
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl ArbitrageReporter for TracingReporter {
    fn report_arbitrage(&self, record: &ArbitrageRecord) {
        info!(
            evaluation_id = %record.evaluation_id,
            factor = %record.factor,
            pairs = %record.pair_list(),
            detected_at = %record.detected_at.to_rfc3339(),
            "Arbitrage opportunity detected"
        );
        for element in &record.elements {
            info!(
                evaluation_id = %record.evaluation_id,
                pair = %element.pair,
                best_bid = %element.best_bid.price,
                best_ask = %element.best_ask.price,
                bid_qty = element.best_bid.quantity,
                ask_qty = element.best_ask.quantity,
                "Arbitrage leg"
            );
        }
    }
}

/// Forwards records to an mpsc channel without blocking the evaluation
#[derive(Debug, Clone)]
pub struct ChannelReporter {
    tx: mpsc::Sender<ArbitrageRecord>,
}

impl ChannelReporter {
    pub fn new(tx: mpsc::Sender<ArbitrageRecord>) -> Self {
        Self { tx }
    }
}

impl ArbitrageReporter for ChannelReporter {
    fn report_arbitrage(&self, record: &ArbitrageRecord) {
        match self.tx.try_send(record.clone()) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(
                    evaluation_id = %record.evaluation_id,
                    factor = %record.factor,
                    "Arbitrage channel full, record dropped"
                );
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!(
                    evaluation_id = %record.evaluation_id,
                    "Arbitrage channel closed, record dropped"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(factor: &str) -> ArbitrageRecord {
        let pair = CurrencyPair::EurUsd;
        ArbitrageRecord {
            evaluation_id: Uuid::new_v4(),
            detected_at: Utc::now(),
            factor: factor.parse().unwrap(),
            elements: vec![ArbitrageElement {
                pair,
                best_bid: PriceLevel::new(1, pair, false, 5, Decimal::new(108, 2)),
                best_ask: PriceLevel::new(2, pair, true, 5, Decimal::new(110, 2)),
            }],
        }
    }

    #[test]
    fn test_channel_reporter_forwards() {
        let (tx, mut rx) = mpsc::channel(4);
        let reporter = ChannelReporter::new(tx);
        let rec = record("0.012");

        reporter.report_arbitrage(&rec);

        assert_eq!(rx.try_recv().unwrap(), rec);
    }

    #[test]
    fn test_channel_reporter_full_drops() {
        let (tx, mut rx) = mpsc::channel(1);
        let reporter = ChannelReporter::new(tx);

        reporter.report_arbitrage(&record("0.010"));
        reporter.report_arbitrage(&record("0.020"));

        assert_eq!(rx.try_recv().unwrap().factor, Decimal::new(10, 3));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_channel_reporter_closed_does_not_panic() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        ChannelReporter::new(tx).report_arbitrage(&record("0.010"));
    }

    #[test]
    fn test_tracing_reporter() {
        crate::core::logging::init_test_logging("debug");
        TracingReporter.report_arbitrage(&record("0.500"));
    }

    #[test]
    fn test_record_serializes() {
        let json = serde_json::to_value(record("0.250")).unwrap();
        assert_eq!(json["elements"][0]["pair"], "EUR_USD");
        assert!(json["evaluation_id"].is_string());
    }
}
