//! End-to-End Integration Tests
//!
//! This module tests the complete detection pipeline:
//! 1. Config loading and component wiring
//! 2. Feed -> update channel -> coordinator
//! 3. Snapshot, graph build, negative-cycle detection
//! 4. Record grouping and reporting
//! 5. Graceful shutdown of every task
//!
//! # Running the tests
//! ```bash
//! cargo test --test full_cycle
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rust_decimal::Decimal;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{sleep, timeout};
use uuid::Uuid;

use tri_arb::config::{load_config_from_str, AppConfig, FeedConfig};
use tri_arb::core::{
    Action, ArbitrageRecord, ArbitrageReporter, ChannelBundle, ChannelReporter, Coordinator, CurrencyPair,
    CurrencyPairLookup, EvaluationOutcome, GraphBuilder, LogBase, NegativeCycleDetector, OrderBookStore, PriceLevel,
};
use tri_arb::feed::{ChannelListener, OrderbookListener, PriceGenerator};

// =============================================================================
// Recording Reporter
// =============================================================================

/// Reporter that keeps every record for assertions
#[derive(Default)]
struct RecordingReporter {
    records: Mutex<Vec<ArbitrageRecord>>,
}

impl RecordingReporter {
    fn records(&self) -> Vec<ArbitrageRecord> {
        self.records.lock().unwrap().clone()
    }
}

impl ArbitrageReporter for RecordingReporter {
    fn report_arbitrage(&self, record: &ArbitrageRecord) {
        self.records.lock().unwrap().push(record.clone());
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

fn build_coordinator(config: &AppConfig, reporter: Arc<dyn ArbitrageReporter>) -> Coordinator {
    Coordinator::new(
        Arc::new(OrderBookStore::new()),
        GraphBuilder::new(config.detector.log_base),
        NegativeCycleDetector::with_config(config.detector.detector_config(), Arc::new(CurrencyPairLookup::new())),
        reporter,
    )
}

/// Feed both sides of each instrument through the listener interface
async fn feed_quotes(listener: &dyn OrderbookListener, quotes: &[(CurrencyPair, Decimal, Decimal)]) {
    for (i, (pair, bid, ask)) in quotes.iter().enumerate() {
        let id = 100 + i as u64;
        listener
            .on_price_update(Action::Insert, PriceLevel::new(id, *pair, false, 10, *bid))
            .await;
        listener
            .on_price_update(Action::Insert, PriceLevel::new(id, *pair, true, 10, *ask))
            .await;
    }
}

fn arbitrage_quotes() -> Vec<(CurrencyPair, Decimal, Decimal)> {
    vec![
        (CurrencyPair::UsdGbp, dec("1.24"), dec("1.22")),
        (CurrencyPair::EurUsd, dec("1.08"), dec("1.10")),
        (CurrencyPair::EurGbp, dec("0.84"), dec("0.86")),
    ]
}

/// Reciprocal sides with consistent crosses: EUR_GBP = EUR_USD * USD_GBP
fn reciprocal_quotes() -> Vec<(CurrencyPair, Decimal, Decimal)> {
    [
        (CurrencyPair::UsdGbp, dec("0.78")),
        (CurrencyPair::EurUsd, dec("1.08")),
        (CurrencyPair::EurGbp, dec("0.8424")),
    ]
    .into_iter()
    .map(|(pair, bid)| (pair, bid, Decimal::ONE / bid))
    .collect()
}

/// Reciprocal sides, EUR -> USD -> GBP -> EUR returns 1.10 * 0.80 / 0.84
fn one_way_triangle_quotes() -> Vec<(CurrencyPair, Decimal, Decimal)> {
    [
        (CurrencyPair::EurUsd, dec("1.10")),
        (CurrencyPair::UsdGbp, dec("0.80")),
        (CurrencyPair::EurGbp, dec("0.84")),
    ]
    .into_iter()
    .map(|(pair, bid)| (pair, bid, Decimal::ONE / bid))
    .collect()
}

fn assert_well_formed(record: &ArbitrageRecord) {
    assert!(record.factor > Decimal::ZERO, "non-positive factor {}", record.factor);
    assert!(!record.elements.is_empty());
    let pairs: Vec<_> = record.pairs().collect();
    let mut sorted = pairs.clone();
    sorted.sort();
    sorted.dedup();
    assert_eq!(pairs, sorted, "elements must be sorted and unique");
}

// =============================================================================
// Test 1: Scenario with arbitrage
// =============================================================================

#[tokio::test]
async fn test_arbitrage_detected_through_listener() {
    let reporter = Arc::new(RecordingReporter::default());
    let coordinator = build_coordinator(&AppConfig::default(), reporter.clone());

    feed_quotes(&coordinator, &arbitrage_quotes()).await;

    // Records from the final, fully priced evaluation
    let outcome = coordinator.evaluate().await.unwrap();
    let EvaluationOutcome::Emitted(n) = outcome else {
        panic!("expected records, got {:?}", outcome);
    };
    let records = reporter.records();
    let last = &records[records.len() - n..];
    for record in last {
        assert_well_formed(record);
    }
    for window in last.windows(2) {
        assert!(window[0].factor > window[1].factor);
    }
}

// =============================================================================
// Test 2: Scenario without arbitrage
// =============================================================================

#[tokio::test]
async fn test_reciprocal_book_reports_nothing() {
    let reporter = Arc::new(RecordingReporter::default());
    let coordinator = build_coordinator(&AppConfig::default(), reporter.clone());

    for (pair, bid, ask) in reciprocal_quotes() {
        coordinator
            .store()
            .apply_update(Action::Insert, PriceLevel::new(1, pair, false, 10, bid))
            .await
            .unwrap();
        coordinator
            .store()
            .apply_update(Action::Insert, PriceLevel::new(1, pair, true, 10, ask))
            .await
            .unwrap();
    }

    assert_eq!(coordinator.evaluate().await.unwrap(), EvaluationOutcome::NoArbitrage);
    assert!(reporter.records().is_empty());
}

#[tokio::test]
async fn test_one_way_triangle_reported() {
    let reporter = Arc::new(RecordingReporter::default());
    let coordinator = build_coordinator(&AppConfig::default(), reporter.clone());

    for (pair, bid, ask) in one_way_triangle_quotes() {
        coordinator
            .store()
            .apply_update(Action::Insert, PriceLevel::new(1, pair, false, 10, bid))
            .await
            .unwrap();
        coordinator
            .store()
            .apply_update(Action::Insert, PriceLevel::new(1, pair, true, 10, ask))
            .await
            .unwrap();
    }

    assert_eq!(coordinator.evaluate().await.unwrap(), EvaluationOutcome::Emitted(1));
    let records = reporter.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].factor, dec("0.048"));
    assert_eq!(
        records[0].pairs().collect::<Vec<_>>(),
        vec![CurrencyPair::EurUsd, CurrencyPair::EurGbp]
    );
}

// =============================================================================
// Test 3: Config-driven wiring
// =============================================================================

#[tokio::test]
async fn test_binary_log_base_from_config() {
    let config = load_config_from_str(
        r#"
detector:
  log_base: binary
  deadline_ms: 5000
"#,
    )
    .unwrap();
    assert_eq!(config.detector.log_base, LogBase::Binary);

    let reporter = Arc::new(RecordingReporter::default());
    let coordinator = build_coordinator(&config, reporter.clone());
    feed_quotes(&coordinator, &arbitrage_quotes()).await;

    assert!(matches!(
        coordinator.evaluate().await.unwrap(),
        EvaluationOutcome::Emitted(n) if n > 0
    ));
}

// =============================================================================
// Test 4: Full pipeline (generator -> channel -> coordinator -> reporter)
// =============================================================================

#[tokio::test]
async fn test_generator_pipeline_end_to_end() {
    let feed = FeedConfig {
        update_interval_ms: 5,
        ..FeedConfig::default()
    };
    let config = AppConfig {
        feed: feed.clone(),
        ..AppConfig::default()
    };

    let ChannelBundle {
        update_tx,
        update_rx,
        shutdown_tx,
        ..
    } = ChannelBundle::new(256);
    let (record_tx, mut record_rx) = mpsc::channel(100_000);

    let coordinator = build_coordinator(&config, Arc::new(ChannelReporter::new(record_tx)));
    let store = Arc::clone(coordinator.store());

    let coordinator_task = {
        let shutdown_rx = shutdown_tx.subscribe();
        tokio::spawn(async move { coordinator.run(update_rx, shutdown_rx).await })
    };
    let feed_task = tokio::spawn(PriceGenerator::new(&feed).run(
        Arc::new(ChannelListener::new(update_tx)),
        feed.update_interval(),
        shutdown_tx.subscribe(),
    ));

    // Wait until every instrument is priced, then let a few ticks through
    timeout(Duration::from_secs(5), async {
        while store.snapshot().await.len() < CurrencyPair::ALL.len() {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("books never became fully priced");
    sleep(Duration::from_millis(50)).await;

    shutdown_tx.send(()).unwrap();
    let ticks = feed_task.await.unwrap();
    let stats = coordinator_task.await.unwrap();

    assert!(ticks > 0, "generator should have ticked");
    assert!(stats.updates_applied >= 1);
    assert_eq!(stats.updates_rejected, 0);
    assert_eq!(stats.evaluations, stats.updates_applied);
    assert_eq!(stats.evaluations_failed, 0);

    let mut by_evaluation: HashMap<Uuid, Vec<Decimal>> = HashMap::new();
    let mut delivered = 0u64;
    while let Ok(record) = record_rx.try_recv() {
        assert_well_formed(&record);
        by_evaluation.entry(record.evaluation_id).or_default().push(record.factor);
        delivered += 1;
    }
    assert_eq!(delivered, stats.records_emitted);
    for factors in by_evaluation.values() {
        for window in factors.windows(2) {
            assert!(window[0] > window[1], "records of one evaluation must be in descending factor order");
        }
    }
}

// =============================================================================
// Test 5: Graceful Shutdown
// =============================================================================

#[tokio::test]
async fn test_graceful_shutdown_propagation() {
    let ChannelBundle {
        update_tx,
        update_rx,
        shutdown_tx,
        ..
    } = ChannelBundle::default();
    let coordinator = build_coordinator(&AppConfig::default(), Arc::new(RecordingReporter::default()));

    let coordinator_task = {
        let shutdown_rx: broadcast::Receiver<()> = shutdown_tx.subscribe();
        tokio::spawn(async move { coordinator.run(update_rx, shutdown_rx).await })
    };
    let feed_task = tokio::spawn(PriceGenerator::new(&FeedConfig::default()).run(
        Arc::new(ChannelListener::new(update_tx)),
        Duration::from_secs(3_600),
        shutdown_tx.subscribe(),
    ));

    sleep(Duration::from_millis(10)).await;
    let receivers = shutdown_tx.send(()).expect("Shutdown send should succeed");
    assert_eq!(receivers, 2);

    let ticks = timeout(Duration::from_secs(5), feed_task)
        .await
        .expect("feed should stop")
        .unwrap();
    let stats = timeout(Duration::from_secs(5), coordinator_task)
        .await
        .expect("coordinator should stop")
        .unwrap();

    assert_eq!(ticks, 0);
    assert_eq!(stats.evaluations, stats.updates_applied);
}
