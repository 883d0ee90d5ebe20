//! Evaluation coordinator
//!
//! Drives one evaluation per price update:
//! apply → snapshot → build graph → detect → group → report.
//!
//! The update is applied (and awaited) before the snapshot is taken, so an
//! evaluation always sees its own update. Graph construction and detection
//! are CPU-bound and run on the blocking pool.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinSet;
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

use super::detector::{DetectError, DetectionReport, NegativeCycleDetector};
use super::graph::{BestPriceSnapshot, GraphBuilder, GraphError};
use super::orderbook::{OrderBookError, OrderBookStore, UpdateOutcome};
use super::report::{ArbitrageElement, ArbitrageRecord, ArbitrageReporter};
use super::types::{Action, CurrencyPair, PriceLevel, PriceUpdate};

/// Instruments that must be priced on both sides before evaluating
pub const MIN_PRICED_INSTRUMENTS: usize = 3;

// =============================================================================
// Outcomes and errors
// =============================================================================

/// Progress of one evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    BookUpdated,
    InsufficientData,
    SnapshotReady,
    GraphBuilt,
    CycleScanComplete,
    RecordsEmitted,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Idle => "idle",
            Stage::BookUpdated => "book_updated",
            Stage::InsufficientData => "insufficient_data",
            Stage::SnapshotReady => "snapshot_ready",
            Stage::GraphBuilt => "graph_built",
            Stage::CycleScanComplete => "cycle_scan_complete",
            Stage::RecordsEmitted => "records_emitted",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotOutcome {
    Ready(BestPriceSnapshot),
    InsufficientData { priced: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluationOutcome {
    InsufficientData { priced: usize },
    NoArbitrage,
    /// Number of records handed to the reporter
    Emitted(usize),
}

#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    #[error("Update rejected: {0}")]
    OrderBook(#[from] OrderBookError),

    #[error("Graph build failed: {0}")]
    Graph(#[from] GraphError),

    #[error("Detection failed: {0}")]
    Detect(#[from] DetectError),

    #[error("Evaluation task failed: {0}")]
    Task(String),
}

impl CoordinatorError {
    /// Last stage reached before the failure
    pub fn stage(&self) -> Stage {
        match self {
            CoordinatorError::OrderBook(_) => Stage::Idle,
            CoordinatorError::Graph(_) => Stage::SnapshotReady,
            CoordinatorError::Detect(_) => Stage::GraphBuilt,
            CoordinatorError::Task(_) => Stage::SnapshotReady,
        }
    }
}

/// Counters returned by [`Coordinator::run`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoordinatorStats {
    pub updates_applied: u64,
    pub updates_rejected: u64,
    pub evaluations: u64,
    pub evaluations_failed: u64,
    /// Evaluations skipped for lack of priced instruments
    pub insufficient_data: u64,
    pub records_emitted: u64,
}

// =============================================================================
// Coordinator
// =============================================================================

/// Orchestrates the evaluation pipeline.
///
/// Cheap to clone: every collaborator is shared behind an `Arc`.
#[derive(Clone)]
pub struct Coordinator {
    store: Arc<OrderBookStore>,
    builder: GraphBuilder,
    detector: Arc<NegativeCycleDetector>,
    reporter: Arc<dyn ArbitrageReporter>,
}

impl Coordinator {
    pub fn new(
        store: Arc<OrderBookStore>,
        builder: GraphBuilder,
        detector: NegativeCycleDetector,
        reporter: Arc<dyn ArbitrageReporter>,
    ) -> Self {
        Self {
            store,
            builder,
            detector: Arc::new(detector),
            reporter,
        }
    }

    pub fn store(&self) -> &Arc<OrderBookStore> {
        &self.store
    }

    /// Apply one update, then evaluate the resulting book state
    pub async fn handle_update(&self, action: Action, level: PriceLevel) -> Result<EvaluationOutcome, CoordinatorError> {
        self.apply(action, level).await?;
        self.evaluate().await
    }

    async fn apply(&self, action: Action, level: PriceLevel) -> Result<UpdateOutcome, CoordinatorError> {
        let pair = level.instrument;
        let outcome = self.store.apply_update(action, level).await?;
        trace!(pair = %pair, action = %action, outcome = ?outcome, stage = %Stage::BookUpdated, "Book updated");
        Ok(outcome)
    }

    /// Best prices of every priced instrument, if enough are priced
    pub async fn snapshot(&self) -> SnapshotOutcome {
        let snapshot = self.store.snapshot().await;
        if snapshot.len() < MIN_PRICED_INSTRUMENTS {
            SnapshotOutcome::InsufficientData { priced: snapshot.len() }
        } else {
            SnapshotOutcome::Ready(snapshot)
        }
    }

    /// Evaluate current book state and report any arbitrage found
    pub async fn evaluate(&self) -> Result<EvaluationOutcome, CoordinatorError> {
        let evaluation_id = Uuid::new_v4();

        let snapshot = match self.snapshot().await {
            SnapshotOutcome::Ready(snapshot) => snapshot,
            SnapshotOutcome::InsufficientData { priced } => {
                debug!(
                    %evaluation_id,
                    priced,
                    stage = %Stage::InsufficientData,
                    "Not enough priced instruments, evaluation skipped"
                );
                return Ok(EvaluationOutcome::InsufficientData { priced });
            }
        };
        debug!(%evaluation_id, priced = snapshot.len(), stage = %Stage::SnapshotReady, "Snapshot taken");

        let builder = self.builder;
        let detector = Arc::clone(&self.detector);
        let (snapshot, report) = tokio::task::spawn_blocking(move || -> Result<_, CoordinatorError> {
            let graph = builder.build(&snapshot)?;
            debug!(
                %evaluation_id,
                vertices = graph.vertices().len(),
                edges = graph.edges().len(),
                stage = %Stage::GraphBuilt,
                "Graph built"
            );
            let report = detector.detect(&graph)?;
            Ok((snapshot, report))
        })
        .await
        .map_err(|e| CoordinatorError::Task(e.to_string()))??;
        debug!(%evaluation_id, pairs = report.factors.len(), stage = %Stage::CycleScanComplete, "Cycle scan complete");

        if report.is_empty() {
            return Ok(EvaluationOutcome::NoArbitrage);
        }

        let records = group_records(evaluation_id, Utc::now(), &report, &snapshot);
        for record in &records {
            self.reporter.report_arbitrage(record);
        }
        debug!(%evaluation_id, records = records.len(), stage = %Stage::RecordsEmitted, "Records emitted");
        Ok(EvaluationOutcome::Emitted(records.len()))
    }

    /// Consume updates until shutdown or until the feed closes.
    ///
    /// Each update is applied in arrival order; its evaluation runs as its
    /// own task. Outstanding evaluations are awaited before returning.
    pub async fn run(
        &self,
        mut update_rx: mpsc::Receiver<PriceUpdate>,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> CoordinatorStats {
        let mut stats = CoordinatorStats::default();
        let mut evaluations: JoinSet<Result<EvaluationOutcome, CoordinatorError>> = JoinSet::new();

        info!("Coordinator started");
        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    debug!("Coordinator shutting down");
                    break;
                }
                maybe_update = update_rx.recv() => {
                    let Some(update) = maybe_update else {
                        debug!("Update channel closed");
                        break;
                    };
                    match self.apply(update.action, update.level).await {
                        Ok(_) => {
                            stats.updates_applied += 1;
                            let this = self.clone();
                            evaluations.spawn(async move { this.evaluate().await });
                        }
                        Err(e) => {
                            stats.updates_rejected += 1;
                            warn!(error = %e, "Price update rejected");
                        }
                    }
                }
                Some(joined) = evaluations.join_next(), if !evaluations.is_empty() => {
                    record_evaluation(&mut stats, joined);
                }
            }
        }

        while let Some(joined) = evaluations.join_next().await {
            record_evaluation(&mut stats, joined);
        }

        info!(
            updates_applied = stats.updates_applied,
            updates_rejected = stats.updates_rejected,
            evaluations = stats.evaluations,
            insufficient_data = stats.insufficient_data,
            records = stats.records_emitted,
            "Coordinator stopped"
        );
        stats
    }
}

fn record_evaluation(
    stats: &mut CoordinatorStats,
    joined: Result<Result<EvaluationOutcome, CoordinatorError>, tokio::task::JoinError>,
) {
    stats.evaluations += 1;
    match joined {
        Ok(Ok(EvaluationOutcome::Emitted(n))) => stats.records_emitted += n as u64,
        Ok(Ok(EvaluationOutcome::InsufficientData { .. })) => stats.insufficient_data += 1,
        Ok(Ok(EvaluationOutcome::NoArbitrage)) => {}
        Ok(Err(e)) => {
            stats.evaluations_failed += 1;
            error!(error = %e, stage = %e.stage(), "Evaluation failed");
        }
        Err(e) => {
            stats.evaluations_failed += 1;
            error!(error = %e, "Evaluation task panicked");
        }
    }
}

/// One record per distinct factor, highest factor first, elements sorted by pair
fn group_records(
    evaluation_id: Uuid,
    detected_at: DateTime<Utc>,
    report: &DetectionReport,
    snapshot: &BestPriceSnapshot,
) -> Vec<ArbitrageRecord> {
    let mut by_factor: BTreeMap<Decimal, Vec<CurrencyPair>> = BTreeMap::new();
    for (pair, factor) in &report.factors {
        by_factor.entry(*factor).or_default().push(*pair);
    }

    by_factor
        .into_iter()
        .rev()
        .map(|(factor, pairs)| ArbitrageRecord {
            evaluation_id,
            detected_at,
            factor,
            elements: pairs
                .into_iter()
                .filter_map(|pair| {
                    let prices = snapshot.get(&pair)?;
                    Some(ArbitrageElement {
                        pair,
                        best_bid: prices.bid.clone(),
                        best_ask: prices.ask.clone(),
                    })
                })
                .collect(),
        })
        .collect()
}
