//! Triangular arbitrage detector - entry point
//!
//! 1. Loads `.env` and configuration
//! 2. Starts the synthetic price feed
//! 3. Runs the coordinator over the update stream
//! 4. Logs every arbitrage record
//! 5. Shuts down cleanly on Ctrl+C

use std::sync::Arc;

use tokio::signal;
use tracing::{error, info};
use tri_arb::config::{self, constants};
use tri_arb::core::{
    init_logging, ArbitrageReporter, ChannelBundle, ChannelReporter, Coordinator, CurrencyPairLookup, GraphBuilder,
    NegativeCycleDetector, OrderBookStore, TracingReporter,
};
use tri_arb::feed::{ChannelListener, PriceGenerator};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file (if it exists)
    dotenvy::dotenv().ok();

    init_logging();
    info!("Triangular arbitrage detector starting");

    let config_path = constants::config_path();
    info!(path = %config_path.display(), "Loading configuration");
    let config = match config::load_config(&config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(error = %e, "Configuration failed");
            std::process::exit(1);
        }
    };
    constants::log_configuration(&config);

    let ChannelBundle {
        update_tx,
        update_rx,
        record_tx,
        mut record_rx,
        shutdown_tx,
    } = ChannelBundle::new(config.pipeline.channel_capacity);

    // Spawn SIGINT handler task
    let shutdown_signal = shutdown_tx.clone();
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                info!("Graceful shutdown initiated");
                let _ = shutdown_signal.send(());
            }
            Err(err) => {
                error!(error = %err, "Failed to listen for Ctrl+C signal");
            }
        }
    });

    // Records are logged off the evaluation path
    let sink_task = tokio::spawn(async move {
        let reporter = TracingReporter;
        let mut records = 0u64;
        while let Some(record) = record_rx.recv().await {
            reporter.report_arbitrage(&record);
            records += 1;
        }
        records
    });

    let coordinator = Coordinator::new(
        Arc::new(OrderBookStore::new()),
        GraphBuilder::new(config.detector.log_base),
        NegativeCycleDetector::with_config(config.detector.detector_config(), Arc::new(CurrencyPairLookup::new())),
        Arc::new(ChannelReporter::new(record_tx)),
    );
    let coordinator_shutdown = shutdown_tx.subscribe();
    let coordinator_task = tokio::spawn(async move { coordinator.run(update_rx, coordinator_shutdown).await });

    let generator = PriceGenerator::new(&config.feed);
    let feed_task = tokio::spawn(generator.run(
        Arc::new(ChannelListener::new(update_tx)),
        config.feed.update_interval(),
        shutdown_tx.subscribe(),
    ));

    info!("Pipeline running. Press Ctrl+C to stop.");

    let ticks = feed_task.await?;
    let stats = coordinator_task.await?;
    let records = sink_task.await?;

    info!(
        ticks,
        updates_applied = stats.updates_applied,
        updates_rejected = stats.updates_rejected,
        evaluations = stats.evaluations,
        evaluations_failed = stats.evaluations_failed,
        insufficient_data = stats.insufficient_data,
        records,
        "Clean exit"
    );
    Ok(())
}
