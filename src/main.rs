//! corebank service entry point
//!
//! Wires the transfer engine and the scheduled transfer processor to the
//! ledger database, then runs the sweep loop until Ctrl+C. The HTTP layer
//! and authentication live in separate services; this process owns the
//! ledger core.

use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;

use corebank::config::AppConfig;
use corebank::db::{Database, init_schema};
use corebank::notification::{NotificationSink, TracingNotifier};
use corebank::scheduled::{ScheduledTransferProcessor, ShutdownSignal, SweepConfig};
use corebank::transfer::{TransferConfig, TransferEngine};

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = get_env();
    let config = AppConfig::load(&env);
    let _log_guard = corebank::logging::init_logging(&config);

    tracing::info!("starting corebank in {} mode", env);

    let postgres_url = config
        .postgres_url
        .clone()
        .context("postgres_url must be set in config")?;
    let db = Arc::new(Database::connect(&postgres_url).await?);
    init_schema(db.pool()).await?;

    let notifier: Arc<dyn NotificationSink> = Arc::new(TracingNotifier);

    let engine = Arc::new(TransferEngine::new(
        db.clone(),
        notifier.clone(),
        TransferConfig {
            high_value_threshold: config.transfer.high_value_threshold,
            lock_wait: Duration::from_millis(config.transfer.lock_wait_ms),
        },
    ));

    let processor = Arc::new(ScheduledTransferProcessor::new(
        db.clone(),
        engine.clone(),
        notifier.clone(),
        SweepConfig {
            interval: Duration::from_secs(config.sweep.interval_secs),
            batch_size: config.sweep.batch_size,
        },
    ));

    let shutdown = Arc::new(ShutdownSignal::new());

    let sweep_handle = {
        let processor = processor.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            processor.run(shutdown).await;
        })
    };

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;

    tracing::info!("shutdown requested");
    shutdown.request_shutdown();

    // The processor finishes its current batch before exiting
    sweep_handle.await.ok();

    tracing::info!("corebank stopped");
    Ok(())
}
