//! Scheduled Transfer Processor
//!
//! Periodic sweep over due pending items. Each item runs in its own unit
//! of work; one item's failure is recorded as that item's terminal
//! `failed` status and never stops the rest of the batch. The sweep loop
//! stops between ticks, never mid-item.

use chrono::Utc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::db::Database;
use crate::notification::{NotificationCategory, NotificationSink};
use crate::transfer::{TransferEngine, TransferError, TransferOutcome};

use super::models::{ScheduleStatus, ScheduledTransfer, scheduled_request_id};
use super::repository::ScheduledTransferRepository;

/// Sweep configuration
#[derive(Debug, Clone)]
pub struct SweepConfig {
    /// How often to sweep for due items
    pub interval: Duration,
    /// Maximum items per sweep
    pub batch_size: i64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            batch_size: 100,
        }
    }
}

/// Cooperative stop flag for the sweep loop
#[derive(Default)]
pub struct ShutdownSignal {
    flag: AtomicBool,
    notify: Notify,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown; the loop exits at the next tick boundary
    pub fn request_shutdown(&self) {
        self.flag.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Wait until shutdown is requested
    pub async fn wait(&self) {
        while !self.is_shutdown_requested() {
            let notified = self.notify.notified();
            // Re-check after registering, the flag may have flipped between
            // the loop condition and here
            if self.is_shutdown_requested() {
                break;
            }
            notified.await;
        }
    }
}

/// Result of one sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    pub processed: usize,
    pub completed: usize,
    pub failed: usize,
}

/// Periodic processor for due scheduled transfers
pub struct ScheduledTransferProcessor {
    db: Arc<Database>,
    engine: Arc<TransferEngine>,
    notifier: Arc<dyn NotificationSink>,
    config: SweepConfig,
}

impl ScheduledTransferProcessor {
    pub fn new(
        db: Arc<Database>,
        engine: Arc<TransferEngine>,
        notifier: Arc<dyn NotificationSink>,
        config: SweepConfig,
    ) -> Self {
        Self {
            db,
            engine,
            notifier,
            config,
        }
    }

    /// Create with default sweep configuration
    pub fn with_defaults(
        db: Arc<Database>,
        engine: Arc<TransferEngine>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        Self::new(db, engine, notifier, SweepConfig::default())
    }

    /// Run the sweep loop until shutdown is requested.
    ///
    /// A sweep in progress always finishes its current batch; the shutdown
    /// check sits between ticks.
    pub async fn run(&self, shutdown: Arc<ShutdownSignal>) {
        info!(
            interval_secs = self.config.interval.as_secs(),
            batch_size = self.config.batch_size,
            "starting scheduled transfer processor"
        );

        let mut tick = tokio::time::interval(self.config.interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    if shutdown.is_shutdown_requested() {
                        break;
                    }
                    match self.tick().await {
                        Ok(stats) if stats.processed > 0 => {
                            info!(
                                processed = stats.processed,
                                completed = stats.completed,
                                failed = stats.failed,
                                "sweep finished"
                            );
                        }
                        Ok(_) => debug!("no due scheduled transfers"),
                        Err(e) => error!(error = %e, "sweep failed"),
                    }
                }
                _ = shutdown.wait() => break,
            }
        }

        info!("scheduled transfer processor stopped");
    }

    /// Run a single sweep over due pending items.
    ///
    /// Single-flight execution is the caller's contract; the CAS status
    /// transition keeps an accidental overlap from double-finalizing an
    /// item.
    pub async fn tick(&self) -> Result<SweepStats, TransferError> {
        let due =
            ScheduledTransferRepository::find_due(self.db.pool(), Utc::now(), self.config.batch_size)
                .await?;

        let mut stats = SweepStats::default();

        for item in due {
            stats.processed += 1;

            match self.process_item(&item).await {
                Ok(outcome) => {
                    self.finalize(&item, ScheduleStatus::Completed).await;
                    stats.completed += 1;

                    debug!(
                        schedule_id = item.id,
                        status = ?outcome.status,
                        "scheduled transfer completed"
                    );
                    self.notify(
                        item.user_id,
                        format!("scheduled transfer completed: {}", item.amount),
                        NotificationCategory::ScheduledTransfer,
                    )
                    .await;
                }
                Err(e) => {
                    // Per-item isolation: record the terminal failure and
                    // keep sweeping.
                    warn!(schedule_id = item.id, error = %e, "scheduled transfer failed");
                    self.finalize(&item, ScheduleStatus::Failed).await;
                    stats.failed += 1;

                    let category = match e {
                        TransferError::InsufficientFunds => {
                            NotificationCategory::InsufficientBalance
                        }
                        _ => NotificationCategory::ScheduledTransfer,
                    };
                    self.notify(
                        item.user_id,
                        format!("scheduled transfer failed: {}", e),
                        category,
                    )
                    .await;
                }
            }
        }

        Ok(stats)
    }

    /// Execute one item through the transfer engine.
    ///
    /// The deterministic request id makes a re-run of an already committed
    /// item a replay, which still counts as completed.
    async fn process_item(
        &self,
        item: &ScheduledTransfer,
    ) -> Result<TransferOutcome, TransferError> {
        let request_id = scheduled_request_id(item.id);

        self.engine
            .execute_prevalidated(
                item.from_account_id,
                item.to_account_id,
                item.amount,
                &request_id,
                "scheduled transfer",
            )
            .await
    }

    /// CAS the item out of `pending`; a failed write is logged and left
    /// for the next sweep, where the replay path makes it safe.
    async fn finalize(&self, item: &ScheduledTransfer, status: ScheduleStatus) {
        match ScheduledTransferRepository::update_status_if(
            self.db.pool(),
            item.id,
            ScheduleStatus::Pending,
            status,
        )
        .await
        {
            Ok(true) => {}
            Ok(false) => {
                warn!(
                    schedule_id = item.id,
                    status = %status,
                    "schedule already left pending, skipping status write"
                );
            }
            Err(e) => {
                error!(schedule_id = item.id, error = %e, "failed to record schedule status");
            }
        }
    }

    /// Best-effort delivery: sink failures are logged, never propagated
    async fn notify(&self, user_id: i64, message: String, category: NotificationCategory) {
        if let Err(e) = self.notifier.notify(user_id, &message, category).await {
            warn!(user_id, category = %category, error = %e, "notification delivery failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sweep_config_default() {
        let config = SweepConfig::default();
        assert_eq!(config.interval, Duration::from_secs(60));
        assert_eq!(config.batch_size, 100);
    }

    #[test]
    fn test_shutdown_signal() {
        let signal = ShutdownSignal::new();
        assert!(!signal.is_shutdown_requested());
        signal.request_shutdown();
        assert!(signal.is_shutdown_requested());
    }

    #[tokio::test]
    async fn test_shutdown_wait_returns_after_request() {
        let signal = Arc::new(ShutdownSignal::new());

        let waiter = {
            let signal = signal.clone();
            tokio::spawn(async move { signal.wait().await })
        };

        signal.request_shutdown();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("wait should return promptly")
            .expect("waiter task should not panic");
    }

    #[tokio::test]
    async fn test_shutdown_wait_returns_if_already_requested() {
        let signal = ShutdownSignal::new();
        signal.request_shutdown();
        tokio::time::timeout(Duration::from_secs(1), signal.wait())
            .await
            .expect("wait should return immediately");
    }
}
