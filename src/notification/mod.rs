//! Notification sink seam
//!
//! Delivery is an external collaborator's job. The engine calls the sink
//! only after the ledger mutation has committed (or, for the
//! insufficient-funds side channel, after rollback); sink failures are
//! logged and swallowed at every call site, never propagated into the
//! ledger path.

use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::sync::Mutex;
use thiserror::Error;

/// Notification category tags, matching what downstream delivery renders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NotificationCategory {
    Transfer,
    ScheduledTransfer,
    InsufficientBalance,
    HighValueTransaction,
    SystemNotice,
}

impl NotificationCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationCategory::Transfer => "TRANSFER",
            NotificationCategory::ScheduledTransfer => "SCHEDULED_TRANSFER",
            NotificationCategory::InsufficientBalance => "INSUFFICIENT_BALANCE",
            NotificationCategory::HighValueTransaction => "HIGH_VALUE_TRANSACTION",
            NotificationCategory::SystemNotice => "SYSTEM_NOTICE",
        }
    }
}

impl fmt::Display for NotificationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Sink-side delivery failure
#[derive(Debug, Error, Clone)]
pub enum NotifyError {
    #[error("notification sink unavailable: {0}")]
    Unavailable(String),

    #[error("notification delivery timed out")]
    Timeout,
}

/// Post-commit notification sink
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(
        &self,
        user_id: i64,
        message: &str,
        category: NotificationCategory,
    ) -> Result<(), NotifyError>;
}

/// Default sink: structured log lines, never fails
pub struct TracingNotifier;

#[async_trait]
impl NotificationSink for TracingNotifier {
    async fn notify(
        &self,
        user_id: i64,
        message: &str,
        category: NotificationCategory,
    ) -> Result<(), NotifyError> {
        tracing::info!(user_id, category = %category, message, "notification");
        Ok(())
    }
}

/// One captured delivery
#[derive(Debug, Clone)]
pub struct DeliveredNotification {
    pub user_id: i64,
    pub message: String,
    pub category: NotificationCategory,
}

/// Capturing sink for tests, with a switchable failure mode
#[derive(Default)]
pub struct RecordingNotifier {
    delivered: Mutex<Vec<DeliveredNotification>>,
    fail_next: std::sync::atomic::AtomicBool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delivered(&self) -> Vec<DeliveredNotification> {
        self.delivered.lock().expect("notifier lock poisoned").clone()
    }

    pub fn count(&self) -> usize {
        self.delivered.lock().expect("notifier lock poisoned").len()
    }

    pub fn count_for(&self, category: NotificationCategory) -> usize {
        self.delivered
            .lock()
            .expect("notifier lock poisoned")
            .iter()
            .filter(|n| n.category == category)
            .count()
    }

    /// Make every subsequent delivery fail
    pub fn set_failing(&self, failing: bool) {
        self.fail_next
            .store(failing, std::sync::atomic::Ordering::SeqCst);
    }
}

#[async_trait]
impl NotificationSink for RecordingNotifier {
    async fn notify(
        &self,
        user_id: i64,
        message: &str,
        category: NotificationCategory,
    ) -> Result<(), NotifyError> {
        if self.fail_next.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(NotifyError::Unavailable("recording sink set to fail".to_string()));
        }
        self.delivered
            .lock()
            .expect("notifier lock poisoned")
            .push(DeliveredNotification {
                user_id,
                message: message.to_string(),
                category,
            });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_as_str() {
        assert_eq!(NotificationCategory::Transfer.as_str(), "TRANSFER");
        assert_eq!(
            NotificationCategory::HighValueTransaction.as_str(),
            "HIGH_VALUE_TRANSACTION"
        );
        assert_eq!(
            NotificationCategory::InsufficientBalance.to_string(),
            "INSUFFICIENT_BALANCE"
        );
    }

    #[tokio::test]
    async fn test_recording_notifier_captures() {
        let sink = RecordingNotifier::new();
        sink.notify(7, "hello", NotificationCategory::Transfer)
            .await
            .unwrap();
        sink.notify(8, "big one", NotificationCategory::HighValueTransaction)
            .await
            .unwrap();

        assert_eq!(sink.count(), 2);
        assert_eq!(sink.count_for(NotificationCategory::Transfer), 1);
        let delivered = sink.delivered();
        assert_eq!(delivered[0].user_id, 7);
        assert_eq!(delivered[0].message, "hello");
    }

    #[tokio::test]
    async fn test_recording_notifier_failure_mode() {
        let sink = RecordingNotifier::new();
        sink.set_failing(true);
        let err = sink
            .notify(7, "dropped", NotificationCategory::Transfer)
            .await
            .expect_err("should fail");
        assert!(matches!(err, NotifyError::Unavailable(_)));
        assert_eq!(sink.count(), 0);
    }

    #[tokio::test]
    async fn test_tracing_notifier_never_fails() {
        let sink = TracingNotifier;
        assert!(
            sink.notify(1, "ok", NotificationCategory::SystemNotice)
                .await
                .is_ok()
        );
    }
}
