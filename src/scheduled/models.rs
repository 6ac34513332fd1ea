//! Scheduled transfer state definitions
//!
//! Status IDs are stored as SMALLINT in PostgreSQL.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// Scheduled transfer lifecycle
///
/// `pending -> completed` on success, `pending -> failed` on any error.
/// Both outcomes are terminal; a terminal item is never re-processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(i16)]
pub enum ScheduleStatus {
    Pending = 0,
    Completed = 1,
    Failed = -1,
}

impl ScheduleStatus {
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, ScheduleStatus::Completed | ScheduleStatus::Failed)
    }

    /// Numeric ID for PostgreSQL storage
    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    /// Convert from a stored ID
    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            0 => Some(ScheduleStatus::Pending),
            1 => Some(ScheduleStatus::Completed),
            -1 => Some(ScheduleStatus::Failed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleStatus::Pending => "PENDING",
            ScheduleStatus::Completed => "COMPLETED",
            ScheduleStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for ScheduleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One registered scheduled transfer
#[derive(Debug, Clone, Serialize)]
pub struct ScheduledTransfer {
    pub id: i64,
    pub user_id: i64,
    pub from_account_id: i64,
    pub to_account_id: i64,
    /// Minor units
    pub amount: i64,
    pub scheduled_at: DateTime<Utc>,
    pub status: ScheduleStatus,
}

/// Deterministic request id for executing a scheduled transfer.
///
/// Derived from the row's own identity so a sweep re-run after a crash
/// replays the committed pair instead of moving funds twice.
pub fn scheduled_request_id(schedule_id: i64) -> String {
    format!("SCHEDULED-{}", schedule_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(ScheduleStatus::Completed.is_terminal());
        assert!(ScheduleStatus::Failed.is_terminal());
        assert!(!ScheduleStatus::Pending.is_terminal());
    }

    #[test]
    fn test_status_id_roundtrip() {
        for status in [
            ScheduleStatus::Pending,
            ScheduleStatus::Completed,
            ScheduleStatus::Failed,
        ] {
            assert_eq!(ScheduleStatus::from_id(status.id()), Some(status));
        }
    }

    #[test]
    fn test_invalid_status_id() {
        assert_eq!(ScheduleStatus::from_id(99), None);
        assert_eq!(ScheduleStatus::from_id(-99), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(ScheduleStatus::Pending.to_string(), "PENDING");
        assert_eq!(ScheduleStatus::Completed.to_string(), "COMPLETED");
        assert_eq!(ScheduleStatus::Failed.to_string(), "FAILED");
    }

    #[test]
    fn test_scheduled_request_id_is_deterministic() {
        assert_eq!(scheduled_request_id(42), "SCHEDULED-42");
        assert_eq!(scheduled_request_id(42), scheduled_request_id(42));
        assert_ne!(scheduled_request_id(42), scheduled_request_id(43));
    }
}
