//! corebank - Funds Transfer & Ledger Consistency Engine
//!
//! Moves money between accounts with exactly-once execution, non-negative
//! balances, and deadlock-free concurrent access.
//!
//! # Modules
//!
//! - [`account`] - Account snapshots, repository, credential hashing
//! - [`ledger`] - Double-entry ledger records and idempotency lookups
//! - [`transfer`] - Transfer engine, lock ordering, error taxonomy
//! - [`scheduled`] - Scheduled transfer registration and sweep processor
//! - [`notification`] - Post-commit notification sink seam
//! - [`db`] - PostgreSQL pool and schema bootstrap
//! - [`config`] - YAML application configuration
//! - [`logging`] - tracing subscriber setup

pub mod account;
pub mod config;
pub mod db;
pub mod ledger;
pub mod logging;
pub mod notification;
pub mod scheduled;
pub mod transfer;

// Convenient re-exports at crate root
pub use account::{Account, AccountRepository};
pub use db::Database;
pub use ledger::{EntryPair, EntryType, LedgerEntry, LedgerRepository};
pub use notification::{NotificationCategory, NotificationSink, NotifyError, TracingNotifier};
pub use scheduled::{
    ScheduleStatus, ScheduledTransfer, ScheduledTransferProcessor, ScheduledTransferService,
    ShutdownSignal, SweepConfig, SweepStats,
};
pub use transfer::{
    AccountRef, TransferConfig, TransferEngine, TransferError, TransferOutcome, TransferRequest,
    TransferStatus,
};
