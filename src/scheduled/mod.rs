//! Scheduled transfers: registration, due-sweep processing
//!
//! Registration validates ownership and credential once; the sweep
//! processor later feeds each due item through the transfer engine with a
//! request id derived from the item's own identity, so a crashed or
//! repeated sweep replays instead of double-executing.

pub mod models;
pub mod processor;
pub mod repository;
pub mod service;

#[cfg(test)]
mod integration_tests;

pub use models::{ScheduleStatus, ScheduledTransfer, scheduled_request_id};
pub use processor::{ScheduledTransferProcessor, ShutdownSignal, SweepConfig, SweepStats};
pub use repository::ScheduledTransferRepository;
pub use service::ScheduledTransferService;
