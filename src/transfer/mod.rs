//! Transfer engine: validation, locking, balance mutation, ledger append
//!
//! The pessimistic ascending-id lock path is the primary strategy;
//! [`engine::TransferEngine::execute_transfer_optimistic`] keeps the
//! version-check path available as a fallback.

pub mod engine;
pub mod error;
pub mod locking;

#[cfg(test)]
mod integration_tests;

pub use engine::{
    AccountRef, TransferConfig, TransferEngine, TransferOutcome, TransferRequest, TransferStatus,
};
pub use error::TransferError;
