//! Double-entry ledger: immutable balance-movement records
//!
//! Every committed transfer is a balanced debit/credit pair sharing one
//! request identifier. Entries are append-only; the
//! `UNIQUE(request_id, entry_type)` constraint is the authoritative
//! exactly-once guard.

pub mod models;
pub mod repository;

pub use models::{EntryPair, EntryType, LedgerEntry, NewLedgerEntry};
pub use repository::LedgerRepository;
