//! Ledger entry types
//!
//! Type IDs are stored as SMALLINT in PostgreSQL.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// Ledger entry type
///
/// A debit entry carries a negative amount, a credit entry a positive one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(i16)]
pub enum EntryType {
    Debit = 1,
    Credit = 2,
}

impl EntryType {
    /// Numeric ID for PostgreSQL storage
    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    /// Convert from a stored ID
    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            1 => Some(EntryType::Debit),
            2 => Some(EntryType::Credit),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::Debit => "DEBIT",
            EntryType::Credit => "CREDIT",
        }
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One immutable signed balance movement on one account
#[derive(Debug, Clone, Serialize)]
pub struct LedgerEntry {
    pub id: i64,
    pub account_id: i64,
    /// Signed minor units: negative = debit, positive = credit
    pub amount: i64,
    pub entry_type: EntryType,
    /// Account balance immediately after this movement
    pub balance_after: i64,
    pub request_id: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for a ledger entry
#[derive(Debug)]
pub struct NewLedgerEntry<'a> {
    pub account_id: i64,
    pub amount: i64,
    pub entry_type: EntryType,
    pub balance_after: i64,
    pub request_id: &'a str,
    pub description: String,
}

/// The balanced debit/credit pair a committed transfer produces
#[derive(Debug, Clone, Serialize)]
pub struct EntryPair {
    pub debit: LedgerEntry,
    pub credit: LedgerEntry,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_type_id_roundtrip() {
        for entry_type in [EntryType::Debit, EntryType::Credit] {
            assert_eq!(EntryType::from_id(entry_type.id()), Some(entry_type));
        }
    }

    #[test]
    fn test_invalid_entry_type_id() {
        assert_eq!(EntryType::from_id(0), None);
        assert_eq!(EntryType::from_id(99), None);
        assert_eq!(EntryType::from_id(-1), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(EntryType::Debit.to_string(), "DEBIT");
        assert_eq!(EntryType::Credit.to_string(), "CREDIT");
    }

    #[test]
    fn test_entry_serializes_for_collaborators() {
        let entry = LedgerEntry {
            id: 1,
            account_id: 7,
            amount: -500,
            entry_type: EntryType::Debit,
            balance_after: 500,
            request_id: "req-1".to_string(),
            description: "transfer to 001-22223333".to_string(),
            created_at: Utc::now(),
        };

        let json = serde_json::to_value(&entry).expect("should serialize");
        assert_eq!(json["amount"], -500);
        assert_eq!(json["entry_type"], "Debit");
        assert_eq!(json["balance_after"], 500);
        assert_eq!(json["request_id"], "req-1");
    }
}
