//! Account data model

/// Plain snapshot of an account row.
///
/// Balance is in integer minor units and never negative in any committed
/// state. `version` is the optimistic concurrency counter; every balance
/// write increments it. Reads used for mutation must come from a snapshot
/// taken after lock acquisition, not an earlier cached one.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Account {
    pub id: i64,
    pub account_number: String,
    pub bank_id: i64,
    pub user_id: i64,
    pub balance: i64,
    pub credential_hash: String,
    pub version: i64,
}

impl Account {
    /// Natural key used by callers: account number scoped to a bank
    pub fn natural_key(&self) -> (&str, i64) {
        (&self.account_number, self.bank_id)
    }

    pub fn is_owned_by(&self, user_id: i64) -> bool {
        self.user_id == user_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Account {
        Account {
            id: 7,
            account_number: "001-12345678".to_string(),
            bank_id: 1,
            user_id: 42,
            balance: 1_000,
            credential_hash: "$argon2id$stub".to_string(),
            version: 0,
        }
    }

    #[test]
    fn test_natural_key() {
        let account = sample();
        assert_eq!(account.natural_key(), ("001-12345678", 1));
    }

    #[test]
    fn test_ownership() {
        let account = sample();
        assert!(account.is_owned_by(42));
        assert!(!account.is_owned_by(43));
    }
}
