//! Deadlock-free account row locking
//!
//! Every code path that locks more than one account acquires the locks in
//! ascending-id order. Two transfers in opposite directions between the
//! same pair then contend on the same first lock instead of each holding
//! one and waiting for the other. Each acquisition is bounded by
//! `lock_timeout`; expiry surfaces as the retryable
//! [`TransferError::LockTimeout`].

use sqlx::PgConnection;
use std::time::Duration;

use crate::account::{Account, AccountRepository};

use super::error::TransferError;

/// Total order for multi-account lock acquisition
pub fn lock_order(a: i64, b: i64) -> (i64, i64) {
    (a.min(b), a.max(b))
}

/// Map the two locked snapshots back to their from/to roles; the
/// ascending-id fetch order need not match the caller's direction.
pub fn remap(first: Account, second: Account, from_id: i64) -> (Account, Account) {
    if first.id == from_id {
        (first, second)
    } else {
        (second, first)
    }
}

/// Bound every lock wait in this transaction.
///
/// `SET LOCAL` scopes the setting to the enclosing transaction, so the
/// pool connection is clean when it is returned.
pub async fn bound_lock_wait(
    conn: &mut PgConnection,
    lock_wait: Duration,
) -> Result<(), TransferError> {
    sqlx::query(&format!(
        "SET LOCAL lock_timeout = '{}ms'",
        lock_wait.as_millis()
    ))
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Lock both accounts of a transfer and return `(from, to)` snapshots.
///
/// Must be called inside a transaction. Accounts were already resolved
/// unlocked; a row that vanished in between maps to the not-found error of
/// whichever role it played.
pub async fn lock_pair(
    conn: &mut PgConnection,
    lock_wait: Duration,
    from_id: i64,
    to_id: i64,
) -> Result<(Account, Account), TransferError> {
    debug_assert_ne!(from_id, to_id, "same-account transfers are rejected earlier");

    bound_lock_wait(conn, lock_wait).await?;

    let missing = |id: i64| {
        if id == from_id {
            TransferError::SourceAccountNotFound
        } else {
            TransferError::TargetAccountNotFound
        }
    };

    let (first_id, second_id) = lock_order(from_id, to_id);

    let first = AccountRepository::lock_by_id(&mut *conn, first_id)
        .await
        .map_err(TransferError::from)?
        .ok_or_else(|| missing(first_id))?;

    let second = AccountRepository::lock_by_id(&mut *conn, second_id)
        .await
        .map_err(TransferError::from)?
        .ok_or_else(|| missing(second_id))?;

    Ok(remap(first, second, from_id))
}

/// Lock a single account (deposit/withdrawal path)
pub async fn lock_one(
    conn: &mut PgConnection,
    lock_wait: Duration,
    id: i64,
) -> Result<Account, TransferError> {
    bound_lock_wait(conn, lock_wait).await?;

    AccountRepository::lock_by_id(&mut *conn, id)
        .await
        .map_err(TransferError::from)?
        .ok_or(TransferError::SourceAccountNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(id: i64) -> Account {
        Account {
            id,
            account_number: format!("001-{:08}", id),
            bank_id: 1,
            user_id: id * 10,
            balance: 1_000,
            credential_hash: String::new(),
            version: 0,
        }
    }

    #[test]
    fn test_lock_order_is_ascending() {
        assert_eq!(lock_order(1, 2), (1, 2));
        assert_eq!(lock_order(2, 1), (1, 2));
        assert_eq!(lock_order(42, 42), (42, 42));
    }

    #[test]
    fn test_lock_order_is_symmetric() {
        // Both directions of the same pair must acquire in the same order
        assert_eq!(lock_order(7, 3), lock_order(3, 7));
    }

    #[test]
    fn test_remap_identity_when_from_is_first() {
        let (from, to) = remap(account(1), account(2), 1);
        assert_eq!(from.id, 1);
        assert_eq!(to.id, 2);
    }

    #[test]
    fn test_remap_swaps_when_from_is_second() {
        // Transfer 2 -> 1: locks are taken as (1, 2), roles must swap back
        let (from, to) = remap(account(1), account(2), 2);
        assert_eq!(from.id, 2);
        assert_eq!(to.id, 1);
    }
}
