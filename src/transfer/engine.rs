//! Transfer Engine
//!
//! Orchestrates validation, locking, balance mutation and ledger append as
//! one atomic unit. The pessimistic ascending-id lock path
//! ([`TransferEngine::execute_transfer`]) is the primary strategy; the
//! optimistic version-check path
//! ([`TransferEngine::execute_transfer_optimistic`]) is kept as a
//! fallback for low-contention call sites.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::account::{Account, AccountRepository, verify_credential};
use crate::db::Database;
use crate::ledger::{EntryPair, EntryType, LedgerEntry, LedgerRepository, NewLedgerEntry};
use crate::notification::{NotificationCategory, NotificationSink};

use super::error::{TransferError, is_unique_violation};
use super::locking;

/// Engine tunables
#[derive(Debug, Clone)]
pub struct TransferConfig {
    /// Transfers at or above this amount notify both parties a second time
    pub high_value_threshold: i64,
    /// Bounded wait for each account row lock
    pub lock_wait: Duration,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            high_value_threshold: 1_000_000,
            lock_wait: Duration::from_secs(5),
        }
    }
}

/// Caller-supplied account reference: number scoped to a bank.
///
/// Two textually different references may resolve to the same account row,
/// so identity checks always use resolved ids, never these strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountRef {
    pub number: String,
    pub bank_id: i64,
}

impl AccountRef {
    pub fn new(number: impl Into<String>, bank_id: i64) -> Self {
        Self {
            number: number.into(),
            bank_id,
        }
    }
}

/// One transfer request
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub from: AccountRef,
    pub to: AccountRef,
    /// Minor units, must be positive
    pub amount: i64,
    /// Plaintext credential for the source account
    pub credential: String,
    /// Caller-supplied idempotency key
    pub request_id: String,
}

/// How the outcome came to be
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TransferStatus {
    /// This call performed the mutation
    Executed,
    /// A prior call with the same request id already did; nothing changed
    Replayed,
}

/// Result of a successful (or replayed) transfer
#[derive(Debug, Clone, Serialize)]
pub struct TransferOutcome {
    pub status: TransferStatus,
    pub debit: LedgerEntry,
    pub credit: LedgerEntry,
}

impl TransferOutcome {
    fn executed(pair: EntryPair) -> Self {
        Self {
            status: TransferStatus::Executed,
            debit: pair.debit,
            credit: pair.credit,
        }
    }

    fn replayed(pair: EntryPair) -> Self {
        Self {
            status: TransferStatus::Replayed,
            debit: pair.debit,
            credit: pair.credit,
        }
    }
}

/// Funds-transfer / ledger-consistency engine
pub struct TransferEngine {
    db: Arc<Database>,
    notifier: Arc<dyn NotificationSink>,
    config: TransferConfig,
}

impl TransferEngine {
    pub fn new(
        db: Arc<Database>,
        notifier: Arc<dyn NotificationSink>,
        config: TransferConfig,
    ) -> Self {
        Self {
            db,
            notifier,
            config,
        }
    }

    /// Execute a transfer with pessimistic row locking (primary path).
    ///
    /// Exactly-once per request id: a replay returns the previously
    /// committed entry pair unchanged. Retryable errors
    /// ([`TransferError::Conflict`], [`TransferError::LockTimeout`]) may be
    /// resubmitted with the same request id.
    pub async fn execute_transfer(
        &self,
        caller_user_id: i64,
        req: &TransferRequest,
    ) -> Result<TransferOutcome, TransferError> {
        if req.amount <= 0 {
            return Err(TransferError::InvalidAmount);
        }

        let pool = self.db.pool();

        // Resolve both accounts unlocked; locks come later, in id order.
        let from = AccountRepository::find_by_number_and_bank(pool, &req.from.number, req.from.bank_id)
            .await?
            .ok_or(TransferError::SourceAccountNotFound)?;
        let to = AccountRepository::find_by_number_and_bank(pool, &req.to.number, req.to.bank_id)
            .await?
            .ok_or(TransferError::TargetAccountNotFound)?;

        // Compare resolved identities: different caller strings can name
        // the same row.
        if from.id == to.id {
            return Err(TransferError::SameAccount);
        }

        // Idempotency fast path: the common client-retry case never locks.
        if let Some(pair) = LedgerRepository::find_pair(pool, &req.request_id).await? {
            debug!(request_id = %req.request_id, "request already executed, returning prior result");
            return Ok(TransferOutcome::replayed(pair));
        }

        let mut tx = pool.begin().await?;

        let (from, to) =
            locking::lock_pair(&mut tx, self.config.lock_wait, from.id, to.id).await?;

        // Ownership and credential are verified against the locked
        // snapshot, not the stale pre-lock read.
        if !from.is_owned_by(caller_user_id) {
            tx.rollback().await.ok();
            return Err(TransferError::NotOwner);
        }
        if !verify_credential(&req.credential, &from.credential_hash) {
            tx.rollback().await.ok();
            return Err(TransferError::BadCredential);
        }

        if from.balance < req.amount {
            tx.rollback().await.ok();
            self.notify(
                from.user_id,
                "transfer failed: insufficient funds".to_string(),
                NotificationCategory::InsufficientBalance,
            )
            .await;
            return Err(TransferError::InsufficientFunds);
        }

        let Some(to_after) = to.balance.checked_add(req.amount) else {
            tx.rollback().await.ok();
            return Err(TransferError::Overflow);
        };
        let from_after = from.balance - req.amount;

        let pair = match self
            .apply_transfer(&mut tx, &from, &to, from_after, to_after, req.amount, &req.request_id, "transfer")
            .await
        {
            Ok(pair) => pair,
            Err(e) if is_unique_violation(&e) => {
                // Lost the insert race: another caller passed the pre-check
                // too and committed first. Discard our attempt, hand back
                // the winner's result.
                tx.rollback().await.ok();
                return self.replay_after_race(&req.request_id).await;
            }
            Err(e) => {
                tx.rollback().await.ok();
                return Err(e.into());
            }
        };

        tx.commit().await?;

        info!(
            request_id = %req.request_id,
            from_account = from.id,
            to_account = to.id,
            amount = req.amount,
            "transfer committed"
        );

        self.notify_transfer_committed(&from, &to, req.amount).await;

        Ok(TransferOutcome::executed(pair))
    }

    /// Execute a transfer with optimistic version checks (fallback path).
    ///
    /// No blocking: a concurrent writer shows up as zero affected rows and
    /// surfaces as [`TransferError::Conflict`], safe to retry with the
    /// same request id.
    pub async fn execute_transfer_optimistic(
        &self,
        caller_user_id: i64,
        req: &TransferRequest,
    ) -> Result<TransferOutcome, TransferError> {
        if req.amount <= 0 {
            return Err(TransferError::InvalidAmount);
        }

        let pool = self.db.pool();

        let from = AccountRepository::find_by_number_and_bank(pool, &req.from.number, req.from.bank_id)
            .await?
            .ok_or(TransferError::SourceAccountNotFound)?;
        let to = AccountRepository::find_by_number_and_bank(pool, &req.to.number, req.to.bank_id)
            .await?
            .ok_or(TransferError::TargetAccountNotFound)?;

        if from.id == to.id {
            return Err(TransferError::SameAccount);
        }

        if let Some(pair) = LedgerRepository::find_pair(pool, &req.request_id).await? {
            debug!(request_id = %req.request_id, "request already executed, returning prior result");
            return Ok(TransferOutcome::replayed(pair));
        }

        if !from.is_owned_by(caller_user_id) {
            return Err(TransferError::NotOwner);
        }
        if !verify_credential(&req.credential, &from.credential_hash) {
            return Err(TransferError::BadCredential);
        }

        if from.balance < req.amount {
            self.notify(
                from.user_id,
                "transfer failed: insufficient funds".to_string(),
                NotificationCategory::InsufficientBalance,
            )
            .await;
            return Err(TransferError::InsufficientFunds);
        }

        let Some(to_after) = to.balance.checked_add(req.amount) else {
            return Err(TransferError::Overflow);
        };
        let from_after = from.balance - req.amount;

        let mut tx = pool.begin().await?;

        // Version-conditioned writes: either both apply or the whole
        // transaction is discarded as a conflict. The updates take row
        // locks too, so they follow the same ascending-id order as the
        // pessimistic path.
        let mut writes = [
            (from.id, from_after, from.version),
            (to.id, to_after, to.version),
        ];
        writes.sort_by_key(|(id, _, _)| *id);

        for (id, new_balance, expected_version) in writes {
            let applied =
                AccountRepository::update_balance_versioned(&mut tx, id, new_balance, expected_version)
                    .await?;
            if !applied {
                tx.rollback().await.ok();
                return Err(TransferError::Conflict);
            }
        }

        let pair = match self
            .insert_entry_pair(&mut tx, &from, &to, from_after, to_after, req.amount, &req.request_id, "transfer")
            .await
        {
            Ok(pair) => pair,
            Err(e) if is_unique_violation(&e) => {
                tx.rollback().await.ok();
                return self.replay_after_race(&req.request_id).await;
            }
            Err(e) => {
                tx.rollback().await.ok();
                return Err(e.into());
            }
        };

        tx.commit().await?;

        info!(
            request_id = %req.request_id,
            from_account = from.id,
            to_account = to.id,
            amount = req.amount,
            "transfer committed (optimistic)"
        );

        self.notify_transfer_committed(&from, &to, req.amount).await;

        Ok(TransferOutcome::executed(pair))
    }

    /// Execute a transfer whose ownership and credential were validated
    /// earlier (the scheduled-transfer path).
    ///
    /// Same locking, mutation and idempotency core as
    /// [`execute_transfer`](Self::execute_transfer); no notifications are
    /// sent here, the caller reports the per-item outcome itself.
    pub async fn execute_prevalidated(
        &self,
        from_account_id: i64,
        to_account_id: i64,
        amount: i64,
        request_id: &str,
        label: &str,
    ) -> Result<TransferOutcome, TransferError> {
        if amount <= 0 {
            return Err(TransferError::InvalidAmount);
        }
        if from_account_id == to_account_id {
            return Err(TransferError::SameAccount);
        }

        let pool = self.db.pool();

        if let Some(pair) = LedgerRepository::find_pair(pool, request_id).await? {
            debug!(request_id, "request already executed, returning prior result");
            return Ok(TransferOutcome::replayed(pair));
        }

        let mut tx = pool.begin().await?;

        let (from, to) =
            locking::lock_pair(&mut tx, self.config.lock_wait, from_account_id, to_account_id)
                .await?;

        if from.balance < amount {
            tx.rollback().await.ok();
            return Err(TransferError::InsufficientFunds);
        }

        let Some(to_after) = to.balance.checked_add(amount) else {
            tx.rollback().await.ok();
            return Err(TransferError::Overflow);
        };
        let from_after = from.balance - amount;

        let pair = match self
            .apply_transfer(&mut tx, &from, &to, from_after, to_after, amount, request_id, label)
            .await
        {
            Ok(pair) => pair,
            Err(e) if is_unique_violation(&e) => {
                tx.rollback().await.ok();
                return self.replay_after_race(request_id).await;
            }
            Err(e) => {
                tx.rollback().await.ok();
                return Err(e.into());
            }
        };

        tx.commit().await?;

        info!(
            request_id,
            from_account = from.id,
            to_account = to.id,
            amount,
            "transfer committed"
        );

        Ok(TransferOutcome::executed(pair))
    }

    /// Record a deposit: one credit entry against the caller's own account
    pub async fn deposit(
        &self,
        caller_user_id: i64,
        account: &AccountRef,
        amount: i64,
        credential: &str,
        request_id: &str,
        description: &str,
    ) -> Result<LedgerEntry, TransferError> {
        self.single_leg(
            caller_user_id,
            account,
            amount,
            EntryType::Credit,
            credential,
            request_id,
            description,
        )
        .await
    }

    /// Record a withdrawal: one debit entry against the caller's own account
    pub async fn withdraw(
        &self,
        caller_user_id: i64,
        account: &AccountRef,
        amount: i64,
        credential: &str,
        request_id: &str,
        description: &str,
    ) -> Result<LedgerEntry, TransferError> {
        self.single_leg(
            caller_user_id,
            account,
            amount,
            EntryType::Debit,
            credential,
            request_id,
            description,
        )
        .await
    }

    /// Shared single-entry path for deposits and withdrawals.
    ///
    /// Same two-layer idempotency as transfers: (request_id, entry_type)
    /// pre-check, then the unique constraint at insert time.
    async fn single_leg(
        &self,
        caller_user_id: i64,
        account_ref: &AccountRef,
        amount: i64,
        entry_type: EntryType,
        credential: &str,
        request_id: &str,
        description: &str,
    ) -> Result<LedgerEntry, TransferError> {
        if amount <= 0 {
            return Err(TransferError::InvalidAmount);
        }

        let pool = self.db.pool();

        let account =
            AccountRepository::find_by_number_and_bank(pool, &account_ref.number, account_ref.bank_id)
                .await?
                .ok_or(TransferError::SourceAccountNotFound)?;

        if let Some(existing) = LedgerRepository::find_existing(pool, request_id, entry_type).await? {
            debug!(request_id, entry_type = %entry_type, "request already executed, returning prior entry");
            return Ok(existing);
        }

        let mut tx = pool.begin().await?;

        let account = locking::lock_one(&mut tx, self.config.lock_wait, account.id).await?;

        if !account.is_owned_by(caller_user_id) {
            tx.rollback().await.ok();
            return Err(TransferError::NotOwner);
        }
        if !verify_credential(credential, &account.credential_hash) {
            tx.rollback().await.ok();
            return Err(TransferError::BadCredential);
        }

        let balance_after = match entry_type {
            EntryType::Debit => {
                if account.balance < amount {
                    tx.rollback().await.ok();
                    return Err(TransferError::InsufficientFunds);
                }
                account.balance - amount
            }
            EntryType::Credit => {
                let Some(after) = account.balance.checked_add(amount) else {
                    tx.rollback().await.ok();
                    return Err(TransferError::Overflow);
                };
                after
            }
        };

        let signed_amount = match entry_type {
            EntryType::Debit => -amount,
            EntryType::Credit => amount,
        };

        let result: Result<LedgerEntry, sqlx::Error> = async {
            AccountRepository::update_balance(&mut tx, account.id, balance_after).await?;
            LedgerRepository::insert(
                &mut tx,
                &NewLedgerEntry {
                    account_id: account.id,
                    amount: signed_amount,
                    entry_type,
                    balance_after,
                    request_id,
                    description: description.to_string(),
                },
            )
            .await
        }
        .await;

        let entry = match result {
            Ok(entry) => entry,
            Err(e) if is_unique_violation(&e) => {
                tx.rollback().await.ok();
                return match LedgerRepository::find_existing(pool, request_id, entry_type).await? {
                    Some(existing) => Ok(existing),
                    None => Err(TransferError::Conflict),
                };
            }
            Err(e) => {
                tx.rollback().await.ok();
                return Err(e.into());
            }
        };

        tx.commit().await?;

        info!(
            request_id,
            account_id = account.id,
            entry_type = %entry_type,
            amount,
            "ledger entry committed"
        );

        Ok(entry)
    }

    /// Apply the balance writes and append both ledger legs.
    ///
    /// Runs inside the caller's transaction; the caller owns commit and
    /// rollback.
    #[allow(clippy::too_many_arguments)]
    async fn apply_transfer(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        from: &Account,
        to: &Account,
        from_after: i64,
        to_after: i64,
        amount: i64,
        request_id: &str,
        label: &str,
    ) -> Result<EntryPair, sqlx::Error> {
        AccountRepository::update_balance(&mut *tx, from.id, from_after).await?;
        AccountRepository::update_balance(&mut *tx, to.id, to_after).await?;

        self.insert_entry_pair(tx, from, to, from_after, to_after, amount, request_id, label)
            .await
    }

    /// Append the balanced debit/credit pair for one transfer
    #[allow(clippy::too_many_arguments)]
    async fn insert_entry_pair(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        from: &Account,
        to: &Account,
        from_after: i64,
        to_after: i64,
        amount: i64,
        request_id: &str,
        label: &str,
    ) -> Result<EntryPair, sqlx::Error> {
        let debit = LedgerRepository::insert(
            &mut *tx,
            &NewLedgerEntry {
                account_id: from.id,
                amount: -amount,
                entry_type: EntryType::Debit,
                balance_after: from_after,
                request_id,
                description: format!("{} to {}", label, to.account_number),
            },
        )
        .await?;

        let credit = LedgerRepository::insert(
            &mut *tx,
            &NewLedgerEntry {
                account_id: to.id,
                amount,
                entry_type: EntryType::Credit,
                balance_after: to_after,
                request_id,
                description: format!("{} from {}", label, from.account_number),
            },
        )
        .await?;

        Ok(EntryPair { debit, credit })
    }

    /// After losing the insert race, return the winner's committed pair.
    ///
    /// The winner may not have committed yet; in that window the re-read
    /// misses and the caller gets a retryable conflict instead.
    async fn replay_after_race(&self, request_id: &str) -> Result<TransferOutcome, TransferError> {
        match LedgerRepository::find_pair(self.db.pool(), request_id).await? {
            Some(pair) => {
                debug!(request_id, "lost insert race, returning winner's result");
                Ok(TransferOutcome::replayed(pair))
            }
            None => Err(TransferError::Conflict),
        }
    }

    /// Post-commit notifications for a completed transfer
    async fn notify_transfer_committed(&self, from: &Account, to: &Account, amount: i64) {
        self.notify(
            from.user_id,
            format!("{} transferred to account {}", amount, to.account_number),
            NotificationCategory::Transfer,
        )
        .await;
        self.notify(
            to.user_id,
            format!("{} received from account {}", amount, from.account_number),
            NotificationCategory::Transfer,
        )
        .await;

        if amount >= self.config.high_value_threshold {
            self.notify(
                from.user_id,
                format!("high-value transaction: {} transferred", amount),
                NotificationCategory::HighValueTransaction,
            )
            .await;
            self.notify(
                to.user_id,
                format!("high-value transaction: {} received", amount),
                NotificationCategory::HighValueTransaction,
            )
            .await;
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
    fn test_transfer_config_default() {
        let config = TransferConfig::default();
        assert_eq!(config.high_value_threshold, 1_000_000);
        assert_eq!(config.lock_wait, Duration::from_secs(5));
    }

    #[test]
    fn test_account_ref_new() {
        let account_ref = AccountRef::new("001-12345678", 3);
        assert_eq!(account_ref.number, "001-12345678");
        assert_eq!(account_ref.bank_id, 3);
    }
}
