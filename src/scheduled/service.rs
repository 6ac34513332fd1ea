//! Scheduled transfer registration
//!
//! Ownership and credential are validated here, once; the sweep processor
//! does not re-validate them at execution time. The funds check always
//! happens at execution, against the balance of that moment.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::info;

use crate::account::{AccountRepository, verify_credential};
use crate::db::Database;
use crate::transfer::{AccountRef, TransferError};

use super::models::ScheduledTransfer;
use super::repository::ScheduledTransferRepository;

/// Registration API for scheduled transfers
pub struct ScheduledTransferService {
    db: Arc<Database>,
}

impl ScheduledTransferService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Register a transfer for later execution.
    ///
    /// The caller must own the source account and present its credential.
    /// Insufficient funds at execution time fails only that item, not the
    /// registration.
    pub async fn register(
        &self,
        caller_user_id: i64,
        from: &AccountRef,
        to: &AccountRef,
        amount: i64,
        scheduled_at: DateTime<Utc>,
        credential: &str,
    ) -> Result<ScheduledTransfer, TransferError> {
        if amount <= 0 {
            return Err(TransferError::InvalidAmount);
        }

        let pool = self.db.pool();

        let from_account =
            AccountRepository::find_by_number_and_bank(pool, &from.number, from.bank_id)
                .await?
                .ok_or(TransferError::SourceAccountNotFound)?;

        if !from_account.is_owned_by(caller_user_id) {
            return Err(TransferError::NotOwner);
        }
        if !verify_credential(credential, &from_account.credential_hash) {
            return Err(TransferError::BadCredential);
        }

        let to_account = AccountRepository::find_by_number_and_bank(pool, &to.number, to.bank_id)
            .await?
            .ok_or(TransferError::TargetAccountNotFound)?;

        if from_account.id == to_account.id {
            return Err(TransferError::SameAccount);
        }

        let scheduled = ScheduledTransferRepository::insert(
            pool,
            caller_user_id,
            from_account.id,
            to_account.id,
            amount,
            scheduled_at,
        )
        .await?;

        info!(
            schedule_id = scheduled.id,
            user_id = caller_user_id,
            from_account = from_account.id,
            to_account = to_account.id,
            amount,
            scheduled_at = %scheduled_at,
            "scheduled transfer registered"
        );

        Ok(scheduled)
    }

    /// A user's scheduled transfers, newest first
    pub async fn list_for_user(
        &self,
        user_id: i64,
    ) -> Result<Vec<ScheduledTransfer>, TransferError> {
        let items = ScheduledTransferRepository::list_for_user(self.db.pool(), user_id).await?;
        Ok(items)
    }
}
