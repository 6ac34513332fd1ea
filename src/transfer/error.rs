//! Transfer Error Types
//!
//! Every failure below the engine boundary is normalized into this
//! taxonomy before it reaches a caller; expected business outcomes are
//! variants, not panics or stringly errors.

use thiserror::Error;

/// Transfer error taxonomy
#[derive(Error, Debug, Clone)]
pub enum TransferError {
    // === Validation (rejected before any lock) ===
    #[error("Amount must be greater than zero")]
    InvalidAmount,

    #[error("Amount would overflow the destination balance")]
    Overflow,

    #[error("Source and destination account cannot be the same")]
    SameAccount,

    // === Resolution ===
    #[error("Source account not found")]
    SourceAccountNotFound,

    #[error("Destination account not found")]
    TargetAccountNotFound,

    // === Authorization (after resolution, before mutation) ===
    #[error("Caller does not own the source account")]
    NotOwner,

    #[error("Account credential does not match")]
    BadCredential,

    // === Business rule (after locking, no partial mutation) ===
    #[error("Insufficient funds")]
    InsufficientFunds,

    // === Concurrency (retryable with the same request id) ===
    #[error("Concurrent update conflict, safe to retry")]
    Conflict,

    #[error("Timed out waiting for an account lock")]
    LockTimeout,

    // === Persistence ===
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl TransferError {
    /// Error code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            TransferError::InvalidAmount => "INVALID_AMOUNT",
            TransferError::Overflow => "OVERFLOW",
            TransferError::SameAccount => "SAME_ACCOUNT",
            TransferError::SourceAccountNotFound => "SOURCE_ACCOUNT_NOT_FOUND",
            TransferError::TargetAccountNotFound => "TARGET_ACCOUNT_NOT_FOUND",
            TransferError::NotOwner => "NOT_OWNER",
            TransferError::BadCredential => "BAD_CREDENTIAL",
            TransferError::InsufficientFunds => "INSUFFICIENT_FUNDS",
            TransferError::Conflict => "CONFLICT",
            TransferError::LockTimeout => "LOCK_TIMEOUT",
            TransferError::DatabaseError(_) => "DATABASE_ERROR",
        }
    }

    /// HTTP status code suggestion for the transport collaborator
    pub fn http_status(&self) -> u16 {
        match self {
            TransferError::InvalidAmount
            | TransferError::Overflow
            | TransferError::SameAccount => 400,
            TransferError::SourceAccountNotFound | TransferError::TargetAccountNotFound => 404,
            TransferError::NotOwner | TransferError::BadCredential => 403,
            TransferError::InsufficientFunds => 422,
            TransferError::Conflict | TransferError::LockTimeout => 409,
            TransferError::DatabaseError(_) => 500,
        }
    }

    /// Retryable errors may be resubmitted with the same request id
    pub fn is_retryable(&self) -> bool {
        matches!(self, TransferError::Conflict | TransferError::LockTimeout)
    }
}

/// SQLSTATE 55P03: lock_not_available, raised when `lock_timeout` expires
pub(crate) fn is_lock_timeout(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some("55P03"),
        _ => false,
    }
}

/// Unique-constraint violation, the authoritative duplicate-request signal
pub(crate) fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

impl From<sqlx::Error> for TransferError {
    fn from(e: sqlx::Error) -> Self {
        if is_lock_timeout(&e) {
            TransferError::LockTimeout
        } else {
            TransferError::DatabaseError(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(TransferError::SameAccount.code(), "SAME_ACCOUNT");
        assert_eq!(TransferError::InsufficientFunds.code(), "INSUFFICIENT_FUNDS");
        assert_eq!(TransferError::LockTimeout.code(), "LOCK_TIMEOUT");
        assert_eq!(TransferError::BadCredential.code(), "BAD_CREDENTIAL");
    }

    #[test]
    fn test_http_status() {
        assert_eq!(TransferError::InvalidAmount.http_status(), 400);
        assert_eq!(TransferError::SourceAccountNotFound.http_status(), 404);
        assert_eq!(TransferError::NotOwner.http_status(), 403);
        assert_eq!(TransferError::InsufficientFunds.http_status(), 422);
        assert_eq!(TransferError::Conflict.http_status(), 409);
        assert_eq!(TransferError::DatabaseError("x".into()).http_status(), 500);
    }

    #[test]
    fn test_retryable() {
        assert!(TransferError::Conflict.is_retryable());
        assert!(TransferError::LockTimeout.is_retryable());
        assert!(!TransferError::InsufficientFunds.is_retryable());
        assert!(!TransferError::SameAccount.is_retryable());
    }

    #[test]
    fn test_display() {
        assert_eq!(
            TransferError::InsufficientFunds.to_string(),
            "Insufficient funds"
        );
    }
}
