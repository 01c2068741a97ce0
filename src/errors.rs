use thiserror::Error;

use crate::currency::MoneyError;

/// Error type that captures ledger, scheduler, and snapshot failures.
///
/// Every variant is reported synchronously and leaves prior state untouched.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error(transparent)]
    Money(#[from] MoneyError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, LedgerError>;

impl LedgerError {
    pub(crate) fn account_not_found(id: impl std::fmt::Display) -> Self {
        LedgerError::NotFound(format!("account {id}"))
    }

    pub(crate) fn rule_not_found(id: impl std::fmt::Display) -> Self {
        LedgerError::NotFound(format!("recurring rule {id}"))
    }
}
