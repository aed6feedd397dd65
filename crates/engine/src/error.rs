//! The module contains the error the engine can throw.
//!
//! Validation errors ([`InvalidAmount`], [`InvalidAccount`], ...) are raised
//! before any write. The one exception is an [`InvalidAmount`] for a balance
//! that would leave the `i64` range, which the balance update itself raises. [`KeyNotFound`] never tells "missing" apart from
//! "not yours".
//!
//!  [`InvalidAmount`]: EngineError::InvalidAmount
//!  [`InvalidAccount`]: EngineError::InvalidAccount
//!  [`KeyNotFound`]: EngineError::KeyNotFound
use sea_orm::DbErr;
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Invalid account: {0}")]
    InvalidAccount(String),
    #[error("Invalid category: {0}")]
    InvalidCategory(String),
    #[error("Invalid id: {0}")]
    InvalidId(String),
    #[error("Invalid cursor: {0}")]
    InvalidCursor(String),
    #[error("Invalid range: {0}")]
    InvalidRange(String),
    #[error("\"{0}\" key not found!")]
    KeyNotFound(String),
    #[error("\"{0}\" already present!")]
    ExistingKey(String),
    #[error("No active household link: {0}")]
    NoHouseholdLink(String),
    #[error("Invalid split state: {0}")]
    InvalidSplitState(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::InvalidAmount(a), Self::InvalidAmount(b)) => a == b,
            (Self::InvalidAccount(a), Self::InvalidAccount(b)) => a == b,
            (Self::InvalidCategory(a), Self::InvalidCategory(b)) => a == b,
            (Self::InvalidId(a), Self::InvalidId(b)) => a == b,
            (Self::InvalidCursor(a), Self::InvalidCursor(b)) => a == b,
            (Self::InvalidRange(a), Self::InvalidRange(b)) => a == b,
            (Self::KeyNotFound(a), Self::KeyNotFound(b)) => a == b,
            (Self::ExistingKey(a), Self::ExistingKey(b)) => a == b,
            (Self::NoHouseholdLink(a), Self::NoHouseholdLink(b)) => a == b,
            (Self::InvalidSplitState(a), Self::InvalidSplitState(b)) => a == b,
            (Self::Forbidden(a), Self::Forbidden(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
