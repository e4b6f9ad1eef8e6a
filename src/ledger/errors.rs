//! Ledger errors.

use sqlx::{
    Error,
    error::{DatabaseError, ErrorKind},
    migrate::MigrateError,
};
use thiserror::Error;

use crate::ledger::records::{FlashSaleId, ProductId};

/// `SQLITE_CONSTRAINT_TRIGGER`, raised by `RAISE(ABORT, ...)` in a trigger.
const TRIGGER_CONSTRAINT_CODE: &str = "1811";

/// Failures raised at the storage boundary.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// No product with this id exists.
    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    /// No flash sale with this id exists.
    #[error("flash sale {0} not found")]
    FlashSaleNotFound(FlashSaleId),

    #[error("record already exists")]
    AlreadyExists,

    #[error("related record not found")]
    InvalidReference,

    #[error("missing required data")]
    MissingRequiredData,

    /// A check constraint or trigger rejected the write.
    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("storage error")]
    Sql(#[source] Error),

    #[error("failed to apply ledger migrations")]
    Migrate(#[from] MigrateError),
}

impl From<Error> for LedgerError {
    fn from(error: Error) -> Self {
        let classified = error.as_database_error().and_then(classify);

        classified.unwrap_or(Self::Sql(error))
    }
}

fn classify(error: &dyn DatabaseError) -> Option<LedgerError> {
    if error.code().as_deref() == Some(TRIGGER_CONSTRAINT_CODE) {
        return Some(LedgerError::InvalidData(error.message().to_string()));
    }

    match error.kind() {
        ErrorKind::UniqueViolation => Some(LedgerError::AlreadyExists),
        ErrorKind::ForeignKeyViolation => Some(LedgerError::InvalidReference),
        ErrorKind::NotNullViolation => Some(LedgerError::MissingRequiredData),
        ErrorKind::CheckViolation => Some(LedgerError::InvalidData(error.message().to_string())),
        ErrorKind::Other | _ => None,
    }
}
