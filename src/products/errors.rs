//! Products service errors.

use thiserror::Error;

use crate::{
    errors::{FailureKind, InvalidRequest},
    ledger::{LedgerError, ProductId},
};

#[derive(Debug, Error)]
pub enum ProductsServiceError {
    #[error("product {0} not found")]
    NotFound(ProductId),

    #[error("product already exists")]
    AlreadyExists,

    #[error("invalid product: {0}")]
    InvalidRequest(#[from] InvalidRequest),

    #[error("storage error")]
    Storage(#[source] LedgerError),
}

impl ProductsServiceError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::NotFound(_) => FailureKind::NotFound,
            Self::AlreadyExists | Self::InvalidRequest(_) => FailureKind::InvalidRequest,
            Self::Storage(_) => FailureKind::Storage,
        }
    }
}

impl From<LedgerError> for ProductsServiceError {
    fn from(error: LedgerError) -> Self {
        match error {
            LedgerError::ProductNotFound(product) => Self::NotFound(product),
            LedgerError::AlreadyExists => Self::AlreadyExists,
            other => Self::Storage(other),
        }
    }
}
