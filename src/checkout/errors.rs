//! Checkout errors.

use thiserror::Error;

use crate::{
    errors::{FailureKind, InvalidRequest},
    ledger::{FlashSaleId, LedgerError, ProductId},
};

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("invalid checkout request: {0}")]
    InvalidRequest(#[from] InvalidRequest),

    #[error("product {0} not found")]
    NotFound(ProductId),

    #[error("insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { requested: u64, available: u64 },

    #[error(
        "flash sale {flash_sale_id} capacity exceeded: requested {requested}, remaining {remaining}"
    )]
    FlashSaleCapacityExceeded {
        flash_sale_id: FlashSaleId,
        requested: u64,
        remaining: u64,
    },

    #[error("storage error")]
    Storage(#[source] LedgerError),
}

impl CheckoutError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::InvalidRequest(_) => FailureKind::InvalidRequest,
            Self::NotFound(_) => FailureKind::NotFound,
            Self::InsufficientStock { .. } => FailureKind::InsufficientStock,
            Self::FlashSaleCapacityExceeded { .. } => FailureKind::FlashSaleCapacityExceeded,
            Self::Storage(_) => FailureKind::Storage,
        }
    }
}

impl From<LedgerError> for CheckoutError {
    fn from(error: LedgerError) -> Self {
        match error {
            LedgerError::ProductNotFound(product) => Self::NotFound(product),
            other => Self::Storage(other),
        }
    }
}
