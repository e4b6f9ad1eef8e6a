//! Flash sales service errors.

use thiserror::Error;

use crate::{
    errors::{FailureKind, InvalidRequest},
    ledger::{FlashSaleId, LedgerError, ProductId},
};

#[derive(Debug, Error)]
pub enum FlashSalesServiceError {
    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    #[error("flash sale {0} not found")]
    FlashSaleNotFound(FlashSaleId),

    #[error("invalid flash sale: {0}")]
    InvalidRequest(#[from] InvalidRequest),

    #[error("storage error")]
    Storage(#[source] LedgerError),
}

impl FlashSalesServiceError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::ProductNotFound(_) | Self::FlashSaleNotFound(_) => FailureKind::NotFound,
            Self::InvalidRequest(_) => FailureKind::InvalidRequest,
            Self::Storage(_) => FailureKind::Storage,
        }
    }
}

impl From<LedgerError> for FlashSalesServiceError {
    fn from(error: LedgerError) -> Self {
        match error {
            LedgerError::ProductNotFound(product) => Self::ProductNotFound(product),
            LedgerError::FlashSaleNotFound(flash_sale) => Self::FlashSaleNotFound(flash_sale),
            other => Self::Storage(other),
        }
    }
}
