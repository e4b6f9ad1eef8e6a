//! Shared failure taxonomy

use std::fmt::{Display, Formatter, Result as FmtResult};

use serde::Serialize;
use thiserror::Error;

/// Why a request was rejected before touching the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidRequest {
    #[error("quantity must be at least 1")]
    ZeroQuantity,

    #[error("flash sale must end after it starts")]
    EmptySaleWindow,

    #[error("flash sale price must be positive")]
    ZeroSalePrice,

    #[error("flash sale price must be below the product price")]
    SalePriceNotDiscounted,

    #[error("flash sale max units must be positive")]
    ZeroCapacity,

    #[error("flash sale max units cannot drop below units already sold")]
    CapacityBelowSold,

    #[error("order total is too large")]
    AmountOverflow,

    #[error("product name must not be empty")]
    EmptyProductName,

    #[error("product price must be positive")]
    ZeroProductPrice,
}

/// Coarse outcome class shared by every service error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    NotFound,
    InvalidRequest,
    InsufficientStock,
    FlashSaleCapacityExceeded,
    Storage,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::InvalidRequest => "invalid_request",
            Self::InsufficientStock => "insufficient_stock",
            Self::FlashSaleCapacityExceeded => "flash_sale_capacity_exceeded",
            Self::Storage => "storage",
        }
    }

    /// Whether the failure was caused by the request rather than the system.
    pub fn is_rejection(self) -> bool {
        !matches!(self, Self::Storage)
    }
}

impl Display for FailureKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}
