//! Ledger records

use jiff::Timestamp;
use serde::Serialize;
use smallvec::SmallVec;

use crate::ids::TypedId;

/// Product id.
pub type ProductId = TypedId<ProductRecord>;

/// Flash sale id.
pub type FlashSaleId = TypedId<FlashSaleRecord>;

/// A product as held by the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductRecord {
    /// Product id
    pub id: ProductId,

    /// Display name
    pub name: String,

    /// Base unit price in minor units
    pub price_cents: u64,

    /// Units on hand
    pub stock: u64,
}

/// A time-boxed discounted allocation on one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlashSaleRecord {
    /// Flash sale id
    pub id: FlashSaleId,

    /// Product the sale applies to
    pub product_id: ProductId,

    /// Discounted unit price in minor units
    pub sale_price_cents: u64,

    /// First instant the sale applies (inclusive)
    pub starts_at: Timestamp,

    /// First instant the sale no longer applies (exclusive)
    pub ends_at: Timestamp,

    /// Units that may be sold at the sale price, unlimited when absent
    pub max_units: Option<u64>,

    /// Units sold at the sale price so far
    pub sold_units: u64,
}

impl FlashSaleRecord {
    /// Whether the capped allocation has been used up.
    pub fn is_exhausted(&self) -> bool {
        self.max_units.is_some_and(|max| self.sold_units >= max)
    }

    /// Whether the sale window contains `at`.
    pub fn is_open_at(&self, at: Timestamp) -> bool {
        self.starts_at <= at && at < self.ends_at
    }

    /// Whether the sale is open at `at` and still has units left.
    pub fn is_active_at(&self, at: Timestamp) -> bool {
        self.is_open_at(at) && !self.is_exhausted()
    }

    /// Units still available at the sale price, `None` when uncapped.
    pub fn remaining_units(&self) -> Option<u64> {
        self.max_units
            .map(|max| max.saturating_sub(self.sold_units))
    }
}

/// Data needed to create a product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProduct {
    /// Display name
    pub name: String,

    /// Base unit price in minor units
    pub price_cents: u64,

    /// Initial units on hand
    pub stock: u64,
}

/// The editable terms of a flash sale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashSaleTerms {
    /// Discounted unit price in minor units
    pub sale_price_cents: u64,

    /// Window start (inclusive)
    pub starts_at: Timestamp,

    /// Window end (exclusive)
    pub ends_at: Timestamp,

    /// Optional cap on units sold at the sale price
    pub max_units: Option<u64>,
}

impl FlashSaleTerms {
    /// Copy of the terms with both window bounds truncated to whole milliseconds,
    /// the resolution the ledger stores.
    #[must_use]
    pub fn normalized(&self) -> Self {
        Self {
            starts_at: truncate_to_millis(self.starts_at),
            ends_at: truncate_to_millis(self.ends_at),
            ..self.clone()
        }
    }
}

impl From<&FlashSaleRecord> for FlashSaleTerms {
    fn from(record: &FlashSaleRecord) -> Self {
        Self {
            sale_price_cents: record.sale_price_cents,
            starts_at: record.starts_at,
            ends_at: record.ends_at,
            max_units: record.max_units,
        }
    }
}

/// A product together with every flash sale attached to it, ordered by id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductSnapshot {
    /// The product row
    pub product: ProductRecord,

    /// Its flash sales, lowest id first
    pub flash_sales: SmallVec<[FlashSaleRecord; 4]>,
}

/// One catalog line: a product and the flash sale that prices it right now, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogEntry {
    /// The product row
    pub product: ProductRecord,

    /// The active flash sale, after tie-breaking
    pub active_flash_sale: Option<FlashSaleRecord>,
}

impl CatalogEntry {
    /// Price a buyer would pay per unit right now.
    pub fn unit_price_cents(&self) -> u64 {
        self.active_flash_sale
            .as_ref()
            .map_or(self.product.price_cents, |sale| sale.sale_price_cents)
    }
}

/// Drop sub-millisecond precision from `at`.
pub fn truncate_to_millis(at: Timestamp) -> Timestamp {
    Timestamp::from_millisecond(at.as_millisecond()).unwrap_or(at)
}
