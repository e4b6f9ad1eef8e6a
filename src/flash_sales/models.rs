//! Flash sale models

use jiff::Timestamp;

use crate::ledger::{FlashSaleRecord, FlashSaleTerms};

/// Changes to an existing flash sale. Fields left as `None` keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlashSaleUpdate {
    pub sale_price_cents: Option<u64>,
    pub starts_at: Option<Timestamp>,
    pub ends_at: Option<Timestamp>,

    /// New cap; an existing cap cannot be removed
    pub max_units: Option<u64>,
}

impl FlashSaleUpdate {
    /// The terms the sale would have once this update is applied to `current`.
    pub fn merge(&self, current: &FlashSaleRecord) -> FlashSaleTerms {
        let current = FlashSaleTerms::from(current);

        FlashSaleTerms {
            sale_price_cents: self.sale_price_cents.unwrap_or(current.sale_price_cents),
            starts_at: self.starts_at.unwrap_or(current.starts_at),
            ends_at: self.ends_at.unwrap_or(current.ends_at),
            max_units: self.max_units.or(current.max_units),
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}
