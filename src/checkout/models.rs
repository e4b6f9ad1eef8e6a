//! Checkout models

use serde::Serialize;

use crate::ledger::{FlashSaleId, ProductId};

/// What a committed checkout charged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CheckoutReceipt {
    pub product_id: ProductId,

    /// Price charged per unit
    pub unit_price_cents: u64,

    pub quantity: u64,

    /// `unit_price_cents * quantity`
    pub total_price_cents: u64,

    /// Whether the whole order was charged at a flash sale price
    pub used_flash_sale: bool,

    /// The flash sale charged, if any
    pub flash_sale_id: Option<FlashSaleId>,
}
