//! Checkout service.

use std::sync::Arc;

use async_trait::async_trait;
use jiff::Timestamp;
use mockall::automock;
use tracing::{Span, error, info};

use crate::{
    catalog::CatalogCache,
    checkout::{errors::CheckoutError, models::CheckoutReceipt},
    errors::InvalidRequest,
    ledger::{Ledger, LedgerError, ProductId, ProductLedger},
};

/// Sells stock, charging a flash sale price when one is active.
#[derive(Debug)]
pub struct CheckoutTransactor<L> {
    ledger: Arc<L>,
    cache: Arc<CatalogCache>,
}

impl<L: Ledger> CheckoutTransactor<L> {
    #[must_use]
    pub fn new(ledger: Arc<L>, cache: Arc<CatalogCache>) -> Self {
        Self { ledger, cache }
    }
}

#[async_trait]
impl<L: Ledger + 'static> CheckoutService for CheckoutTransactor<L> {
    #[tracing::instrument(
        name = "checkout.service.checkout",
        skip(self, product),
        fields(
            product_id = %product,
            price_source = tracing::field::Empty,
            outcome = tracing::field::Empty
        )
    )]
    async fn checkout(
        &self,
        product: ProductId,
        quantity: u64,
        at: Timestamp,
    ) -> Result<CheckoutReceipt, CheckoutError> {
        let span = Span::current();

        let result = if quantity == 0 {
            Err(CheckoutError::InvalidRequest(InvalidRequest::ZeroQuantity))
        } else {
            self.ledger
                .run_atomic(product, |unit| charge(unit, quantity, at))
                .await
        };

        match &result {
            Ok(receipt) => {
                let version = self.cache.invalidate().await;

                let price_source = if receipt.used_flash_sale {
                    "flash_sale"
                } else {
                    "base"
                };

                span.record("outcome", "committed");
                span.record("price_source", price_source);

                info!(
                    unit_price_cents = receipt.unit_price_cents,
                    total_price_cents = receipt.total_price_cents,
                    flash_sale_id = ?receipt.flash_sale_id,
                    ledger_version = version,
                    "checkout committed"
                );
            }
            Err(failure) if failure.kind().is_rejection() => {
                span.record("outcome", failure.kind().as_str());

                info!(error = %failure, "checkout rejected");
            }
            Err(failure) => {
                span.record("outcome", failure.kind().as_str());

                error!(error = %failure, "checkout failed");
            }
        }

        result
    }
}

/// Validate and stage one order against a product's rows.
///
/// Nothing is staged unless every check passes, and an order is priced entirely at
/// either the flash sale price or the base price.
pub(crate) fn charge(
    unit: &mut ProductLedger,
    quantity: u64,
    at: Timestamp,
) -> Result<CheckoutReceipt, CheckoutError> {
    let product = unit.product();
    let product_id = product.id;
    let available = product.stock;
    let base_price_cents = product.price_cents;

    if available < quantity {
        return Err(CheckoutError::InsufficientStock {
            requested: quantity,
            available,
        });
    }

    let sale = unit
        .active_flash_sale(at)
        .map(|sale| (sale.id, sale.sale_price_cents, sale.remaining_units()));

    if let Some((flash_sale_id, _, Some(remaining))) = sale
        && quantity > remaining
    {
        return Err(CheckoutError::FlashSaleCapacityExceeded {
            flash_sale_id,
            requested: quantity,
            remaining,
        });
    }

    let unit_price_cents = sale.map_or(base_price_cents, |(_, price, _)| price);

    let total_price_cents = unit_price_cents
        .checked_mul(quantity)
        .ok_or(InvalidRequest::AmountOverflow)?;

    if let Some((flash_sale_id, _, _)) = sale {
        let staged = unit
            .flash_sale_mut(flash_sale_id)
            .ok_or(LedgerError::FlashSaleNotFound(flash_sale_id))?;

        staged.sold_units = staged
            .sold_units
            .checked_add(quantity)
            .ok_or(InvalidRequest::AmountOverflow)?;
    }

    unit.set_stock(available - quantity);

    Ok(CheckoutReceipt {
        product_id,
        unit_price_cents,
        quantity,
        total_price_cents,
        used_flash_sale: sale.is_some(),
        flash_sale_id: sale.map(|(id, _, _)| id),
    })
}

#[automock]
#[async_trait]
pub trait CheckoutService: Send + Sync {
    /// Sell `quantity` units of `product` at the price in effect at `at`.
    async fn checkout(
        &self,
        product: ProductId,
        quantity: u64,
        at: Timestamp,
    ) -> Result<CheckoutReceipt, CheckoutError>;
}
