//! Flash sales service.

use std::sync::Arc;

use async_trait::async_trait;
use mockall::automock;
use tracing::{Span, debug, info};

use crate::{
    catalog::CatalogCache,
    errors::InvalidRequest,
    flash_sales::{errors::FlashSalesServiceError, models::FlashSaleUpdate},
    ledger::{FlashSaleId, FlashSaleRecord, FlashSaleTerms, Ledger, LedgerError, ProductId},
};

/// Administers flash sales on top of a ledger.
#[derive(Debug)]
pub struct FlashSaleAdmin<L> {
    ledger: Arc<L>,
    cache: Arc<CatalogCache>,
}

impl<L: Ledger> FlashSaleAdmin<L> {
    #[must_use]
    pub fn new(ledger: Arc<L>, cache: Arc<CatalogCache>) -> Self {
        Self { ledger, cache }
    }

    async fn owner(&self, flash_sale: FlashSaleId) -> Result<ProductId, FlashSalesServiceError> {
        Ok(self.ledger.flash_sale(flash_sale).await?.product_id)
    }
}

#[async_trait]
impl<L: Ledger + 'static> FlashSalesService for FlashSaleAdmin<L> {
    #[tracing::instrument(
        name = "flash_sales.service.create_flash_sale",
        skip(self, product, terms),
        fields(product_id = %product, flash_sale_id = tracing::field::Empty),
        err
    )]
    async fn create_flash_sale(
        &self,
        product: ProductId,
        terms: FlashSaleTerms,
    ) -> Result<FlashSaleRecord, FlashSalesServiceError> {
        let terms = terms.normalized();

        let created = self
            .ledger
            .run_atomic(product, |unit| {
                validate_terms(&terms, unit.product().price_cents, 0)?;

                Ok::<_, FlashSalesServiceError>(unit.insert_flash_sale(&terms))
            })
            .await?;

        self.cache.invalidate().await;

        Span::current().record("flash_sale_id", tracing::field::display(created.id));

        info!(
            sale_price_cents = created.sale_price_cents,
            max_units = ?created.max_units,
            "flash sale created"
        );

        Ok(created)
    }

    #[tracing::instrument(
        name = "flash_sales.service.update_flash_sale",
        skip(self, flash_sale),
        fields(flash_sale_id = %flash_sale),
        err
    )]
    async fn update_flash_sale(
        &self,
        flash_sale: FlashSaleId,
        update: FlashSaleUpdate,
    ) -> Result<FlashSaleRecord, FlashSalesServiceError> {
        if update.is_empty() {
            debug!("empty update, re-validating stored terms");
        }

        let owner = self.owner(flash_sale).await?;

        let updated = self
            .ledger
            .run_atomic(owner, |unit| {
                let current = unit
                    .flash_sale(flash_sale)
                    .ok_or(LedgerError::FlashSaleNotFound(flash_sale))?;

                let terms = update.merge(current).normalized();

                validate_terms(&terms, unit.product().price_cents, current.sold_units)?;

                let staged = unit
                    .flash_sale_mut(flash_sale)
                    .ok_or(LedgerError::FlashSaleNotFound(flash_sale))?;

                staged.sale_price_cents = terms.sale_price_cents;
                staged.starts_at = terms.starts_at;
                staged.ends_at = terms.ends_at;
                staged.max_units = terms.max_units;

                Ok::<_, FlashSalesServiceError>(staged.clone())
            })
            .await
            .map_err(|error| sale_gone_with_product(error, flash_sale))?;

        self.cache.invalidate().await;

        info!("flash sale updated");

        Ok(updated)
    }

    #[tracing::instrument(
        name = "flash_sales.service.delete_flash_sale",
        skip(self, flash_sale),
        fields(flash_sale_id = %flash_sale),
        err
    )]
    async fn delete_flash_sale(&self, flash_sale: FlashSaleId) -> Result<(), FlashSalesServiceError> {
        let owner = self.owner(flash_sale).await?;

        self.ledger
            .run_atomic(owner, |unit| {
                unit.remove_flash_sale(flash_sale)
                    .ok_or(FlashSalesServiceError::FlashSaleNotFound(flash_sale))
            })
            .await
            .map_err(|error| sale_gone_with_product(error, flash_sale))?;

        self.cache.invalidate().await;

        info!("flash sale deleted");

        Ok(())
    }

    async fn get_flash_sale(
        &self,
        flash_sale: FlashSaleId,
    ) -> Result<FlashSaleRecord, FlashSalesServiceError> {
        Ok(self.ledger.flash_sale(flash_sale).await?)
    }

    async fn list_flash_sales(&self) -> Result<Vec<FlashSaleRecord>, FlashSalesServiceError> {
        Ok(self.ledger.flash_sales().await?)
    }
}

/// A sale whose product vanished between lookup and lock vanished with it.
fn sale_gone_with_product(
    error: FlashSalesServiceError,
    flash_sale: FlashSaleId,
) -> FlashSalesServiceError {
    match error {
        FlashSalesServiceError::ProductNotFound(_) => {
            FlashSalesServiceError::FlashSaleNotFound(flash_sale)
        }
        other => other,
    }
}

/// Check prospective flash sale terms against the product's price and units sold.
///
/// # Errors
///
/// Returns the first rule the terms break.
pub fn validate_terms(
    terms: &FlashSaleTerms,
    product_price_cents: u64,
    sold_units: u64,
) -> Result<(), InvalidRequest> {
    if terms.ends_at <= terms.starts_at {
        return Err(InvalidRequest::EmptySaleWindow);
    }

    if terms.sale_price_cents == 0 {
        return Err(InvalidRequest::ZeroSalePrice);
    }

    if terms.sale_price_cents >= product_price_cents {
        return Err(InvalidRequest::SalePriceNotDiscounted);
    }

    match terms.max_units {
        Some(0) => Err(InvalidRequest::ZeroCapacity),
        Some(max) if max < sold_units => Err(InvalidRequest::CapacityBelowSold),
        _ => Ok(()),
    }
}

#[automock]
#[async_trait]
pub trait FlashSalesService: Send + Sync {
    /// Creates a flash sale on `product` with nothing sold.
    async fn create_flash_sale(
        &self,
        product: ProductId,
        terms: FlashSaleTerms,
    ) -> Result<FlashSaleRecord, FlashSalesServiceError>;

    /// Applies `update` to an existing flash sale after re-validating the result.
    async fn update_flash_sale(
        &self,
        flash_sale: FlashSaleId,
        update: FlashSaleUpdate,
    ) -> Result<FlashSaleRecord, FlashSalesServiceError>;

    /// Deletes a flash sale. Units already sold stay sold.
    async fn delete_flash_sale(&self, flash_sale: FlashSaleId) -> Result<(), FlashSalesServiceError>;

    /// Retrieve a single flash sale.
    async fn get_flash_sale(
        &self,
        flash_sale: FlashSaleId,
    ) -> Result<FlashSaleRecord, FlashSalesServiceError>;

    /// Retrieves all flash sales, latest start first.
    async fn list_flash_sales(&self) -> Result<Vec<FlashSaleRecord>, FlashSalesServiceError>;
}
