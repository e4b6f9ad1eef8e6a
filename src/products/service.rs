//! Products service.

use std::sync::Arc;

use async_trait::async_trait;
use jiff::Timestamp;
use mockall::automock;
use tracing::info;

use crate::{
    catalog::CatalogCache,
    errors::InvalidRequest,
    ledger::{Ledger, NewProduct, ProductId, ProductRecord},
    pricing::{self, PriceQuote},
    products::errors::ProductsServiceError,
};

#[derive(Debug)]
pub struct ProductRegistry<L> {
    ledger: Arc<L>,
    cache: Arc<CatalogCache>,
}

impl<L: Ledger> ProductRegistry<L> {
    #[must_use]
    pub fn new(ledger: Arc<L>, cache: Arc<CatalogCache>) -> Self {
        Self { ledger, cache }
    }
}

#[async_trait]
impl<L: Ledger + 'static> ProductsService for ProductRegistry<L> {
    #[tracing::instrument(
        name = "products.service.create_product",
        skip(self, product),
        fields(price_cents = product.price_cents, stock = product.stock),
        err
    )]
    async fn create_product(
        &self,
        product: NewProduct,
    ) -> Result<ProductRecord, ProductsServiceError> {
        if product.name.trim().is_empty() {
            return Err(InvalidRequest::EmptyProductName.into());
        }

        if product.price_cents == 0 {
            return Err(InvalidRequest::ZeroProductPrice.into());
        }

        let created = self.ledger.insert_product(product).await?;

        self.cache.invalidate().await;

        info!(product_id = %created.id, "product created");

        Ok(created)
    }

    async fn get_product(&self, product: ProductId) -> Result<ProductRecord, ProductsServiceError> {
        Ok(self.ledger.product(product).await?)
    }

    #[tracing::instrument(
        name = "products.service.delete_product",
        skip(self, product),
        fields(product_id = %product),
        err
    )]
    async fn delete_product(&self, product: ProductId) -> Result<(), ProductsServiceError> {
        self.ledger.delete_product(product).await?;

        self.cache.invalidate().await;

        info!("product deleted");

        Ok(())
    }

    async fn count_products(&self) -> Result<u64, ProductsServiceError> {
        Ok(self.ledger.product_count().await?)
    }

    #[tracing::instrument(
        name = "products.service.quote",
        skip(self, product),
        fields(product_id = %product),
        err
    )]
    async fn quote(
        &self,
        product: ProductId,
        at: Timestamp,
    ) -> Result<PriceQuote, ProductsServiceError> {
        let snapshot = self.ledger.snapshot(product).await?;

        Ok(pricing::resolve_unit_price(
            &snapshot.product,
            &snapshot.flash_sales,
            at,
        ))
    }
}

#[automock]
#[async_trait]
pub trait ProductsService: Send + Sync {
    /// Creates a new product.
    async fn create_product(&self, product: NewProduct)
    -> Result<ProductRecord, ProductsServiceError>;

    /// Retrieve a single product.
    async fn get_product(&self, product: ProductId) -> Result<ProductRecord, ProductsServiceError>;

    /// Deletes a product and every flash sale attached to it.
    async fn delete_product(&self, product: ProductId) -> Result<(), ProductsServiceError>;

    /// Number of products in the ledger.
    async fn count_products(&self) -> Result<u64, ProductsServiceError>;

    /// The effective unit price of a product at `at`.
    async fn quote(&self, product: ProductId, at: Timestamp)
    -> Result<PriceQuote, ProductsServiceError>;
}
