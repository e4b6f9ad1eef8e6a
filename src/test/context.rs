//! Test context for service-level tests.

use std::sync::Arc;

use jiff::{SignedDuration, Timestamp};

use crate::{
    catalog::{CatalogCache, LedgerCatalogReader, cache::DEFAULT_TTL},
    checkout::CheckoutTransactor,
    clock::ManualClock,
    flash_sales::{FlashSaleAdmin, FlashSalesService, FlashSalesServiceError},
    ledger::{FlashSaleRecord, FlashSaleTerms, MemoryLedger, NewProduct, ProductId, ProductRecord},
    products::{ProductRegistry, ProductsService, ProductsServiceError},
};

/// Milliseconds since the epoch every test context starts at.
const START_MS: i64 = 1_700_000_000_000;

/// Services wired to a fresh in-memory ledger and a stopped clock.
pub(crate) struct TestContext {
    pub ledger: Arc<MemoryLedger>,
    pub clock: Arc<ManualClock>,
    pub cache: Arc<CatalogCache>,
    pub checkout: CheckoutTransactor<MemoryLedger>,
    pub flash_sales: FlashSaleAdmin<MemoryLedger>,
    pub products: ProductRegistry<MemoryLedger>,
    start: Timestamp,
}

impl TestContext {
    pub fn new() -> Result<Self, jiff::Error> {
        let start = Timestamp::from_millisecond(START_MS)?;
        let ledger = Arc::new(MemoryLedger::new());
        let clock = Arc::new(ManualClock::new(start));

        let cache = Arc::new(CatalogCache::new(
            Arc::new(LedgerCatalogReader::new(ledger.clone())),
            clock.clone(),
            DEFAULT_TTL,
        ));

        Ok(Self {
            checkout: CheckoutTransactor::new(ledger.clone(), cache.clone()),
            flash_sales: FlashSaleAdmin::new(ledger.clone(), cache.clone()),
            products: ProductRegistry::new(ledger.clone(), cache.clone()),
            ledger,
            clock,
            cache,
            start,
        })
    }

    /// The instant `offset_ms` after the context's start.
    pub fn at(&self, offset_ms: i64) -> Timestamp {
        self.start + SignedDuration::from_millis(offset_ms)
    }

    pub async fn product(
        &self,
        price_cents: u64,
        stock: u64,
    ) -> Result<ProductRecord, ProductsServiceError> {
        self.products
            .create_product(NewProduct {
                name: format!("Product at {price_cents}"),
                price_cents,
                stock,
            })
            .await
    }

    /// Create a flash sale whose window is given as offsets from the start.
    pub async fn flash_sale(
        &self,
        product: ProductId,
        sale_price_cents: u64,
        window: (i64, i64),
        max_units: Option<u64>,
    ) -> Result<FlashSaleRecord, FlashSalesServiceError> {
        self.flash_sales
            .create_flash_sale(
                product,
                FlashSaleTerms {
                    sale_price_cents,
                    starts_at: self.at(window.0),
                    ends_at: self.at(window.1),
                    max_units,
                },
            )
            .await
    }
}
