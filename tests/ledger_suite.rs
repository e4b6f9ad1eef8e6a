//! Behavioural suite run against every ledger backend

use std::{sync::Arc, time::Duration};

use jiff::{SignedDuration, Timestamp};
use tempfile::TempDir;
use testresult::TestResult;

use flash_ledger::{
    catalog::cache::DEFAULT_TTL,
    checkout::{CheckoutError, CheckoutReceipt},
    clock::ManualClock,
    context::AppContext,
    errors::InvalidRequest,
    flash_sales::{FlashSaleUpdate, FlashSalesServiceError},
    ledger::{
        FlashSaleRecord, FlashSaleTerms, Ledger, MemoryLedger, NewProduct, ProductId,
        ProductRecord, SqliteLedger,
    },
    pricing::PriceSource,
    products::ProductsServiceError,
    seed::{self, SeedFixture},
};

const START_MS: i64 = 1_750_000_000_000;

struct Harness {
    app: AppContext,
    clock: Arc<ManualClock>,
    start: Timestamp,
    _dir: Option<TempDir>,
}

impl Harness {
    fn build<L: Ledger + 'static>(ledger: Arc<L>, dir: Option<TempDir>) -> TestResult<Self> {
        let start = Timestamp::from_millisecond(START_MS)?;
        let clock = Arc::new(ManualClock::new(start));

        Ok(Self {
            app: AppContext::with_ledger(ledger, clock.clone(), DEFAULT_TTL),
            clock,
            start,
            _dir: dir,
        })
    }

    fn memory() -> TestResult<Self> {
        Self::build(Arc::new(MemoryLedger::new()), None)
    }

    async fn sqlite() -> TestResult<Self> {
        let dir = tempfile::tempdir()?;
        let url = format!("sqlite://{}", dir.path().join("ledger.db").display());

        let ledger = SqliteLedger::connect(&url, 8, Duration::from_secs(10)).await?;

        ledger.migrate().await?;

        Self::build(Arc::new(ledger), Some(dir))
    }

    fn at(&self, offset_ms: i64) -> Timestamp {
        self.start + SignedDuration::from_millis(offset_ms)
    }

    async fn product(&self, price_cents: u64, stock: u64) -> Result<ProductRecord, ProductsServiceError> {
        self.app
            .products
            .create_product(NewProduct {
                name: format!("Item at {price_cents}"),
                price_cents,
                stock,
            })
            .await
    }

    async fn sale(
        &self,
        product: ProductId,
        sale_price_cents: u64,
        window: (i64, i64),
        max_units: Option<u64>,
    ) -> Result<FlashSaleRecord, FlashSalesServiceError> {
        self.app
            .flash_sales
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

    async fn stock(&self, product: ProductId) -> TestResult<u64> {
        Ok(self.app.products.get_product(product).await?.stock)
    }

    async fn sold(&self, sale: &FlashSaleRecord) -> TestResult<u64> {
        Ok(self.app.flash_sales.get_flash_sale(sale.id).await?.sold_units)
    }

    /// Fire `buyers` single-unit checkouts at once and collect every outcome.
    async fn rush(
        &self,
        product: ProductId,
        buyers: usize,
        at: Timestamp,
    ) -> TestResult<Vec<Result<CheckoutReceipt, CheckoutError>>> {
        let handles: Vec<_> = (0..buyers)
            .map(|_| {
                let checkout = self.app.checkout.clone();

                tokio::spawn(async move { checkout.checkout(product, 1, at).await })
            })
            .collect();

        let mut outcomes = Vec::with_capacity(buyers);

        for handle in handles {
            outcomes.push(handle.await?);
        }

        Ok(outcomes)
    }
}

macro_rules! ledger_suite {
    ($($scenario:ident),* $(,)?) => {
        $(
            mod $scenario {
                use super::*;

                #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
                async fn memory() -> TestResult {
                    super::$scenario(Harness::memory()?).await
                }

                #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
                async fn sqlite() -> TestResult {
                    super::$scenario(Harness::sqlite().await?).await
                }
            }
        )*
    };
}

ledger_suite!(
    sale_runs_out_then_base_price_applies,
    undiscounted_sale_is_rejected,
    capacity_cannot_shrink_below_sold,
    concurrent_checkouts_never_oversell_stock,
    concurrent_checkouts_never_exceed_sale_capacity,
    failed_checkouts_change_nothing,
    sale_window_is_half_open,
    latest_overlapping_sale_wins,
    catalog_reflects_commits_immediately,
    catalog_cache_serves_until_ttl_without_writes,
    deleting_product_removes_its_sales,
    deleting_sale_restores_base_price,
    storefront_seed_opens_with_live_sale,
);

async fn sale_runs_out_then_base_price_applies(h: Harness) -> TestResult {
    let product = h.product(10_000, 10).await?;
    let sale = h.sale(product.id, 5_000, (0, 1_000), Some(3)).await?;

    let first = h.app.checkout.checkout(product.id, 2, h.at(1)).await?;

    assert_eq!(first.unit_price_cents, 5_000);
    assert_eq!(first.flash_sale_id, Some(sale.id));
    assert_eq!(h.sold(&sale).await?, 2);
    assert_eq!(h.stock(product.id).await?, 8);

    let over = h.app.checkout.checkout(product.id, 2, h.at(2)).await;

    assert!(
        matches!(
            over,
            Err(CheckoutError::FlashSaleCapacityExceeded {
                requested: 2,
                remaining: 1,
                ..
            })
        ),
        "expected capacity exceeded, got {over:?}"
    );
    assert_eq!(h.sold(&sale).await?, 2);
    assert_eq!(h.stock(product.id).await?, 8);

    let last = h.app.checkout.checkout(product.id, 1, h.at(2)).await?;

    assert_eq!(last.unit_price_cents, 5_000);
    assert_eq!(h.sold(&sale).await?, 3);

    let base = h.app.checkout.checkout(product.id, 1, h.at(3)).await?;

    assert_eq!(base.unit_price_cents, 10_000);
    assert!(!base.used_flash_sale, "exhausted sale should not price the order");
    assert_eq!(h.stock(product.id).await?, 6);

    Ok(())
}

async fn undiscounted_sale_is_rejected(h: Harness) -> TestResult {
    let product = h.product(10_000, 10).await?;

    let result = h.sale(product.id, 10_000, (0, 1_000), None).await;

    assert!(
        matches!(
            result,
            Err(FlashSalesServiceError::InvalidRequest(
                InvalidRequest::SalePriceNotDiscounted
            ))
        ),
        "expected SalePriceNotDiscounted, got {result:?}"
    );
    assert!(h.app.flash_sales.list_flash_sales().await?.is_empty());

    Ok(())
}

async fn capacity_cannot_shrink_below_sold(h: Harness) -> TestResult {
    let product = h.product(10_000, 10).await?;
    let sale = h.sale(product.id, 5_000, (0, 1_000), Some(5)).await?;

    h.app.checkout.checkout(product.id, 3, h.at(1)).await?;

    let result = h
        .app
        .flash_sales
        .update_flash_sale(
            sale.id,
            FlashSaleUpdate {
                max_units: Some(2),
                ..FlashSaleUpdate::default()
            },
        )
        .await;

    assert!(
        matches!(
            result,
            Err(FlashSalesServiceError::InvalidRequest(
                InvalidRequest::CapacityBelowSold
            ))
        ),
        "expected CapacityBelowSold, got {result:?}"
    );

    let stored = h.app.flash_sales.get_flash_sale(sale.id).await?;

    assert_eq!(stored.max_units, Some(5));
    assert_eq!(stored.sold_units, 3);

    let shrunk = h
        .app
        .flash_sales
        .update_flash_sale(
            sale.id,
            FlashSaleUpdate {
                max_units: Some(3),
                ..FlashSaleUpdate::default()
            },
        )
        .await?;

    assert!(shrunk.is_exhausted(), "cap equal to sold units exhausts the sale");

    Ok(())
}

async fn concurrent_checkouts_never_oversell_stock(h: Harness) -> TestResult {
    let product = h.product(1_000, 10).await?;

    let outcomes = h.rush(product.id, 30, h.at(0)).await?;

    let committed = outcomes.iter().filter(|outcome| outcome.is_ok()).count();
    let short = outcomes
        .iter()
        .filter(|outcome| matches!(outcome, Err(CheckoutError::InsufficientStock { .. })))
        .count();

    assert_eq!(committed, 10);
    assert_eq!(short, 20);
    assert_eq!(h.stock(product.id).await?, 0);

    Ok(())
}

async fn concurrent_checkouts_never_exceed_sale_capacity(h: Harness) -> TestResult {
    let product = h.product(1_000, 100).await?;
    let sale = h.sale(product.id, 400, (0, 60_000), Some(5)).await?;

    let outcomes = h.rush(product.id, 20, h.at(1)).await?;

    let mut at_sale_price = 0;
    let mut at_base_price = 0;

    for outcome in &outcomes {
        let receipt = outcome.as_ref().map_err(ToString::to_string)?;

        if receipt.used_flash_sale {
            at_sale_price += 1;
        } else {
            at_base_price += 1;
        }
    }

    assert_eq!(at_sale_price, 5);
    assert_eq!(at_base_price, 15);
    assert_eq!(h.sold(&sale).await?, 5);
    assert_eq!(h.stock(product.id).await?, 80);

    Ok(())
}

async fn failed_checkouts_change_nothing(h: Harness) -> TestResult {
    let product = h.product(2_000, 3).await?;
    let sale = h.sale(product.id, 1_500, (0, 1_000), Some(10)).await?;

    let short = h.app.checkout.checkout(product.id, 4, h.at(5)).await;
    let missing = h
        .app
        .checkout
        .checkout(ProductId::from_i64(9_999), 1, h.at(5))
        .await;
    let zero = h.app.checkout.checkout(product.id, 0, h.at(5)).await;

    assert!(
        matches!(short, Err(CheckoutError::InsufficientStock { .. })),
        "expected InsufficientStock, got {short:?}"
    );
    assert!(
        matches!(missing, Err(CheckoutError::NotFound(_))),
        "expected NotFound, got {missing:?}"
    );
    assert!(
        matches!(zero, Err(CheckoutError::InvalidRequest(InvalidRequest::ZeroQuantity))),
        "expected ZeroQuantity, got {zero:?}"
    );
    assert_eq!(h.stock(product.id).await?, 3);
    assert_eq!(h.sold(&sale).await?, 0);

    Ok(())
}

async fn sale_window_is_half_open(h: Harness) -> TestResult {
    let product = h.product(9_000, 5).await?;
    let sale = h.sale(product.id, 6_000, (100, 200), None).await?;

    let before = h.app.products.quote(product.id, h.at(99)).await?;
    let opening = h.app.products.quote(product.id, h.at(100)).await?;
    let closing = h.app.products.quote(product.id, h.at(199)).await?;
    let after = h.app.products.quote(product.id, h.at(200)).await?;

    assert_eq!(before.source, PriceSource::Base);
    assert_eq!(opening.source, PriceSource::FlashSale { id: sale.id });
    assert_eq!(closing.unit_price_cents, 6_000);
    assert_eq!(after.unit_price_cents, 9_000);

    Ok(())
}

async fn latest_overlapping_sale_wins(h: Harness) -> TestResult {
    let product = h.product(9_000, 5).await?;

    h.sale(product.id, 6_000, (0, 1_000), None).await?;
    let later = h.sale(product.id, 7_000, (500, 800), None).await?;

    let early = h.app.checkout.checkout(product.id, 1, h.at(100)).await?;
    let overlap = h.app.checkout.checkout(product.id, 1, h.at(600)).await?;

    assert_eq!(early.unit_price_cents, 6_000);
    assert_eq!(overlap.flash_sale_id, Some(later.id));
    assert_eq!(overlap.unit_price_cents, 7_000);

    let catalog = h.app.catalog.get(h.at(600)).await?;

    assert_eq!(
        catalog
            .first()
            .and_then(|entry| entry.active_flash_sale.as_ref())
            .map(|sale| sale.id),
        Some(later.id)
    );

    Ok(())
}

async fn catalog_reflects_commits_immediately(h: Harness) -> TestResult {
    let first = h.product(1_000, 4).await?;
    let second = h.product(2_000, 6).await?;

    let before = h.app.catalog.get(h.at(0)).await?;

    h.app.checkout.checkout(second.id, 2, h.at(0)).await?;

    let after = h.app.catalog.get(h.at(0)).await?;
    let stocks: Vec<_> = after
        .iter()
        .map(|entry| (entry.product.id, entry.product.stock))
        .collect();

    assert_eq!(before.len(), 2);
    assert_eq!(stocks, vec![(first.id, 4), (second.id, 4)]);

    Ok(())
}

async fn catalog_cache_serves_until_ttl_without_writes(h: Harness) -> TestResult {
    h.product(1_000, 4).await?;

    let cached = h.app.catalog.current().await?;

    h.clock.advance_ms(1_999);

    let within = h.app.catalog.current().await?;

    h.clock.advance_ms(1);

    let expired = h.app.catalog.current().await?;

    assert!(Arc::ptr_eq(&cached, &within), "read within the TTL should hit the cache");
    assert!(!Arc::ptr_eq(&cached, &expired), "read at expiry should refresh");
    assert!(cached.iter().eq(expired.iter()), "nothing changed in between");

    Ok(())
}

async fn deleting_product_removes_its_sales(h: Harness) -> TestResult {
    let product = h.product(5_000, 2).await?;
    let sale = h.sale(product.id, 2_500, (0, 1_000), None).await?;

    h.app.products.delete_product(product.id).await?;

    let lookup = h.app.flash_sales.get_flash_sale(sale.id).await;

    assert!(
        matches!(lookup, Err(FlashSalesServiceError::FlashSaleNotFound(_))),
        "expected FlashSaleNotFound, got {lookup:?}"
    );
    assert!(h.app.catalog.get(h.at(0)).await?.is_empty());

    Ok(())
}

async fn deleting_sale_restores_base_price(h: Harness) -> TestResult {
    let product = h.product(5_000, 2).await?;
    let sale = h.sale(product.id, 2_500, (0, 1_000), None).await?;

    h.app.flash_sales.delete_flash_sale(sale.id).await?;

    let receipt = h.app.checkout.checkout(product.id, 1, h.at(10)).await?;

    assert_eq!(receipt.unit_price_cents, 5_000);

    let again = h.app.flash_sales.delete_flash_sale(sale.id).await;

    assert!(
        matches!(again, Err(FlashSalesServiceError::FlashSaleNotFound(_))),
        "second delete should report FlashSaleNotFound, got {again:?}"
    );

    Ok(())
}

async fn storefront_seed_opens_with_live_sale(h: Harness) -> TestResult {
    let fixture = SeedFixture::storefront()?;

    let report = seed::seed_if_empty(
        h.app.products.as_ref(),
        h.app.flash_sales.as_ref(),
        &fixture,
        h.at(0),
    )
    .await?;

    assert_eq!(report.products, 3);

    let catalog = h.app.catalog.get(h.at(1)).await?;
    let on_sale = catalog
        .iter()
        .filter(|entry| entry.active_flash_sale.is_some())
        .count();

    assert_eq!(catalog.len(), 3);
    assert_eq!(on_sale, 1);

    let again = seed::seed_if_empty(
        h.app.products.as_ref(),
        h.app.flash_sales.as_ref(),
        &fixture,
        h.at(0),
    )
    .await?;

    assert!(again.skipped, "second seed should be skipped");

    Ok(())
}
