//! App Context

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    sync::Arc,
};

use jiff::SignedDuration;
use thiserror::Error;
use tracing::info;

use crate::{
    catalog::{CatalogCache, LedgerCatalogReader},
    checkout::{CheckoutService, CheckoutTransactor},
    clock::{Clock, SystemClock},
    config::{CacheConfig, LedgerConfig},
    flash_sales::{FlashSaleAdmin, FlashSalesService},
    ledger::{Ledger, LedgerError, MemoryLedger, SqliteLedger},
    products::{ProductRegistry, ProductsService},
};

#[derive(Debug, Error)]
pub enum AppInitError {
    #[error("failed to open ledger database")]
    Database(#[source] LedgerError),

    #[error("failed to migrate ledger database")]
    Migrate(#[source] LedgerError),
}

/// Every service, sharing one ledger and one catalog cache.
#[derive(Clone)]
pub struct AppContext {
    pub clock: Arc<dyn Clock>,
    pub catalog: Arc<CatalogCache>,
    pub checkout: Arc<dyn CheckoutService>,
    pub flash_sales: Arc<dyn FlashSalesService>,
    pub products: Arc<dyn ProductsService>,
}

impl Debug for AppContext {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("AppContext")
            .field("clock", &self.clock)
            .field("catalog", &self.catalog)
            .finish_non_exhaustive()
    }
}

impl AppContext {
    /// Wire the services around an existing ledger.
    #[must_use]
    pub fn with_ledger<L: Ledger + 'static>(
        ledger: Arc<L>,
        clock: Arc<dyn Clock>,
        ttl: SignedDuration,
    ) -> Self {
        let catalog = Arc::new(CatalogCache::new(
            Arc::new(LedgerCatalogReader::new(ledger.clone())),
            clock.clone(),
            ttl,
        ));

        Self {
            checkout: Arc::new(CheckoutTransactor::new(ledger.clone(), catalog.clone())),
            flash_sales: Arc::new(FlashSaleAdmin::new(ledger.clone(), catalog.clone())),
            products: Arc::new(ProductRegistry::new(ledger, catalog.clone())),
            catalog,
            clock,
        }
    }

    /// Open and migrate the configured SQLite ledger.
    ///
    /// # Errors
    ///
    /// Returns an error when the database cannot be opened or migrated.
    pub async fn from_config(
        ledger: &LedgerConfig,
        cache: &CacheConfig,
    ) -> Result<Self, AppInitError> {
        let sqlite = SqliteLedger::connect(
            &ledger.database_url,
            ledger.max_connections,
            ledger.busy_timeout(),
        )
        .await
        .map_err(AppInitError::Database)?;

        sqlite.migrate().await.map_err(AppInitError::Migrate)?;

        info!(database_url = %ledger.database_url, "ledger database ready");

        Ok(Self::with_ledger(
            Arc::new(sqlite),
            Arc::new(SystemClock),
            cache.ttl(),
        ))
    }

    /// Services over a fresh in-memory ledger and the wall clock.
    #[must_use]
    pub fn in_memory(cache: &CacheConfig) -> Self {
        Self::with_ledger(Arc::new(MemoryLedger::new()), Arc::new(SystemClock), cache.ttl())
    }
}
