//! Catalog
//!
//! Lists every product with the flash sale that prices it at a given instant.

use std::sync::Arc;

use async_trait::async_trait;
use jiff::Timestamp;
use mockall::automock;
use thiserror::Error;
use tracing::debug;

use crate::ledger::{CatalogEntry, Ledger, LedgerError};

pub mod cache;

pub use cache::CatalogCache;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("storage error")]
    Storage(#[from] LedgerError),
}

/// Read side of the catalog.
#[automock]
#[async_trait]
pub trait CatalogReader: Send + Sync {
    /// Every product, lowest id first, joined with its active flash sale at `at`.
    async fn list_catalog(&self, at: Timestamp) -> Result<Vec<CatalogEntry>, CatalogError>;
}

/// Catalog read straight from a ledger in a single query.
#[derive(Debug)]
pub struct LedgerCatalogReader<L> {
    ledger: Arc<L>,
}

impl<L: Ledger> LedgerCatalogReader<L> {
    #[must_use]
    pub fn new(ledger: Arc<L>) -> Self {
        Self { ledger }
    }
}

#[async_trait]
impl<L: Ledger + 'static> CatalogReader for LedgerCatalogReader<L> {
    #[tracing::instrument(name = "catalog.reader.list_catalog", skip(self), fields(at = %at), err)]
    async fn list_catalog(&self, at: Timestamp) -> Result<Vec<CatalogEntry>, CatalogError> {
        let entries = self.ledger.catalog(at).await?;

        debug!(products = entries.len(), "catalog read from ledger");

        Ok(entries)
    }
}
