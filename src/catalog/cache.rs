//! Catalog read cache

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use jiff::{SignedDuration, Timestamp};
use tokio::sync::Mutex;
use tracing::debug;

use crate::{
    catalog::{CatalogError, CatalogReader},
    clock::Clock,
    ledger::CatalogEntry,
};

/// Default time a catalog snapshot stays fresh.
pub const DEFAULT_TTL: SignedDuration = SignedDuration::from_millis(2_000);

/// Snapshot of the catalog shared by every reader until it expires or is invalidated.
pub type CatalogSnapshot = Arc<[CatalogEntry]>;

#[derive(Debug)]
struct CachedCatalog {
    version: u64,
    expires_at: Timestamp,
    entries: CatalogSnapshot,
}

/// Short-lived memo of the catalog read.
///
/// Writers call [`CatalogCache::invalidate`] after committing, which drops the entry
/// and advances the ledger version. A read that began under an older version still
/// answers its caller but is never stored.
pub struct CatalogCache {
    reader: Arc<dyn CatalogReader>,
    clock: Arc<dyn Clock>,
    ttl: SignedDuration,
    version: AtomicU64,
    entry: Mutex<Option<CachedCatalog>>,
}

impl CatalogCache {
    #[must_use]
    pub fn new(reader: Arc<dyn CatalogReader>, clock: Arc<dyn Clock>, ttl: SignedDuration) -> Self {
        Self {
            reader,
            clock,
            ttl,
            version: AtomicU64::new(0),
            entry: Mutex::new(None),
        }
    }

    /// The catalog as of `now`, served from cache while fresh.
    ///
    /// # Errors
    ///
    /// Returns a [`CatalogError`] if the catalog has to be read and the read fails.
    #[tracing::instrument(name = "catalog.cache.get", skip(self), fields(at = %now), err)]
    pub async fn get(&self, now: Timestamp) -> Result<CatalogSnapshot, CatalogError> {
        let version = self.version.load(Ordering::SeqCst);

        if let Some(entries) = self.fresh(version, now).await {
            debug!(version, "catalog cache hit");

            return Ok(entries);
        }

        let entries: CatalogSnapshot = self.reader.list_catalog(now).await?.into();

        let mut entry = self.entry.lock().await;

        if self.version.load(Ordering::SeqCst) == version {
            *entry = Some(CachedCatalog {
                version,
                expires_at: now.checked_add(self.ttl).unwrap_or(Timestamp::MAX),
                entries: entries.clone(),
            });
        } else {
            debug!(version, "ledger changed during catalog read, not caching");
        }

        Ok(entries)
    }

    /// The catalog as of the injected clock's current time.
    ///
    /// # Errors
    ///
    /// Returns a [`CatalogError`] if the catalog has to be read and the read fails.
    pub async fn current(&self) -> Result<CatalogSnapshot, CatalogError> {
        self.get(self.clock.now()).await
    }

    /// Drop the cached snapshot and advance the ledger version, returning the new one.
    pub async fn invalidate(&self) -> u64 {
        let mut entry = self.entry.lock().await;

        let version = self.version.fetch_add(1, Ordering::SeqCst).saturating_add(1);

        *entry = None;

        version
    }

    /// Number of invalidations so far.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }

    async fn fresh(&self, version: u64, now: Timestamp) -> Option<CatalogSnapshot> {
        let entry = self.entry.lock().await;

        entry
            .as_ref()
            .filter(|cached| cached.version == version && now < cached.expires_at)
            .map(|cached| cached.entries.clone())
    }
}

impl Debug for CatalogCache {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("CatalogCache")
            .field("clock", &self.clock)
            .field("ttl", &self.ttl)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use async_trait::async_trait;
    use mockall::predicate::always;
    use testresult::TestResult;
    use tokio::sync::Notify;

    use super::*;
    use crate::{
        catalog::MockCatalogReader,
        clock::ManualClock,
        ledger::{LedgerError, ProductId, ProductRecord},
    };

    fn entry(id: i64, stock: u64) -> CatalogEntry {
        CatalogEntry {
            product: ProductRecord {
                id: ProductId::from_i64(id),
                name: format!("Product {id}"),
                price_cents: 1_000,
                stock,
            },
            active_flash_sale: None,
        }
    }

    fn cache_with(reader: MockCatalogReader) -> TestResult<CatalogCache> {
        let clock = ManualClock::new(Timestamp::from_millisecond(0)?);

        Ok(CatalogCache::new(Arc::new(reader), Arc::new(clock), DEFAULT_TTL))
    }

    #[tokio::test]
    async fn serves_cached_snapshot_within_ttl() -> TestResult {
        let mut reader = MockCatalogReader::new();

        reader
            .expect_list_catalog()
            .with(always())
            .times(1)
            .returning(|_| Ok(vec![entry(1, 5)]));

        let cache = cache_with(reader)?;

        let first = cache.get(Timestamp::from_millisecond(0)?).await?;
        let second = cache.get(Timestamp::from_millisecond(1_999)?).await?;

        assert!(Arc::ptr_eq(&first, &second), "second read should reuse the snapshot");

        Ok(())
    }

    #[tokio::test]
    async fn recomputes_once_expired() -> TestResult {
        let mut reader = MockCatalogReader::new();

        reader
            .expect_list_catalog()
            .times(2)
            .returning(|_| Ok(vec![entry(1, 5)]));

        let cache = cache_with(reader)?;

        cache.get(Timestamp::from_millisecond(0)?).await?;
        cache.get(Timestamp::from_millisecond(2_000)?).await?;

        Ok(())
    }

    #[tokio::test]
    async fn invalidation_forces_a_fresh_read() -> TestResult {
        let mut reader = MockCatalogReader::new();
        let mut seq = mockall::Sequence::new();

        reader
            .expect_list_catalog()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(vec![entry(1, 5)]));

        reader
            .expect_list_catalog()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(vec![entry(1, 3)]));

        let cache = cache_with(reader)?;

        let before = cache.get(Timestamp::from_millisecond(0)?).await?;
        let version = cache.invalidate().await;
        let after = cache.get(Timestamp::from_millisecond(1)?).await?;

        assert_eq!(version, 1);
        assert_eq!(before.first().map(|e| e.product.stock), Some(5));
        assert_eq!(after.first().map(|e| e.product.stock), Some(3));

        Ok(())
    }

    #[tokio::test]
    async fn read_errors_are_not_cached() -> TestResult {
        let mut reader = MockCatalogReader::new();
        let mut seq = mockall::Sequence::new();

        reader
            .expect_list_catalog()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(CatalogError::Storage(LedgerError::MissingRequiredData)));

        reader
            .expect_list_catalog()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(vec![entry(2, 1)]));

        let cache = cache_with(reader)?;

        let failed = cache.get(Timestamp::from_millisecond(0)?).await;
        let recovered = cache.get(Timestamp::from_millisecond(1)?).await?;

        assert!(failed.is_err(), "first read should surface the storage error");
        assert_eq!(recovered.len(), 1);

        Ok(())
    }

    #[tokio::test]
    async fn current_reads_at_the_clock_time() -> TestResult {
        let mut reader = MockCatalogReader::new();
        let at = Timestamp::from_millisecond(42_000)?;

        reader
            .expect_list_catalog()
            .withf(move |requested| *requested == at)
            .times(1)
            .returning(|_| Ok(Vec::new()));

        let cache = CatalogCache::new(
            Arc::new(reader),
            Arc::new(ManualClock::new(at)),
            DEFAULT_TTL,
        );

        cache.current().await?;

        Ok(())
    }

    #[derive(Debug, Default)]
    struct GatedReader {
        calls: AtomicUsize,
        started: Notify,
        proceed: Notify,
    }

    #[async_trait]
    impl CatalogReader for GatedReader {
        async fn list_catalog(&self, _at: Timestamp) -> Result<Vec<CatalogEntry>, CatalogError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                self.started.notify_one();
                self.proceed.notified().await;

                return Ok(vec![entry(1, 10)]);
            }

            Ok(vec![entry(1, 9)])
        }
    }

    #[tokio::test]
    async fn read_overtaken_by_a_write_is_not_cached() -> TestResult {
        let reader = Arc::new(GatedReader::default());
        let clock = Arc::new(ManualClock::new(Timestamp::from_millisecond(0)?));
        let cache = Arc::new(CatalogCache::new(reader.clone(), clock, DEFAULT_TTL));

        let at = Timestamp::from_millisecond(0)?;

        let stale_read = tokio::spawn({
            let cache = cache.clone();

            async move { cache.get(at).await }
        });

        reader.started.notified().await;
        cache.invalidate().await;
        reader.proceed.notify_one();

        let stale = stale_read.await??;
        let fresh = cache.get(Timestamp::from_millisecond(1)?).await?;

        assert_eq!(stale.first().map(|e| e.product.stock), Some(10));
        assert_eq!(fresh.first().map(|e| e.product.stock), Some(9));
        assert_eq!(reader.calls.load(Ordering::SeqCst), 2);

        Ok(())
    }
}
