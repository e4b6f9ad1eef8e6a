//! In-memory ledger
//!
//! Each product lives in its own slot behind an async mutex, so atomic units on the
//! same product queue up while units on different products run side by side. The
//! storage constraints the SQLite schema enforces are checked before a unit commits.

use std::{
    collections::BTreeMap,
    sync::{
        Arc,
        atomic::{AtomicI64, Ordering},
    },
};

use async_trait::async_trait;
use jiff::Timestamp;
use rustc_hash::FxHashMap;
use tokio::sync::{Mutex, RwLock};

use crate::{
    ledger::{
        CatalogEntry, FlashSaleId, FlashSaleIdSource, FlashSaleRecord, Ledger, LedgerChanges,
        LedgerError, NewProduct, ProductId, ProductLedger, ProductRecord, ProductSnapshot,
    },
    pricing,
};

type Slot = Arc<Mutex<Option<ProductSnapshot>>>;

/// Ledger held entirely in process memory.
#[derive(Debug)]
pub struct MemoryLedger {
    products: RwLock<BTreeMap<ProductId, Slot>>,
    owners: RwLock<FxHashMap<FlashSaleId, ProductId>>,
    next_product_id: AtomicI64,
    next_flash_sale_id: Arc<AtomicI64>,
}

impl MemoryLedger {
    #[must_use]
    pub fn new() -> Self {
        Self {
            products: RwLock::new(BTreeMap::new()),
            owners: RwLock::new(FxHashMap::default()),
            next_product_id: AtomicI64::new(1),
            next_flash_sale_id: Arc::new(AtomicI64::new(1)),
        }
    }

    async fn slot(&self, product: ProductId) -> Result<Slot, LedgerError> {
        self.products
            .read()
            .await
            .get(&product)
            .cloned()
            .ok_or(LedgerError::ProductNotFound(product))
    }

    async fn slots(&self) -> Vec<Slot> {
        self.products.read().await.values().cloned().collect()
    }

    async fn owner(&self, flash_sale: FlashSaleId) -> Result<ProductId, LedgerError> {
        self.owners
            .read()
            .await
            .get(&flash_sale)
            .copied()
            .ok_or(LedgerError::FlashSaleNotFound(flash_sale))
    }
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn insert_product(&self, product: NewProduct) -> Result<ProductRecord, LedgerError> {
        if product.name.is_empty() {
            return Err(LedgerError::InvalidData("product name must not be empty".to_string()));
        }

        if product.price_cents == 0 {
            return Err(LedgerError::InvalidData("product price must be positive".to_string()));
        }

        let id = ProductId::from_i64(self.next_product_id.fetch_add(1, Ordering::SeqCst));

        let record = ProductRecord {
            id,
            name: product.name,
            price_cents: product.price_cents,
            stock: product.stock,
        };

        let snapshot = ProductSnapshot {
            product: record.clone(),
            flash_sales: smallvec::SmallVec::new(),
        };

        self.products
            .write()
            .await
            .insert(id, Arc::new(Mutex::new(Some(snapshot))));

        Ok(record)
    }

    async fn product(&self, product: ProductId) -> Result<ProductRecord, LedgerError> {
        self.snapshot(product).await.map(|snapshot| snapshot.product)
    }

    async fn product_count(&self) -> Result<u64, LedgerError> {
        let count = self.products.read().await.len();

        Ok(u64::try_from(count).unwrap_or(u64::MAX))
    }

    async fn delete_product(&self, product: ProductId) -> Result<(), LedgerError> {
        let slot = self
            .products
            .write()
            .await
            .remove(&product)
            .ok_or(LedgerError::ProductNotFound(product))?;

        let removed = slot
            .lock()
            .await
            .take()
            .ok_or(LedgerError::ProductNotFound(product))?;

        let mut owners = self.owners.write().await;

        for sale in &removed.flash_sales {
            owners.remove(&sale.id);
        }

        Ok(())
    }

    async fn snapshot(&self, product: ProductId) -> Result<ProductSnapshot, LedgerError> {
        let slot = self.slot(product).await?;

        let state = slot.lock().await;

        state.clone().ok_or(LedgerError::ProductNotFound(product))
    }

    async fn flash_sale(&self, flash_sale: FlashSaleId) -> Result<FlashSaleRecord, LedgerError> {
        let owner = self.owner(flash_sale).await?;

        let snapshot = self
            .snapshot(owner)
            .await
            .map_err(|_not_found| LedgerError::FlashSaleNotFound(flash_sale))?;

        snapshot
            .flash_sales
            .into_iter()
            .find(|sale| sale.id == flash_sale)
            .ok_or(LedgerError::FlashSaleNotFound(flash_sale))
    }

    async fn flash_sales(&self) -> Result<Vec<FlashSaleRecord>, LedgerError> {
        let mut flash_sales = Vec::new();

        for slot in self.slots().await {
            if let Some(snapshot) = slot.lock().await.as_ref() {
                flash_sales.extend(snapshot.flash_sales.iter().cloned());
            }
        }

        flash_sales.sort_by(|a, b| b.starts_at.cmp(&a.starts_at).then(b.id.cmp(&a.id)));

        Ok(flash_sales)
    }

    async fn catalog(&self, at: Timestamp) -> Result<Vec<CatalogEntry>, LedgerError> {
        let mut entries = Vec::new();

        for slot in self.slots().await {
            if let Some(snapshot) = slot.lock().await.as_ref() {
                entries.push(CatalogEntry {
                    product: snapshot.product.clone(),
                    active_flash_sale: pricing::active_flash_sale(&snapshot.flash_sales, at)
                        .cloned(),
                });
            }
        }

        Ok(entries)
    }

    async fn run_atomic<T, E, F>(&self, product: ProductId, work: F) -> Result<T, E>
    where
        T: Send,
        E: From<LedgerError> + Send,
        F: FnOnce(&mut ProductLedger) -> Result<T, E> + Send,
    {
        let slot = self.slot(product).await?;

        let mut state = slot.lock().await;

        let Some(current) = state.as_ref() else {
            return Err(LedgerError::ProductNotFound(product).into());
        };

        let mut unit = ProductLedger::new(
            current.clone(),
            FlashSaleIdSource::Shared(self.next_flash_sale_id.clone()),
        );

        let output = work(&mut unit)?;

        let (updated, changes) = unit.finish();

        check_changes(current, &updated, &changes)?;

        if !changes.inserted.is_empty() || !changes.deleted.is_empty() {
            let mut owners = self.owners.write().await;

            for sale in &changes.inserted {
                owners.insert(sale.id, product);
            }

            for id in &changes.deleted {
                owners.remove(id);
            }
        }

        *state = Some(updated);

        Ok(output)
    }
}

/// Reject changes the SQLite schema would refuse.
fn check_changes(
    current: &ProductSnapshot,
    updated: &ProductSnapshot,
    changes: &LedgerChanges,
) -> Result<(), LedgerError> {
    for sale in changes.inserted.iter().chain(&changes.updated) {
        check_flash_sale(&updated.product, sale)?;
    }

    for sale in &changes.updated {
        let previous = current.flash_sales.iter().find(|prior| prior.id == sale.id);

        if previous.is_some_and(|prior| sale.sold_units < prior.sold_units) {
            return Err(LedgerError::InvalidData(
                "flash sale sold units cannot decrease".to_string(),
            ));
        }

        if previous.is_some_and(|prior| sale.product_id != prior.product_id) {
            return Err(LedgerError::InvalidReference);
        }
    }

    Ok(())
}

fn check_flash_sale(product: &ProductRecord, sale: &FlashSaleRecord) -> Result<(), LedgerError> {
    let violation = if sale.sale_price_cents == 0 {
        Some("flash sale price must be positive")
    } else if sale.sale_price_cents >= product.price_cents {
        Some("flash sale price must be below the product price")
    } else if sale.ends_at <= sale.starts_at {
        Some("flash sale must end after it starts")
    } else if sale.max_units == Some(0) {
        Some("flash sale max units must be positive")
    } else if sale.max_units.is_some_and(|max| sale.sold_units > max) {
        Some("flash sale sold units exceed max units")
    } else {
        None
    };

    match violation {
        Some(message) => Err(LedgerError::InvalidData(message.to_string())),
        None => Ok(()),
    }
}
