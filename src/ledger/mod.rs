//! Ledger
//!
//! Durable storage of products and their flash sales. Every mutation that has to read
//! before it writes goes through [`Ledger::run_atomic`], which hands the caller one
//! product's rows as a [`ProductLedger`] and persists whatever it stages only when the
//! closure succeeds.

use std::{
    fmt::Debug,
    sync::{
        Arc,
        atomic::{AtomicI64, Ordering},
    },
};

use async_trait::async_trait;
use jiff::Timestamp;
use rustc_hash::FxHashSet;
use smallvec::SmallVec;

use crate::pricing;

pub mod errors;
pub mod memory;
pub mod records;
pub mod sqlite;

pub use errors::LedgerError;
pub use memory::MemoryLedger;
pub use records::*;
pub use sqlite::SqliteLedger;

/// Transactional store of products and flash sales.
#[async_trait]
pub trait Ledger: Debug + Send + Sync {
    /// Insert a product and return it with its assigned id.
    async fn insert_product(&self, product: NewProduct) -> Result<ProductRecord, LedgerError>;

    /// Read a single product.
    async fn product(&self, product: ProductId) -> Result<ProductRecord, LedgerError>;

    /// Number of products held.
    async fn product_count(&self) -> Result<u64, LedgerError>;

    /// Delete a product along with all of its flash sales.
    async fn delete_product(&self, product: ProductId) -> Result<(), LedgerError>;

    /// Read a product and its flash sales as one consistent unit.
    async fn snapshot(&self, product: ProductId) -> Result<ProductSnapshot, LedgerError>;

    /// Read a single flash sale.
    async fn flash_sale(&self, flash_sale: FlashSaleId) -> Result<FlashSaleRecord, LedgerError>;

    /// Every flash sale, latest start first, then highest id first.
    async fn flash_sales(&self) -> Result<Vec<FlashSaleRecord>, LedgerError>;

    /// Every product, lowest id first, with the flash sale active at `at`.
    async fn catalog(&self, at: Timestamp) -> Result<Vec<CatalogEntry>, LedgerError>;

    /// Run `work` against `product` as a single all-or-nothing unit.
    ///
    /// Units on the same product never interleave. Changes staged on the
    /// [`ProductLedger`] are persisted only when `work` returns `Ok`.
    ///
    /// # Errors
    ///
    /// Returns the closure's error unchanged, or a [`LedgerError`] converted into `E`
    /// when the product does not exist or the storage layer fails.
    async fn run_atomic<T, E, F>(&self, product: ProductId, work: F) -> Result<T, E>
    where
        T: Send,
        E: From<LedgerError> + Send,
        F: FnOnce(&mut ProductLedger) -> Result<T, E> + Send;
}

/// Where newly staged flash sales get their ids from.
#[derive(Debug)]
pub(crate) enum FlashSaleIdSource {
    /// Counter shared by every unit; ids skipped by aborted units are never reused.
    Shared(Arc<AtomicI64>),

    /// Block of ids reserved for a unit holding the store's writer lock.
    Reserved { next: i64 },
}

impl FlashSaleIdSource {
    fn next_id(&mut self) -> FlashSaleId {
        match self {
            Self::Shared(counter) => FlashSaleId::from_i64(counter.fetch_add(1, Ordering::SeqCst)),
            Self::Reserved { next } => {
                let id = *next;

                *next = next.saturating_add(1);

                FlashSaleId::from_i64(id)
            }
        }
    }
}

/// Rows written by a committed unit.
#[derive(Debug, Default)]
pub(crate) struct LedgerChanges {
    pub(crate) stock: Option<u64>,
    pub(crate) inserted: Vec<FlashSaleRecord>,
    pub(crate) updated: Vec<FlashSaleRecord>,
    pub(crate) deleted: Vec<FlashSaleId>,
}

impl LedgerChanges {
    pub(crate) fn is_empty(&self) -> bool {
        self.stock.is_none()
            && self.inserted.is_empty()
            && self.updated.is_empty()
            && self.deleted.is_empty()
    }
}

/// One product's rows, open for reading and staging changes inside
/// [`Ledger::run_atomic`].
#[derive(Debug)]
pub struct ProductLedger {
    snapshot: ProductSnapshot,
    ids: FlashSaleIdSource,
    stock_changed: bool,
    touched: FxHashSet<FlashSaleId>,
    inserted: FxHashSet<FlashSaleId>,
    deleted: SmallVec<[FlashSaleId; 2]>,
}

impl ProductLedger {
    pub(crate) fn new(snapshot: ProductSnapshot, ids: FlashSaleIdSource) -> Self {
        Self {
            snapshot,
            ids,
            stock_changed: false,
            touched: FxHashSet::default(),
            inserted: FxHashSet::default(),
            deleted: SmallVec::new(),
        }
    }

    /// The product row, including any staged stock change.
    pub fn product(&self) -> &ProductRecord {
        &self.snapshot.product
    }

    /// The product's flash sales, lowest id first.
    pub fn flash_sales(&self) -> &[FlashSaleRecord] {
        &self.snapshot.flash_sales
    }

    /// One of the product's flash sales by id.
    pub fn flash_sale(&self, flash_sale: FlashSaleId) -> Option<&FlashSaleRecord> {
        self.snapshot
            .flash_sales
            .iter()
            .find(|sale| sale.id == flash_sale)
    }

    /// The flash sale that prices this product at `at`, if any.
    pub fn active_flash_sale(&self, at: Timestamp) -> Option<&FlashSaleRecord> {
        pricing::active_flash_sale(self.snapshot.flash_sales.iter(), at)
    }

    /// Mutable access to a flash sale; any change made through it is persisted.
    pub fn flash_sale_mut(&mut self, flash_sale: FlashSaleId) -> Option<&mut FlashSaleRecord> {
        let sale = self
            .snapshot
            .flash_sales
            .iter_mut()
            .find(|sale| sale.id == flash_sale)?;

        self.touched.insert(flash_sale);

        Some(sale)
    }

    /// Stage a new stock level.
    pub fn set_stock(&mut self, stock: u64) {
        self.snapshot.product.stock = stock;
        self.stock_changed = true;
    }

    /// Stage a new flash sale on this product with nothing sold yet.
    pub fn insert_flash_sale(&mut self, terms: &FlashSaleTerms) -> FlashSaleRecord {
        let id = self.ids.next_id();

        let record = FlashSaleRecord {
            id,
            product_id: self.snapshot.product.id,
            sale_price_cents: terms.sale_price_cents,
            starts_at: terms.starts_at,
            ends_at: terms.ends_at,
            max_units: terms.max_units,
            sold_units: 0,
        };

        self.snapshot.flash_sales.push(record.clone());
        self.inserted.insert(id);

        record
    }

    /// Stage the removal of a flash sale, returning it if it existed.
    pub fn remove_flash_sale(&mut self, flash_sale: FlashSaleId) -> Option<FlashSaleRecord> {
        let index = self
            .snapshot
            .flash_sales
            .iter()
            .position(|sale| sale.id == flash_sale)?;

        let removed = self.snapshot.flash_sales.remove(index);

        if !self.inserted.remove(&flash_sale) {
            self.deleted.push(flash_sale);
        }

        Some(removed)
    }

    /// Close the unit, yielding the final rows and what changed.
    pub(crate) fn finish(self) -> (ProductSnapshot, LedgerChanges) {
        let Self {
            snapshot,
            stock_changed,
            touched,
            inserted,
            deleted,
            ..
        } = self;

        let mut changes = LedgerChanges {
            stock: stock_changed.then_some(snapshot.product.stock),
            deleted: deleted.into_vec(),
            ..LedgerChanges::default()
        };

        for sale in &snapshot.flash_sales {
            if inserted.contains(&sale.id) {
                changes.inserted.push(sale.clone());
            } else if touched.contains(&sale.id) {
                changes.updated.push(sale.clone());
            }
        }

        (snapshot, changes)
    }
}
