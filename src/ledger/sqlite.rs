//! SQLite ledger

use std::{str::FromStr, time::Duration};

use async_trait::async_trait;
use jiff::Timestamp;
use smallvec::SmallVec;
use sqlx::{
    FromRow, Row, Sqlite, SqlitePool, Transaction,
    query, query_as, query_scalar,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow},
};

use crate::ledger::{
    CatalogEntry, FlashSaleId, FlashSaleIdSource, FlashSaleRecord, Ledger, LedgerChanges,
    LedgerError, NewProduct, ProductId, ProductLedger, ProductRecord, ProductSnapshot,
};

const LOCK_PRODUCT_SQL: &str = include_str!("sql/lock_product.sql");
const GET_PRODUCT_SQL: &str = include_str!("sql/get_product.sql");
const COUNT_PRODUCTS_SQL: &str = include_str!("sql/count_products.sql");
const CREATE_PRODUCT_SQL: &str = include_str!("sql/create_product.sql");
const DELETE_PRODUCT_SQL: &str = include_str!("sql/delete_product.sql");
const UPDATE_STOCK_SQL: &str = include_str!("sql/update_stock.sql");
const LIST_PRODUCT_FLASH_SALES_SQL: &str = include_str!("sql/list_product_flash_sales.sql");
const GET_FLASH_SALE_SQL: &str = include_str!("sql/get_flash_sale.sql");
const LIST_FLASH_SALES_SQL: &str = include_str!("sql/list_flash_sales.sql");
const NEXT_FLASH_SALE_ID_SQL: &str = include_str!("sql/next_flash_sale_id.sql");
const CREATE_FLASH_SALE_SQL: &str = include_str!("sql/create_flash_sale.sql");
const UPDATE_FLASH_SALE_SQL: &str = include_str!("sql/update_flash_sale.sql");
const DELETE_FLASH_SALE_SQL: &str = include_str!("sql/delete_flash_sale.sql");
const LIST_CATALOG_SQL: &str = include_str!("sql/list_catalog.sql");

/// Ledger stored in an embedded SQLite database.
///
/// Every atomic unit opens its transaction with a write to the product row, so the
/// connection holds SQLite's writer lock before it reads anything it will act on.
#[derive(Debug, Clone)]
pub struct SqliteLedger {
    pool: SqlitePool,
}

impl SqliteLedger {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if missing) the database at `url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the database cannot be opened.
    pub async fn connect(
        url: &str,
        max_connections: u32,
        busy_timeout: Duration,
    ) -> Result<Self, LedgerError> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(busy_timeout);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        Ok(Self::new(pool))
    }

    /// Open a private in-memory database.
    ///
    /// The pool holds exactly one connection that is never recycled, since every
    /// connection to `:memory:` would otherwise see its own empty database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    pub async fn connect_in_memory() -> Result<Self, LedgerError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Ok(Self::new(pool))
    }

    /// Apply any pending schema migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if a migration fails to apply.
    pub async fn migrate(&self) -> Result<(), LedgerError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;

        Ok(())
    }

    async fn begin_unit(
        &self,
        product: ProductId,
    ) -> Result<(Transaction<'static, Sqlite>, ProductLedger), LedgerError> {
        let mut tx = self.pool.begin().await?;

        let locked = query(LOCK_PRODUCT_SQL)
            .bind(product.into_i64())
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if locked == 0 {
            return Err(LedgerError::ProductNotFound(product));
        }

        let snapshot = load_snapshot(&mut tx, product).await?;

        let next: i64 = query_scalar(NEXT_FLASH_SALE_ID_SQL)
            .fetch_one(&mut *tx)
            .await?;

        Ok((
            tx,
            ProductLedger::new(snapshot, FlashSaleIdSource::Reserved { next }),
        ))
    }

    async fn commit_unit(
        &self,
        mut tx: Transaction<'static, Sqlite>,
        unit: ProductLedger,
    ) -> Result<(), LedgerError> {
        let product = unit.product().id;
        let (_, changes) = unit.finish();

        if changes.is_empty() {
            tx.rollback().await?;

            return Ok(());
        }

        persist_changes(&mut tx, product, &changes).await?;

        tx.commit().await?;

        Ok(())
    }
}

#[async_trait]
impl Ledger for SqliteLedger {
    async fn insert_product(&self, product: NewProduct) -> Result<ProductRecord, LedgerError> {
        let record = query_as::<Sqlite, ProductRecord>(CREATE_PRODUCT_SQL)
            .bind(product.name)
            .bind(to_i64(product.price_cents, "price_cents")?)
            .bind(to_i64(product.stock, "stock")?)
            .fetch_one(&self.pool)
            .await?;

        Ok(record)
    }

    async fn product(&self, product: ProductId) -> Result<ProductRecord, LedgerError> {
        query_as::<Sqlite, ProductRecord>(GET_PRODUCT_SQL)
            .bind(product.into_i64())
            .fetch_optional(&self.pool)
            .await?
            .ok_or(LedgerError::ProductNotFound(product))
    }

    async fn product_count(&self) -> Result<u64, LedgerError> {
        let count: i64 = query_scalar(COUNT_PRODUCTS_SQL)
            .fetch_one(&self.pool)
            .await?;

        Ok(to_u64(count, "count")?)
    }

    async fn delete_product(&self, product: ProductId) -> Result<(), LedgerError> {
        let rows_affected = query(DELETE_PRODUCT_SQL)
            .bind(product.into_i64())
            .execute(&self.pool)
            .await?
            .rows_affected();

        if rows_affected == 0 {
            return Err(LedgerError::ProductNotFound(product));
        }

        Ok(())
    }

    async fn snapshot(&self, product: ProductId) -> Result<ProductSnapshot, LedgerError> {
        let mut tx = self.pool.begin().await?;

        let snapshot = load_snapshot(&mut tx, product).await?;

        tx.commit().await?;

        Ok(snapshot)
    }

    async fn flash_sale(&self, flash_sale: FlashSaleId) -> Result<FlashSaleRecord, LedgerError> {
        query_as::<Sqlite, FlashSaleRecord>(GET_FLASH_SALE_SQL)
            .bind(flash_sale.into_i64())
            .fetch_optional(&self.pool)
            .await?
            .ok_or(LedgerError::FlashSaleNotFound(flash_sale))
    }

    async fn flash_sales(&self) -> Result<Vec<FlashSaleRecord>, LedgerError> {
        let flash_sales = query_as::<Sqlite, FlashSaleRecord>(LIST_FLASH_SALES_SQL)
            .fetch_all(&self.pool)
            .await?;

        Ok(flash_sales)
    }

    async fn catalog(&self, at: Timestamp) -> Result<Vec<CatalogEntry>, LedgerError> {
        let entries = query_as::<Sqlite, CatalogEntry>(LIST_CATALOG_SQL)
            .bind(at.as_millisecond())
            .fetch_all(&self.pool)
            .await?;

        Ok(entries)
    }

    async fn run_atomic<T, E, F>(&self, product: ProductId, work: F) -> Result<T, E>
    where
        T: Send,
        E: From<LedgerError> + Send,
        F: FnOnce(&mut ProductLedger) -> Result<T, E> + Send,
    {
        let (tx, mut unit) = self.begin_unit(product).await?;

        // Dropping `tx` on error rolls back the writer lock taken in `begin_unit`.
        let output = work(&mut unit)?;

        self.commit_unit(tx, unit).await?;

        Ok(output)
    }
}

async fn load_snapshot(
    tx: &mut Transaction<'_, Sqlite>,
    product: ProductId,
) -> Result<ProductSnapshot, LedgerError> {
    let record = query_as::<Sqlite, ProductRecord>(GET_PRODUCT_SQL)
        .bind(product.into_i64())
        .fetch_optional(&mut **tx)
        .await?
        .ok_or(LedgerError::ProductNotFound(product))?;

    let flash_sales = query_as::<Sqlite, FlashSaleRecord>(LIST_PRODUCT_FLASH_SALES_SQL)
        .bind(product.into_i64())
        .fetch_all(&mut **tx)
        .await?;

    Ok(ProductSnapshot {
        product: record,
        flash_sales: SmallVec::from_vec(flash_sales),
    })
}

async fn persist_changes(
    tx: &mut Transaction<'_, Sqlite>,
    product: ProductId,
    changes: &LedgerChanges,
) -> Result<(), sqlx::Error> {
    if let Some(stock) = changes.stock {
        query(UPDATE_STOCK_SQL)
            .bind(product.into_i64())
            .bind(to_i64(stock, "stock")?)
            .execute(&mut **tx)
            .await?;
    }

    for id in &changes.deleted {
        query(DELETE_FLASH_SALE_SQL)
            .bind(id.into_i64())
            .execute(&mut **tx)
            .await?;
    }

    for sale in &changes.updated {
        query(UPDATE_FLASH_SALE_SQL)
            .bind(sale.id.into_i64())
            .bind(to_i64(sale.sale_price_cents, "sale_price_cents")?)
            .bind(sale.starts_at.as_millisecond())
            .bind(sale.ends_at.as_millisecond())
            .bind(optional_i64(sale.max_units, "max_units")?)
            .bind(to_i64(sale.sold_units, "sold_units")?)
            .execute(&mut **tx)
            .await?;
    }

    for sale in &changes.inserted {
        query(CREATE_FLASH_SALE_SQL)
            .bind(sale.id.into_i64())
            .bind(sale.product_id.into_i64())
            .bind(to_i64(sale.sale_price_cents, "sale_price_cents")?)
            .bind(sale.starts_at.as_millisecond())
            .bind(sale.ends_at.as_millisecond())
            .bind(optional_i64(sale.max_units, "max_units")?)
            .bind(to_i64(sale.sold_units, "sold_units")?)
            .execute(&mut **tx)
            .await?;
    }

    Ok(())
}

impl<'r> FromRow<'r, SqliteRow> for ProductRecord {
    fn from_row(row: &'r SqliteRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: ProductId::from_i64(row.try_get("id")?),
            name: row.try_get("name")?,
            price_cents: decode_u64(row, "price_cents")?,
            stock: decode_u64(row, "stock")?,
        })
    }
}

impl<'r> FromRow<'r, SqliteRow> for FlashSaleRecord {
    fn from_row(row: &'r SqliteRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: FlashSaleId::from_i64(row.try_get("id")?),
            product_id: ProductId::from_i64(row.try_get("product_id")?),
            sale_price_cents: decode_u64(row, "sale_price_cents")?,
            starts_at: decode_timestamp(row, "start_at_ms")?,
            ends_at: decode_timestamp(row, "end_at_ms")?,
            max_units: row
                .try_get::<Option<i64>, _>("max_units")?
                .map(|max| to_u64(max, "max_units"))
                .transpose()?,
            sold_units: decode_u64(row, "sold_units")?,
        })
    }
}

impl<'r> FromRow<'r, SqliteRow> for CatalogEntry {
    fn from_row(row: &'r SqliteRow) -> sqlx::Result<Self> {
        let product = ProductRecord::from_row(row)?;

        let active_flash_sale = match row.try_get::<Option<i64>, _>("flash_sale_id")? {
            Some(id) => Some(FlashSaleRecord {
                id: FlashSaleId::from_i64(id),
                product_id: product.id,
                sale_price_cents: decode_u64(row, "sale_price_cents")?,
                starts_at: decode_timestamp(row, "start_at_ms")?,
                ends_at: decode_timestamp(row, "end_at_ms")?,
                max_units: row
                    .try_get::<Option<i64>, _>("max_units")?
                    .map(|max| to_u64(max, "max_units"))
                    .transpose()?,
                sold_units: decode_u64(row, "sold_units")?,
            }),
            None => None,
        };

        Ok(Self {
            product,
            active_flash_sale,
        })
    }
}

fn decode_u64(row: &SqliteRow, column: &str) -> sqlx::Result<u64> {
    to_u64(row.try_get(column)?, column)
}

fn decode_timestamp(row: &SqliteRow, column: &str) -> sqlx::Result<Timestamp> {
    let millis: i64 = row.try_get(column)?;

    Timestamp::from_millisecond(millis).map_err(|e| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(e),
    })
}

fn to_u64(value: i64, column: &str) -> sqlx::Result<u64> {
    u64::try_from(value).map_err(|e| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(e),
    })
}

fn to_i64(value: u64, column: &str) -> sqlx::Result<i64> {
    i64::try_from(value).map_err(|e| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(e),
    })
}

fn optional_i64(value: Option<u64>, column: &str) -> sqlx::Result<Option<i64>> {
    value.map(|value| to_i64(value, column)).transpose()
}
