//! Seeding
//!
//! Populates an empty ledger from a YAML fixture. Flash sale windows are written
//! relative to the seeding instant so a fresh store always opens with live sales.

use std::{fs, path::Path};

use jiff::{SignedDuration, Timestamp};
use rustc_hash::FxHashMap;
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::{
    flash_sales::{FlashSalesService, FlashSalesServiceError},
    ledger::{FlashSaleTerms, NewProduct, ProductRecord},
    products::{ProductsService, ProductsServiceError},
};

const STOREFRONT_FIXTURE: &str = include_str!("../fixtures/storefront.yaml");

/// Seeding errors
#[derive(Debug, Error)]
pub enum SeedError {
    /// IO error reading the fixture file
    #[error("failed to read fixture file: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("failed to parse YAML: {0}")]
    Yaml(#[from] serde_norway::Error),

    /// A flash sale names a product key the fixture does not define
    #[error("flash sale references unknown product: {0}")]
    UnknownProduct(String),

    /// A flash sale's price could not be worked out
    #[error("invalid flash sale for {product}: {reason}")]
    InvalidFlashSale { product: String, reason: String },

    #[error(transparent)]
    Products(#[from] ProductsServiceError),

    #[error(transparent)]
    FlashSales(#[from] FlashSalesServiceError),
}

/// Products and flash sales to load into an empty ledger.
#[derive(Debug, Clone, Deserialize)]
pub struct SeedFixture {
    pub products: Vec<ProductFixture>,

    #[serde(default)]
    pub flash_sales: Vec<FlashSaleFixture>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProductFixture {
    /// Name flash sales use to refer to this product
    pub key: String,
    pub name: String,
    pub price_cents: u64,
    pub stock: u64,
}

/// A flash sale priced either absolutely or as a percentage off the product price.
#[derive(Debug, Clone, Deserialize)]
pub struct FlashSaleFixture {
    /// Key of the product the sale applies to
    pub product: String,

    pub sale_price_cents: Option<u64>,
    pub percent_off: Option<u64>,

    /// Window start, relative to the seeding instant
    #[serde(default)]
    pub starts_in_ms: i64,

    pub duration_ms: i64,
    pub max_units: Option<u64>,
}

impl FlashSaleFixture {
    fn resolve_price(&self, product: &ProductRecord) -> Result<u64, SeedError> {
        let invalid = |reason: &str| SeedError::InvalidFlashSale {
            product: self.product.clone(),
            reason: reason.to_string(),
        };

        match (self.sale_price_cents, self.percent_off) {
            (Some(price), None) => Ok(price),
            (None, Some(percent)) if percent < 100 => Ok(product
                .price_cents
                .saturating_mul(100 - percent)
                / 100),
            (None, Some(_)) => Err(invalid("percent_off must be below 100")),
            (Some(_), Some(_)) => Err(invalid("set only one of sale_price_cents and percent_off")),
            (None, None) => Err(invalid("one of sale_price_cents or percent_off is required")),
        }
    }

    fn terms(&self, product: &ProductRecord, now: Timestamp) -> Result<FlashSaleTerms, SeedError> {
        let starts_at = now
            .checked_add(SignedDuration::from_millis(self.starts_in_ms))
            .map_err(|e| SeedError::InvalidFlashSale {
                product: self.product.clone(),
                reason: e.to_string(),
            })?;

        let ends_at = starts_at
            .checked_add(SignedDuration::from_millis(self.duration_ms))
            .map_err(|e| SeedError::InvalidFlashSale {
                product: self.product.clone(),
                reason: e.to_string(),
            })?;

        Ok(FlashSaleTerms {
            sale_price_cents: self.resolve_price(product)?,
            starts_at,
            ends_at,
            max_units: self.max_units,
        })
    }
}

impl SeedFixture {
    /// Parse a fixture from YAML.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML does not describe a fixture.
    pub fn from_yaml(yaml: &str) -> Result<Self, SeedError> {
        Ok(serde_norway::from_str(yaml)?)
    }

    /// Load a fixture from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_path(path: &Path) -> Result<Self, SeedError> {
        let contents = fs::read_to_string(path)?;

        Self::from_yaml(&contents)
    }

    /// The built-in demo storefront.
    ///
    /// # Errors
    ///
    /// Returns an error if the bundled fixture fails to parse.
    pub fn storefront() -> Result<Self, SeedError> {
        Self::from_yaml(STOREFRONT_FIXTURE)
    }
}

/// What a seeding run did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub products: usize,
    pub flash_sales: usize,

    /// The ledger already held products, so nothing was written
    pub skipped: bool,
}

/// Load `fixture` into the ledger if it holds no products yet.
///
/// # Errors
///
/// Returns an error if a fixture entry is invalid or a write fails. Entries written
/// before the failure are kept.
#[tracing::instrument(name = "seed.seed_if_empty", skip_all, fields(at = %now), err)]
pub async fn seed_if_empty(
    products: &dyn ProductsService,
    flash_sales: &dyn FlashSalesService,
    fixture: &SeedFixture,
    now: Timestamp,
) -> Result<SeedReport, SeedError> {
    if products.count_products().await? > 0 {
        info!("ledger already holds products, skipping seed");

        return Ok(SeedReport {
            skipped: true,
            ..SeedReport::default()
        });
    }

    let mut created: FxHashMap<&str, ProductRecord> = FxHashMap::default();

    for product in &fixture.products {
        let record = products
            .create_product(NewProduct {
                name: product.name.clone(),
                price_cents: product.price_cents,
                stock: product.stock,
            })
            .await?;

        created.insert(product.key.as_str(), record);
    }

    for sale in &fixture.flash_sales {
        let product = created
            .get(sale.product.as_str())
            .ok_or_else(|| SeedError::UnknownProduct(sale.product.clone()))?;

        flash_sales
            .create_flash_sale(product.id, sale.terms(product, now)?)
            .await?;
    }

    let report = SeedReport {
        products: fixture.products.len(),
        flash_sales: fixture.flash_sales.len(),
        skipped: false,
    };

    info!(
        products = report.products,
        flash_sales = report.flash_sales,
        "ledger seeded"
    );

    Ok(report)
}
