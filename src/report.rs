//! Catalog report
//!
//! Renders a catalog snapshot as a table for operators.

use std::io;

use jiff::Timestamp;
use rusty_money::{Money, iso};
use tabled::{
    builder::Builder,
    settings::{Alignment, Style, object::Columns},
};
use thiserror::Error;

use crate::ledger::CatalogEntry;

#[derive(Debug, Error)]
pub enum ReportError {
    /// An amount does not fit the money type.
    #[error("amount of {0} cents is too large to display")]
    AmountTooLarge(u64),

    #[error("failed to write report")]
    Io(#[from] io::Error),
}

/// Format minor units as dollars.
///
/// # Errors
///
/// Returns an error if `cents` exceeds `i64::MAX`.
pub fn format_cents(cents: u64) -> Result<String, ReportError> {
    let minor = i64::try_from(cents).map_err(|_err| ReportError::AmountTooLarge(cents))?;

    Ok(Money::from_minor(minor, iso::USD).to_string())
}

/// Write the catalog as a table, one row per product.
///
/// # Errors
///
/// Returns an error if an amount cannot be formatted or `out` cannot be written.
pub fn write_catalog(
    mut out: impl io::Write,
    entries: &[CatalogEntry],
    at: Timestamp,
) -> Result<(), ReportError> {
    let mut builder = Builder::default();

    builder.push_record([
        "ID",
        "Product",
        "Stock",
        "Price",
        "Sale Price",
        "Sale Ends",
        "Sale Units Left",
    ]);

    for entry in entries {
        let sale = entry.active_flash_sale.as_ref();

        let sale_price = sale
            .map(|sale| format_cents(sale.sale_price_cents))
            .transpose()?
            .unwrap_or_default();

        let units_left = sale
            .map(|sale| {
                sale.remaining_units()
                    .map_or_else(|| "unlimited".to_string(), |left| left.to_string())
            })
            .unwrap_or_default();

        builder.push_record([
            entry.product.id.to_string(),
            entry.product.name.clone(),
            entry.product.stock.to_string(),
            format_cents(entry.product.price_cents)?,
            sale_price,
            sale.map(|sale| sale.ends_at.to_string()).unwrap_or_default(),
            units_left,
        ]);
    }

    let mut table = builder.build();

    table.with(Style::modern_rounded());
    table.modify(Columns::new(2..5), Alignment::right());

    writeln!(out, "Catalog at {at}")?;
    writeln!(out, "{table}")?;

    Ok(())
}
