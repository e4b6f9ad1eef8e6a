//! Pricing
//!
//! Resolves what a unit of a product costs at a given instant. A product is priced at
//! its base price unless a flash sale is active; when several are active at once the
//! most recently created one (highest id) wins.

use jiff::Timestamp;
use serde::Serialize;

use crate::ledger::{FlashSaleId, FlashSaleRecord, ProductId, ProductRecord};

/// Pick the flash sale that prices a product at `at` from that product's sales.
pub fn active_flash_sale<'a, I>(flash_sales: I, at: Timestamp) -> Option<&'a FlashSaleRecord>
where
    I: IntoIterator<Item = &'a FlashSaleRecord>,
{
    flash_sales
        .into_iter()
        .filter(|sale| sale.is_active_at(at))
        .max_by_key(|sale| sale.id)
}

/// Where a quoted unit price came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PriceSource {
    /// The product's own price.
    Base,

    /// A flash sale's discounted price.
    FlashSale {
        /// The sale that applies
        id: FlashSaleId,
    },
}

/// The effective unit price of a product at an instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PriceQuote {
    pub product_id: ProductId,
    pub unit_price_cents: u64,
    pub base_price_cents: u64,
    pub source: PriceSource,
}

impl PriceQuote {
    /// Discount per unit against the base price.
    pub fn savings_cents(&self) -> u64 {
        self.base_price_cents.saturating_sub(self.unit_price_cents)
    }

    /// Whether a flash sale sets the price.
    pub fn is_flash_sale(&self) -> bool {
        matches!(self.source, PriceSource::FlashSale { .. })
    }
}

/// Quote `product` at `at`, given all of its flash sales.
pub fn resolve_unit_price<'a, I>(product: &ProductRecord, flash_sales: I, at: Timestamp) -> PriceQuote
where
    I: IntoIterator<Item = &'a FlashSaleRecord>,
{
    let (unit_price_cents, source) = match active_flash_sale(flash_sales, at) {
        Some(sale) => (sale.sale_price_cents, PriceSource::FlashSale { id: sale.id }),
        None => (product.price_cents, PriceSource::Base),
    };

    PriceQuote {
        product_id: product.id,
        unit_price_cents,
        base_price_cents: product.price_cents,
        source,
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    const T: i64 = 1_700_000_000_000;

    fn at(offset_ms: i64) -> TestResult<Timestamp> {
        Ok(Timestamp::from_millisecond(T + offset_ms)?)
    }

    fn product() -> ProductRecord {
        ProductRecord {
            id: ProductId::from_i64(1),
            name: "Headphones".to_string(),
            price_cents: 10_000,
            stock: 10,
        }
    }

    fn sale(
        id: i64,
        price: u64,
        window: (i64, i64),
        max_units: Option<u64>,
        sold_units: u64,
    ) -> TestResult<FlashSaleRecord> {
        Ok(FlashSaleRecord {
            id: FlashSaleId::from_i64(id),
            product_id: ProductId::from_i64(1),
            sale_price_cents: price,
            starts_at: at(window.0)?,
            ends_at: at(window.1)?,
            max_units,
            sold_units,
        })
    }

    #[test]
    fn base_price_without_flash_sales() -> TestResult {
        let quote = resolve_unit_price(&product(), std::iter::empty(), at(0)?);

        assert_eq!(quote.unit_price_cents, 10_000);
        assert_eq!(quote.source, PriceSource::Base);
        assert_eq!(quote.savings_cents(), 0);

        Ok(())
    }

    #[test]
    fn sale_price_inside_window_only() -> TestResult {
        let sales = [sale(1, 5_000, (0, 1_000), None, 0)?];

        let before = resolve_unit_price(&product(), &sales, at(-1)?);
        let start = resolve_unit_price(&product(), &sales, at(0)?);
        let last = resolve_unit_price(&product(), &sales, at(999)?);
        let end = resolve_unit_price(&product(), &sales, at(1_000)?);

        assert_eq!(before.unit_price_cents, 10_000);
        assert_eq!(start.unit_price_cents, 5_000);
        assert_eq!(last.unit_price_cents, 5_000);
        assert_eq!(end.unit_price_cents, 10_000);
        assert_eq!(start.savings_cents(), 5_000);

        Ok(())
    }

    #[test]
    fn exhausted_sale_falls_back_to_base_price() -> TestResult {
        let sales = [sale(1, 5_000, (0, 1_000), Some(3), 3)?];

        let quote = resolve_unit_price(&product(), &sales, at(10)?);

        assert_eq!(quote.source, PriceSource::Base);

        Ok(())
    }

    #[test]
    fn highest_id_wins_among_overlapping_sales() -> TestResult {
        let sales = [
            sale(7, 6_000, (0, 1_000), None, 0)?,
            sale(9, 8_000, (-500, 2_000), None, 0)?,
            sale(3, 1_000, (0, 1_000), None, 0)?,
        ];

        let quote = resolve_unit_price(&product(), &sales, at(10)?);

        assert_eq!(
            quote.source,
            PriceSource::FlashSale {
                id: FlashSaleId::from_i64(9)
            }
        );
        assert_eq!(quote.unit_price_cents, 8_000);

        Ok(())
    }

    #[test]
    fn exhausted_newer_sale_yields_to_older_active_sale() -> TestResult {
        let sales = [
            sale(2, 6_000, (0, 1_000), None, 0)?,
            sale(5, 4_000, (0, 1_000), Some(1), 1)?,
        ];

        let active = active_flash_sale(&sales, at(10)?).map(|sale| sale.id);

        assert_eq!(active, Some(FlashSaleId::from_i64(2)));

        Ok(())
    }
}
