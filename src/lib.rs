//! Flash Ledger
//!
//! Inventory and flash-sale pricing engine. Checkout never oversells stock or a flash
//! sale's capacity, and every order is charged at the price in effect when it commits.

pub mod catalog;
pub mod checkout;
pub mod clock;
pub mod config;
pub mod context;
pub mod errors;
pub mod flash_sales;
pub mod ids;
pub mod ledger;
pub mod observability;
pub mod pricing;
pub mod products;
pub mod report;
pub mod seed;

#[cfg(test)]
mod test;
