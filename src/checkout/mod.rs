//! Checkout

pub mod errors;
pub mod models;
pub mod service;

pub use errors::CheckoutError;
pub use models::CheckoutReceipt;
pub use service::*;
