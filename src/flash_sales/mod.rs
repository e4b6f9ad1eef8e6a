//! Flash sales

pub mod errors;
pub mod models;
pub mod service;

pub use errors::FlashSalesServiceError;
pub use models::FlashSaleUpdate;
pub use service::*;
