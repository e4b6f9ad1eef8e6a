//! Configuration
//!
//! Settings groups shared by every command of the operator CLI. Each group is a
//! `clap` [`Args`](clap::Args) struct readable from flags or the environment.

pub mod cache;
pub mod db;
pub mod observability;

pub use cache::CacheConfig;
pub use db::LedgerConfig;
pub use observability::{LogFormat, LoggingConfig};
