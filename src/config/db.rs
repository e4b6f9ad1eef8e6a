//! Ledger database config

use std::time::Duration;

use clap::Args;

/// Ledger database settings.
#[derive(Debug, Clone, Args)]
pub struct LedgerConfig {
    /// SQLite connection string
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://flash-ledger.db")]
    pub database_url: String,

    /// Largest number of pooled database connections
    #[arg(long, env = "DATABASE_MAX_CONNECTIONS", default_value_t = 5_u32)]
    pub max_connections: u32,

    /// How long a writer waits on a locked database before giving up
    #[arg(long, env = "DATABASE_BUSY_TIMEOUT_MS", default_value_t = 5_000_u64)]
    pub busy_timeout_ms: u64,
}

impl LedgerConfig {
    #[must_use]
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}
