//! Catalog cache config

use clap::Args;
use jiff::SignedDuration;

/// Milliseconds a catalog read stays fresh unless configured otherwise.
pub const DEFAULT_CATALOG_TTL_MS: u64 = 2_000;

/// Catalog cache settings.
#[derive(Debug, Clone, Args)]
pub struct CacheConfig {
    /// How long a catalog read is served from cache, in milliseconds
    #[arg(long, env = "CATALOG_TTL_MS", default_value_t = DEFAULT_CATALOG_TTL_MS)]
    pub catalog_ttl_ms: u64,
}

impl CacheConfig {
    /// The configured TTL, saturating at the largest representable duration.
    #[must_use]
    pub fn ttl(&self) -> SignedDuration {
        i64::try_from(self.catalog_ttl_ms).map_or(SignedDuration::MAX, SignedDuration::from_millis)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            catalog_ttl_ms: DEFAULT_CATALOG_TTL_MS,
        }
    }
}
