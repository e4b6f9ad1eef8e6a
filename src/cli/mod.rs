use clap::{Parser, Subcommand};
use flash_ledger::{
    config::{CacheConfig, LedgerConfig, LoggingConfig},
    context::AppContext,
    observability,
};
use jiff::Timestamp;

mod catalog;
mod checkout;
mod flash_sale;
mod migrate;
mod product;
mod seed;

#[derive(Debug, Parser)]
#[command(name = "flash-ledger", about = "Flash Ledger CLI", long_about = None)]
pub(crate) struct Cli {
    /// Logging output settings.
    #[command(flatten)]
    logging: LoggingConfig,

    /// Ledger database settings.
    #[command(flatten)]
    ledger: LedgerConfig,

    /// Catalog cache settings.
    #[command(flatten)]
    cache: CacheConfig,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Create or upgrade the ledger schema
    Migrate,

    #[command(flatten)]
    Ledger(LedgerCommand),
}

/// Commands that work against a migrated ledger.
#[derive(Debug, Subcommand)]
enum LedgerCommand {
    /// Load a fixture into an empty ledger
    Seed(seed::SeedArgs),
    /// Show every product with its active flash sale
    Catalog(catalog::CatalogArgs),
    /// Sell units of a product
    Checkout(checkout::CheckoutArgs),
    Product(product::ProductCommand),
    FlashSale(flash_sale::FlashSaleCommand),
}

impl Cli {
    pub(crate) async fn run(self) -> Result<(), String> {
        observability::init(&self.logging)
            .map_err(|error| format!("failed to initialise logging: {error}"))?;

        match self.command {
            Commands::Migrate => migrate::run(&self.ledger).await,
            Commands::Ledger(command) => {
                let ctx = AppContext::from_config(&self.ledger, &self.cache)
                    .await
                    .map_err(|error| format!("failed to open ledger: {error}"))?;

                command.run(&ctx).await
            }
        }
    }
}

impl LedgerCommand {
    async fn run(self, ctx: &AppContext) -> Result<(), String> {
        match self {
            Self::Seed(args) => seed::run(ctx, args).await,
            Self::Catalog(args) => catalog::run(ctx, args).await,
            Self::Checkout(args) => checkout::run(ctx, args).await,
            Self::Product(command) => product::run(ctx, command).await,
            Self::FlashSale(command) => flash_sale::run(ctx, command).await,
        }
    }
}

/// Parse an optional RFC 3339 instant, defaulting to the context clock.
fn parse_at(ctx: &AppContext, raw: Option<&str>, flag: &str) -> Result<Timestamp, String> {
    raw.map_or_else(
        || Ok(ctx.clock.now()),
        |value| parse_timestamp(value, flag),
    )
}

fn parse_timestamp(value: &str, flag: &str) -> Result<Timestamp, String> {
    value
        .parse::<Timestamp>()
        .map_err(|error| format!("invalid {flag} timestamp: {error}"))
}
