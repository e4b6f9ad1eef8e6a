use std::path::PathBuf;

use clap::Args;
use flash_ledger::{
    context::AppContext,
    seed::{self, SeedFixture},
};

#[derive(Debug, Args)]
pub(crate) struct SeedArgs {
    /// YAML fixture to load; the built-in storefront when omitted
    #[arg(long)]
    fixture: Option<PathBuf>,
}

pub(crate) async fn run(ctx: &AppContext, args: SeedArgs) -> Result<(), String> {
    let fixture = match args.fixture {
        Some(path) => SeedFixture::from_path(&path),
        None => SeedFixture::storefront(),
    }
    .map_err(|error| format!("failed to load fixture: {error}"))?;

    let report = seed::seed_if_empty(
        ctx.products.as_ref(),
        ctx.flash_sales.as_ref(),
        &fixture,
        ctx.clock.now(),
    )
    .await
    .map_err(|error| format!("failed to seed ledger: {error}"))?;

    if report.skipped {
        println!("ledger already holds products; nothing seeded");
    } else {
        println!("products: {}", report.products);
        println!("flash_sales: {}", report.flash_sales);
    }

    Ok(())
}
