use std::io;

use clap::Args;
use flash_ledger::{context::AppContext, report};

#[derive(Debug, Args)]
pub(crate) struct CatalogArgs {
    /// Instant to price the catalog at (RFC 3339); now when omitted
    #[arg(long)]
    at: Option<String>,
}

pub(crate) async fn run(ctx: &AppContext, args: CatalogArgs) -> Result<(), String> {
    let at = super::parse_at(ctx, args.at.as_deref(), "at")?;

    let entries = ctx
        .catalog
        .get(at)
        .await
        .map_err(|error| format!("failed to read catalog: {error}"))?;

    report::write_catalog(io::stdout().lock(), &entries, at)
        .map_err(|error| format!("failed to print catalog: {error}"))
}
