use clap::{Args, Subcommand};
use flash_ledger::{
    context::AppContext,
    flash_sales::FlashSaleUpdate,
    ledger::{FlashSaleId, FlashSaleTerms, ProductId},
};
use serde::Serialize;

#[derive(Debug, Args)]
pub(crate) struct FlashSaleCommand {
    #[command(subcommand)]
    command: FlashSaleSubcommand,
}

#[derive(Debug, Subcommand)]
enum FlashSaleSubcommand {
    Create(CreateFlashSaleArgs),
    Update(UpdateFlashSaleArgs),
    Delete(FlashSaleArgs),
    Get(FlashSaleArgs),
    List,
}

#[derive(Debug, Args)]
struct CreateFlashSaleArgs {
    /// Product the sale discounts
    #[arg(long)]
    product: ProductId,

    /// Sale price in cents, below the product price
    #[arg(long)]
    sale_price_cents: u64,

    /// Window start (RFC 3339); now when omitted
    #[arg(long)]
    starts_at: Option<String>,

    /// Window end (RFC 3339), exclusive
    #[arg(long)]
    ends_at: String,

    /// Units available at the sale price; unlimited when omitted
    #[arg(long)]
    max_units: Option<u64>,
}

#[derive(Debug, Args)]
struct UpdateFlashSaleArgs {
    /// Flash sale id
    #[arg(long)]
    id: FlashSaleId,

    #[arg(long)]
    sale_price_cents: Option<u64>,

    #[arg(long)]
    starts_at: Option<String>,

    #[arg(long)]
    ends_at: Option<String>,

    #[arg(long)]
    max_units: Option<u64>,
}

#[derive(Debug, Args)]
struct FlashSaleArgs {
    /// Flash sale id
    #[arg(long)]
    id: FlashSaleId,
}

pub(crate) async fn run(ctx: &AppContext, command: FlashSaleCommand) -> Result<(), String> {
    match command.command {
        FlashSaleSubcommand::Create(args) => create(ctx, args).await,
        FlashSaleSubcommand::Update(args) => update(ctx, args).await,
        FlashSaleSubcommand::Delete(args) => delete(ctx, args).await,
        FlashSaleSubcommand::Get(args) => get(ctx, args).await,
        FlashSaleSubcommand::List => list(ctx).await,
    }
}

async fn create(ctx: &AppContext, args: CreateFlashSaleArgs) -> Result<(), String> {
    let terms = FlashSaleTerms {
        sale_price_cents: args.sale_price_cents,
        starts_at: super::parse_at(ctx, args.starts_at.as_deref(), "starts-at")?,
        ends_at: super::parse_timestamp(&args.ends_at, "ends-at")?,
        max_units: args.max_units,
    };

    let sale = ctx
        .flash_sales
        .create_flash_sale(args.product, terms)
        .await
        .map_err(|error| format!("failed to create flash sale: {error}"))?;

    print_json(&sale)
}

async fn update(ctx: &AppContext, args: UpdateFlashSaleArgs) -> Result<(), String> {
    let update = FlashSaleUpdate {
        sale_price_cents: args.sale_price_cents,
        starts_at: args
            .starts_at
            .as_deref()
            .map(|value| super::parse_timestamp(value, "starts-at"))
            .transpose()?,
        ends_at: args
            .ends_at
            .as_deref()
            .map(|value| super::parse_timestamp(value, "ends-at"))
            .transpose()?,
        max_units: args.max_units,
    };

    let sale = ctx
        .flash_sales
        .update_flash_sale(args.id, update)
        .await
        .map_err(|error| format!("failed to update flash sale: {error}"))?;

    print_json(&sale)
}

async fn delete(ctx: &AppContext, args: FlashSaleArgs) -> Result<(), String> {
    ctx.flash_sales
        .delete_flash_sale(args.id)
        .await
        .map_err(|error| format!("failed to delete flash sale: {error}"))?;

    println!("deleted flash sale {}", args.id);

    Ok(())
}

async fn get(ctx: &AppContext, args: FlashSaleArgs) -> Result<(), String> {
    let sale = ctx
        .flash_sales
        .get_flash_sale(args.id)
        .await
        .map_err(|error| format!("failed to get flash sale: {error}"))?;

    print_json(&sale)
}

async fn list(ctx: &AppContext) -> Result<(), String> {
    let sales = ctx
        .flash_sales
        .list_flash_sales()
        .await
        .map_err(|error| format!("failed to list flash sales: {error}"))?;

    print_json(&sales)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), String> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|error| format!("failed to encode output: {error}"))?;

    println!("{json}");

    Ok(())
}
