use clap::{Args, Subcommand};
use flash_ledger::{
    context::AppContext,
    ledger::{NewProduct, ProductId},
    report::format_cents,
};

#[derive(Debug, Args)]
pub(crate) struct ProductCommand {
    #[command(subcommand)]
    command: ProductSubcommand,
}

#[derive(Debug, Subcommand)]
enum ProductSubcommand {
    Create(CreateProductArgs),
    Get(ProductArgs),
    Delete(ProductArgs),
    Quote(QuoteArgs),
}

#[derive(Debug, Args)]
struct CreateProductArgs {
    /// Product display name
    #[arg(long)]
    name: String,

    /// Base price in cents
    #[arg(long)]
    price_cents: u64,

    /// Units in stock
    #[arg(long, default_value_t = 0)]
    stock: u64,
}

#[derive(Debug, Args)]
struct ProductArgs {
    /// Product id
    #[arg(long)]
    id: ProductId,
}

#[derive(Debug, Args)]
struct QuoteArgs {
    /// Product id
    #[arg(long)]
    id: ProductId,

    /// Instant to price at (RFC 3339); now when omitted
    #[arg(long)]
    at: Option<String>,
}

pub(crate) async fn run(ctx: &AppContext, command: ProductCommand) -> Result<(), String> {
    match command.command {
        ProductSubcommand::Create(args) => create(ctx, args).await,
        ProductSubcommand::Get(args) => get(ctx, args).await,
        ProductSubcommand::Delete(args) => delete(ctx, args).await,
        ProductSubcommand::Quote(args) => quote(ctx, args).await,
    }
}

async fn create(ctx: &AppContext, args: CreateProductArgs) -> Result<(), String> {
    let product = ctx
        .products
        .create_product(NewProduct {
            name: args.name,
            price_cents: args.price_cents,
            stock: args.stock,
        })
        .await
        .map_err(|error| format!("failed to create product: {error}"))?;

    println!("product_id: {}", product.id);
    println!("name: {}", product.name);

    Ok(())
}

async fn get(ctx: &AppContext, args: ProductArgs) -> Result<(), String> {
    let product = ctx
        .products
        .get_product(args.id)
        .await
        .map_err(|error| format!("failed to get product: {error}"))?;

    let json = serde_json::to_string_pretty(&product)
        .map_err(|error| format!("failed to encode product: {error}"))?;

    println!("{json}");

    Ok(())
}

async fn delete(ctx: &AppContext, args: ProductArgs) -> Result<(), String> {
    ctx.products
        .delete_product(args.id)
        .await
        .map_err(|error| format!("failed to delete product: {error}"))?;

    println!("deleted product {}", args.id);

    Ok(())
}

async fn quote(ctx: &AppContext, args: QuoteArgs) -> Result<(), String> {
    let at = super::parse_at(ctx, args.at.as_deref(), "at")?;

    let quote = ctx
        .products
        .quote(args.id, at)
        .await
        .map_err(|error| format!("failed to quote product: {error}"))?;

    let price = format_cents(quote.unit_price_cents).map_err(|error| error.to_string())?;
    let savings = format_cents(quote.savings_cents()).map_err(|error| error.to_string())?;

    println!("product_id: {}", quote.product_id);
    println!("unit_price: {price}");
    println!("savings: {savings}");
    println!("flash_sale: {}", quote.is_flash_sale());

    Ok(())
}
