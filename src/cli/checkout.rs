use clap::Args;
use flash_ledger::{context::AppContext, ledger::ProductId, report::format_cents};

#[derive(Debug, Args)]
pub(crate) struct CheckoutArgs {
    /// Product to buy
    #[arg(long)]
    product: ProductId,

    /// Units to buy
    #[arg(long)]
    quantity: u64,

    /// Instant the order is placed at (RFC 3339); now when omitted
    #[arg(long)]
    at: Option<String>,
}

pub(crate) async fn run(ctx: &AppContext, args: CheckoutArgs) -> Result<(), String> {
    let at = super::parse_at(ctx, args.at.as_deref(), "at")?;

    let receipt = ctx
        .checkout
        .checkout(args.product, args.quantity, at)
        .await
        .map_err(|error| format!("checkout failed ({}): {error}", error.kind()))?;

    let unit_price = format_cents(receipt.unit_price_cents).map_err(|error| error.to_string())?;
    let total = format_cents(receipt.total_price_cents).map_err(|error| error.to_string())?;

    println!("product_id: {}", receipt.product_id);
    println!("quantity: {}", receipt.quantity);
    println!("unit_price: {unit_price}");
    println!("total: {total}");

    match receipt.flash_sale_id {
        Some(id) => println!("flash_sale_id: {id}"),
        None => println!("flash_sale_id: none"),
    }

    Ok(())
}
