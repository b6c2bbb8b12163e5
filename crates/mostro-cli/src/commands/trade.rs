use mostro_engine::TradeEngine;

use crate::cli::{AddInvoiceArgs, OrderRefArgs, RateArgs};
use crate::commands::print_outcome;

pub async fn cancel(engine: &mut TradeEngine, args: OrderRefArgs) -> anyhow::Result<()> {
    let outcome = engine.cancel(args.order_id).await?;
    print_outcome(&outcome);
    Ok(())
}

pub async fn fiat_sent(engine: &mut TradeEngine, args: OrderRefArgs) -> anyhow::Result<()> {
    let outcome = engine.fiat_sent(args.order_id).await?;
    print_outcome(&outcome);
    Ok(())
}

pub async fn release(engine: &mut TradeEngine, args: OrderRefArgs) -> anyhow::Result<()> {
    let outcome = engine.release(args.order_id).await?;
    print_outcome(&outcome);
    Ok(())
}

pub async fn dispute(engine: &mut TradeEngine, args: OrderRefArgs) -> anyhow::Result<()> {
    let outcome = engine.dispute(args.order_id).await?;
    print_outcome(&outcome);
    Ok(())
}

pub async fn rate(engine: &mut TradeEngine, args: RateArgs) -> anyhow::Result<()> {
    let outcome = engine.rate(args.order_id, args.stars).await?;
    print_outcome(&outcome);
    Ok(())
}

pub async fn add_invoice(engine: &mut TradeEngine, args: AddInvoiceArgs) -> anyhow::Result<()> {
    let outcome = engine.add_invoice(args.order_id, args.invoice).await?;
    print_outcome(&outcome);
    Ok(())
}
