use std::str::FromStr;

use anyhow::bail;
use mostro_core::order::{OrderFilter, OrderKind, Status};
use mostro_engine::{NewOrderParams, TradeEngine};

use crate::cli::{ListOrdersArgs, NewOrderArgs, OrderRefArgs, TakeArgs};
use crate::commands::{confirm, print_outcome};

pub async fn new_order(
    engine: &mut TradeEngine,
    args: NewOrderArgs,
    yes: bool,
) -> anyhow::Result<()> {
    let kind = OrderKind::from_str(&args.kind)?;

    if let (Some(min), Some(max)) = (args.min_amount, args.max_amount) {
        if min > max {
            bail!("min_amount {min} must not exceed max_amount {max}");
        }
        if args.fiat_amount != 0 {
            bail!("range orders must set fiat_amount to 0");
        }
    }

    let summary = format!(
        "create {} order for {} {} ({})",
        kind.as_str(),
        args.fiat_amount,
        args.fiat_code.to_uppercase(),
        args.payment_method
    );
    if !confirm(engine, yes, &summary)? {
        println!("aborted");
        return Ok(());
    }

    let outcome = engine
        .submit_order(NewOrderParams {
            kind,
            fiat_code: args.fiat_code,
            fiat_amount: args.fiat_amount,
            min_amount: args.min_amount,
            max_amount: args.max_amount,
            amount_sats: args.amount,
            payment_method: args.payment_method,
            premium: args.premium,
            buyer_invoice: args.invoice,
        })
        .await?;
    print_outcome(&outcome);
    Ok(())
}

pub async fn take(engine: &mut TradeEngine, args: TakeArgs, yes: bool) -> anyhow::Result<()> {
    let summary = match args.amount {
        Some(amount) => format!("take order {} for {amount}", args.order_id),
        None => format!("take order {}", args.order_id),
    };
    if !confirm(engine, yes, &summary)? {
        println!("aborted");
        return Ok(());
    }

    let outcome = engine
        .take_order(args.order_id, args.amount, args.invoice)
        .await?;
    print_outcome(&outcome);
    Ok(())
}

pub async fn list(engine: &TradeEngine, args: ListOrdersArgs) -> anyhow::Result<()> {
    let filter = OrderFilter {
        status: Some(Status::from_str(&args.status)?),
        kind: args.kind.as_deref().map(OrderKind::from_str).transpose()?,
        currency: args.currency,
    };

    let entries = engine.list_orders(filter).await?;
    if entries.is_empty() {
        println!("no matching orders");
        return Ok(());
    }

    for entry in entries {
        let premium = if entry.premium != 0 {
            format!(" {:+}%", entry.premium)
        } else {
            String::new()
        };
        println!(
            "{} | {} {} {}{} | {} | {}",
            entry.id,
            entry.kind.as_str(),
            entry.fiat_amount,
            entry.currency,
            premium,
            entry.payment_methods.join(", "),
            entry.status.as_str(),
        );
    }
    Ok(())
}

pub async fn status(engine: &TradeEngine, args: OrderRefArgs) -> anyhow::Result<()> {
    let entry = engine.order_status(&args.order_id).await?;
    println!("order {}", entry.id);
    println!("  kind:            {}", entry.kind.as_str());
    println!("  status:          {}", entry.status.as_str());
    println!("  fiat:            {} {}", entry.fiat_amount, entry.currency);
    println!("  sats:            {}", entry.amount_sats);
    println!("  premium:         {}%", entry.premium);
    println!("  payment methods: {}", entry.payment_methods.join(", "));
    if let Some(expires_at) = entry.expires_at {
        println!("  expires at:      {expires_at}");
    }
    Ok(())
}
