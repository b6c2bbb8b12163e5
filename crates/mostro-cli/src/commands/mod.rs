pub mod chat;
pub mod order;
pub mod session;
pub mod trade;

use std::io::Write;

use anyhow::Context;
use mostro_engine::{data_dir, Config, TradeEngine, TradeOutcome};

use crate::cli::MostroCli;

/// Build the engine from the selected config file and data directory.
pub fn build_engine(cli: &MostroCli) -> anyhow::Result<TradeEngine> {
    let data_dir = data_dir()?;
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| data_dir.join("settings.json"));
    let config = Config::load(&config_path)
        .with_context(|| format!("loading configuration from {}", config_path.display()))?;

    let engine = TradeEngine::new(config, &data_dir)?.with_privacy_mode(cli.privacy);
    Ok(engine)
}

/// One structured line per outcome; exactly what the user needs next.
pub fn print_outcome(outcome: &TradeOutcome) {
    match outcome {
        TradeOutcome::OrderConfirmed { order_id, order } => {
            println!("order confirmed: {order_id}");
            if let Some(kind) = order.kind {
                println!(
                    "  {} {} {} via {}",
                    kind.as_str(),
                    order.fiat_amount,
                    order.fiat_code,
                    order.payment_method
                );
            }
        }
        TradeOutcome::PayInvoice {
            order_id, invoice, ..
        } => {
            if let Some(order_id) = order_id {
                println!("order {order_id}: pay this hold invoice to continue");
            } else {
                println!("pay this hold invoice to continue:");
            }
            println!("{invoice}");
        }
        TradeOutcome::ProvideInvoice { order_id, .. } => match order_id {
            Some(order_id) => println!(
                "coordinator requests a Lightning invoice: run add-invoice --order-id {order_id}"
            ),
            None => println!("coordinator requests a Lightning invoice: run add-invoice"),
        },
        TradeOutcome::Acknowledged { action, order_id } => match order_id {
            Some(order_id) => println!("coordinator acknowledged {action} for order {order_id}"),
            None => println!("coordinator acknowledged {action}"),
        },
        TradeOutcome::DisputeOpened {
            order_id,
            dispute_id,
        } => {
            match (order_id, dispute_id) {
                (Some(order_id), Some(dispute_id)) => {
                    println!("dispute {dispute_id} opened for order {order_id}");
                }
                (None, Some(dispute_id)) => println!("dispute {dispute_id} opened"),
                (Some(order_id), None) => println!("dispute opened for order {order_id}"),
                (None, None) => println!("dispute opened"),
            }
            println!("a solver will contact both parties; keep your trade key available");
        }
        TradeOutcome::Rejected { reason } => {
            println!("coordinator rejected the action: {reason}");
        }
        TradeOutcome::NoResponse { action } => {
            println!("no response from coordinator for {action}; check again later");
        }
        TradeOutcome::Informational { action } => {
            println!("coordinator replied: {action}");
        }
    }
}

/// Ask for confirmation unless `--yes` or the config disables prompts.
pub fn confirm(engine: &TradeEngine, skip: bool, summary: &str) -> anyhow::Result<bool> {
    if skip || !engine.config().limits.require_confirmation {
        return Ok(true);
    }

    print!("{summary} — proceed? [y/N] ");
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}
