use mostro_engine::TradeEngine;

use crate::cli::KeysArgs;

pub async fn restore(engine: &mut TradeEngine) -> anyhow::Result<()> {
    let data = engine.restore_session().await?;

    println!(
        "restored session: next trade index is {}",
        engine.state().next_trade_index
    );
    if data.orders.is_empty() && data.disputes.is_empty() {
        println!("no active orders or disputes under this key");
        return Ok(());
    }

    for order in &data.orders {
        println!(
            "order {} | trade index {} | {}",
            order.id, order.trade_index, order.status
        );
    }
    for dispute in &data.disputes {
        match dispute.order_id {
            Some(order_id) => println!(
                "dispute {} | order {} | {}",
                dispute.dispute_id, order_id, dispute.status
            ),
            None => println!("dispute {} | {}", dispute.dispute_id, dispute.status),
        }
    }
    Ok(())
}

pub fn keys(engine: &TradeEngine, args: KeysArgs) -> anyhow::Result<()> {
    let identity = engine.keys().identity_keypair()?;
    println!("identity pubkey: {}", identity.public_hex());
    println!("identity npub:   {}", identity.npub()?);
    println!("next trade index: {}", engine.state().next_trade_index);

    if args.reveal_mnemonic {
        println!();
        println!("seed phrase (anyone with these words controls your reputation and trades):");
        println!("{}", engine.keys().mnemonic());
    }
    Ok(())
}
