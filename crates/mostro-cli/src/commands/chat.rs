use mostro_engine::TradeEngine;

use crate::cli::{ChatFetchArgs, ChatSendArgs};

pub async fn send(engine: &mut TradeEngine, args: ChatSendArgs) -> anyhow::Result<()> {
    engine
        .send_chat(args.order_id, &args.counterparty, &args.text)
        .await?;
    println!("sent");
    Ok(())
}

pub async fn fetch(engine: &TradeEngine, args: ChatFetchArgs) -> anyhow::Result<()> {
    let messages = engine
        .fetch_chat(args.order_id, &args.counterparty)
        .await?;
    if messages.is_empty() {
        println!("no messages");
        return Ok(());
    }

    let own_pubkey = engine.trade_pubkey_for(&args.order_id)?;
    for message in messages {
        let who = if message.author_pubkey == own_pubkey {
            "you"
        } else {
            "peer"
        };
        println!("[{}] {}: {}", message.created_at, who, message.text);
    }
    Ok(())
}
