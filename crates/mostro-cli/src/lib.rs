use clap::Parser;

pub mod cli;
mod commands;

use cli::{Commands, MostroCli};

pub async fn run() -> anyhow::Result<()> {
    let cli = MostroCli::parse();
    let mut engine = commands::build_engine(&cli)?;

    match cli.command {
        Commands::NewOrder(args) => commands::order::new_order(&mut engine, args, cli.yes).await,
        Commands::Take(args) => commands::order::take(&mut engine, args, cli.yes).await,
        Commands::ListOrders(args) => commands::order::list(&engine, args).await,
        Commands::OrderStatus(args) => commands::order::status(&engine, args).await,
        Commands::Cancel(args) => commands::trade::cancel(&mut engine, args).await,
        Commands::FiatSent(args) => commands::trade::fiat_sent(&mut engine, args).await,
        Commands::Release(args) => commands::trade::release(&mut engine, args).await,
        Commands::Dispute(args) => commands::trade::dispute(&mut engine, args).await,
        Commands::Rate(args) => commands::trade::rate(&mut engine, args).await,
        Commands::AddInvoice(args) => commands::trade::add_invoice(&mut engine, args).await,
        Commands::ChatSend(args) => commands::chat::send(&mut engine, args).await,
        Commands::ChatFetch(args) => commands::chat::fetch(&engine, args).await,
        Commands::Restore => commands::session::restore(&mut engine).await,
        Commands::Keys(args) => commands::session::keys(&engine, args),
    }
}
