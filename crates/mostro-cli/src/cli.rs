use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "mostro-cli")]
#[command(about = "Peer-to-peer Lightning trading over the Mostro protocol")]
pub struct MostroCli {
    /// Path to the configuration file (default: <data dir>/settings.json).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Sign seals with the trade key instead of the identity key.
    #[arg(long, global = true)]
    pub privacy: bool,

    /// Skip interactive confirmation prompts.
    #[arg(long, global = true)]
    pub yes: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Publish a new buy or sell order.
    NewOrder(NewOrderArgs),
    /// Take an order from the book.
    Take(TakeArgs),
    /// List public orders.
    ListOrders(ListOrdersArgs),
    /// Show one order's current state.
    OrderStatus(OrderRefArgs),
    /// Cancel an order.
    Cancel(OrderRefArgs),
    /// Mark the fiat payment as sent.
    FiatSent(OrderRefArgs),
    /// Release the escrowed sats to the buyer.
    Release(OrderRefArgs),
    /// Open a dispute.
    Dispute(OrderRefArgs),
    /// Rate the counterparty.
    Rate(RateArgs),
    /// Supply the Lightning invoice the coordinator asked for.
    AddInvoice(AddInvoiceArgs),
    /// Send an encrypted chat line to the trade counterparty.
    ChatSend(ChatSendArgs),
    /// Fetch the encrypted chat history for a trade.
    ChatFetch(ChatFetchArgs),
    /// Recover session state from the coordinator.
    Restore,
    /// Show identity key material.
    Keys(KeysArgs),
}

#[derive(Args)]
pub struct NewOrderArgs {
    /// buy or sell.
    #[arg(long)]
    pub kind: String,

    /// ISO-4217 fiat currency code.
    #[arg(long)]
    pub fiat_code: String,

    /// Fiat amount (0 when using a range).
    #[arg(long)]
    pub fiat_amount: i64,

    /// Lower bound for a range order.
    #[arg(long)]
    pub min_amount: Option<i64>,

    /// Upper bound for a range order.
    #[arg(long)]
    pub max_amount: Option<i64>,

    /// Fixed amount in satoshis (0 = market-priced at match).
    #[arg(long, default_value_t = 0)]
    pub amount: i64,

    /// Payment method description.
    #[arg(long)]
    pub payment_method: String,

    /// Premium over market price, signed percent.
    #[arg(long, default_value_t = 0)]
    pub premium: i64,

    /// Lightning invoice or address for buy orders.
    #[arg(long)]
    pub invoice: Option<String>,
}

#[derive(Args)]
pub struct TakeArgs {
    #[arg(long)]
    pub order_id: Uuid,

    /// Fiat amount picked for range orders.
    #[arg(long)]
    pub amount: Option<i64>,

    /// Lightning invoice or address (buyers taking a sell order).
    #[arg(long)]
    pub invoice: Option<String>,
}

#[derive(Args)]
pub struct ListOrdersArgs {
    /// Filter by status (default: pending).
    #[arg(long, default_value = "pending")]
    pub status: String,

    /// Filter by order kind (buy or sell).
    #[arg(long)]
    pub kind: Option<String>,

    /// Filter by fiat currency code.
    #[arg(long)]
    pub currency: Option<String>,
}

#[derive(Args)]
pub struct OrderRefArgs {
    #[arg(long)]
    pub order_id: Uuid,
}

#[derive(Args)]
pub struct RateArgs {
    #[arg(long)]
    pub order_id: Uuid,

    /// 1 (worst) to 5 (best).
    #[arg(long)]
    pub stars: u8,
}

#[derive(Args)]
pub struct AddInvoiceArgs {
    #[arg(long)]
    pub order_id: Uuid,

    #[arg(long)]
    pub invoice: String,
}

#[derive(Args)]
pub struct ChatSendArgs {
    #[arg(long)]
    pub order_id: Uuid,

    /// Counterparty trade pubkey (hex).
    #[arg(long)]
    pub counterparty: String,

    /// Message text.
    pub text: String,
}

#[derive(Args)]
pub struct ChatFetchArgs {
    #[arg(long)]
    pub order_id: Uuid,

    /// Counterparty trade pubkey (hex).
    #[arg(long)]
    pub counterparty: String,
}

#[derive(Args)]
pub struct KeysArgs {
    /// Print the mnemonic seed phrase. Handle with care.
    #[arg(long)]
    pub reveal_mnemonic: bool,
}
