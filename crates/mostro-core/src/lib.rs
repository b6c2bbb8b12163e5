//! Protocol and cryptographic substrate for the Mostro P2P trading client.
//!
//! This crate intentionally has no network surface:
//! - HD key hierarchy (identity + per-trade keys from one mnemonic)
//! - authenticated encryption, Schnorr, event model
//! - gift-wrap and peer-chat envelopes
//! - protocol message schema and order-book parsing

pub mod chat;
pub mod crypto;
pub mod event;
pub mod giftwrap;
pub mod keys;
pub mod message;
pub mod order;

pub use chat::{ChatError, ChatMessage};
pub use event::{Event, EventError, UnsignedEvent};
pub use giftwrap::{UnwrappedGift, WrapError, MIN_FETCH_WINDOW_SECS};
pub use keys::{KeyError, KeyRing, Keypair};
pub use message::{Action, Message, MessageError, Payload, SmallOrder};
pub use order::{OrderBookEntry, OrderError, OrderFilter, OrderKind, Status};
