//! Direct peer-to-peer trade chat.
//!
//! Two layers, not three. The inner event is signed by the sender's trade
//! key so either party can later prove authorship to a dispute solver;
//! the outer wrap is encrypted to and tagged with the ECDH shared pubkey,
//! so neither relays nor the coordinator can link the conversation to
//! either trade key.

use thiserror::Error;

use crate::crypto::{self, CryptoError};
use crate::event::{p_tag, unix_now, Event, EventError, UnsignedEvent, GIFT_WRAP_KIND, TEXT_KIND};
use crate::giftwrap::tweaked_timestamp;
use crate::keys::{KeyError, Keypair};

/// Errors from the chat envelope.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Event(#[from] EventError),

    #[error(transparent)]
    Key(#[from] KeyError),

    #[error("chat layer is not valid JSON: {0}")]
    MalformedLayer(#[from] serde_json::Error),

    #[error("inner event signature is invalid")]
    SignatureInvalid,
}

/// A received, signature-verified chat line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    /// Trade pubkey of the author.
    pub author_pubkey: String,
    pub text: String,
    pub created_at: u64,
}

/// The shared routing identity for a trade between `my` and `their` keys.
///
/// Both parties derive the same keypair; its pubkey is the `p` target of
/// every chat wrap for this trade.
pub fn shared_identity(my: &Keypair, their_pubkey_hex: &str) -> Result<Keypair, ChatError> {
    Ok(crypto::shared_keypair(&my.secret_bytes(), their_pubkey_hex)?)
}

/// Build an outgoing chat wrap carrying `text`.
pub fn wrap_chat_message(
    text: &str,
    trade: &Keypair,
    shared: &Keypair,
) -> Result<Event, ChatError> {
    let now = unix_now();

    let inner = UnsignedEvent::new(
        trade.public_hex(),
        now,
        TEXT_KIND,
        vec![p_tag(&shared.public_hex())],
        text.to_string(),
    )
    .finalize(trade)?;

    let ephemeral = Keypair::from_secret_bytes(rand::random())?;
    let conversation =
        crypto::conversation_key(&ephemeral.secret_bytes(), &shared.public_hex())?;
    let content = crypto::encrypt(&conversation, &serde_json::to_string(&inner)?)?;

    let wrap = UnsignedEvent::new(
        ephemeral.public_hex(),
        tweaked_timestamp(now),
        GIFT_WRAP_KIND,
        vec![p_tag(&shared.public_hex())],
        content,
    )
    .finalize(&ephemeral)?;

    Ok(wrap)
}

/// Decrypt and authenticate one incoming chat wrap.
///
/// The inner signature is verified against the inner event's own pubkey;
/// anything that fails verification is rejected, and the caller drops it
/// without output.
pub fn unwrap_chat_message(wrap: &Event, shared: &Keypair) -> Result<ChatMessage, ChatError> {
    let conversation = crypto::conversation_key(&shared.secret_bytes(), &wrap.pubkey)?;
    let inner_json = crypto::decrypt(&conversation, &wrap.content)?;
    let inner: Event = serde_json::from_str(&inner_json)?;

    inner.verify().map_err(|_| ChatError::SignatureInvalid)?;

    Ok(ChatMessage {
        author_pubkey: inner.pubkey.clone(),
        text: inner.content.clone(),
        created_at: inner.created_at,
    })
}
