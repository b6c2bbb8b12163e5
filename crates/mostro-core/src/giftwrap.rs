//! Three-layer envelope for client/coordinator traffic.
//!
//! rumor (unsigned, trade key) -> seal (signed, identity or trade key)
//! -> wrap (signed, single-use ephemeral key). Relays see only the wrap:
//! an ephemeral author, the recipient's `p` tag, and a timestamp pushed
//! randomly into the past.

use rand::Rng;
use serde::Deserialize;
use thiserror::Error;

use crate::crypto::{self, CryptoError};
use crate::event::{p_tag, unix_now, Event, EventError, UnsignedEvent, GIFT_WRAP_KIND, SEAL_KIND, TEXT_KIND};
use crate::keys::{KeyError, Keypair};
use crate::message::{Message, MessageError};

/// Fetch windows shorter than this would miss wraps whose timestamps were
/// tweaked up to two days into the past.
pub const MIN_FETCH_WINDOW_SECS: u64 = 3 * 86_400;

const TWEAK_MIN_SECS: u64 = 60;
const TWEAK_SPAN_SECS: u64 = 2 * 86_400 - TWEAK_MIN_SECS;

/// Errors from envelope construction and parsing.
#[derive(Debug, Error)]
pub enum WrapError {
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Event(#[from] EventError),

    #[error(transparent)]
    Key(#[from] KeyError),

    #[error(transparent)]
    Message(#[from] MessageError),

    #[error("envelope layer is not valid JSON: {0}")]
    MalformedLayer(#[from] serde_json::Error),
}

/// A decrypted incoming gift wrap.
#[derive(Debug, Clone)]
pub struct UnwrappedGift {
    pub message: Message,
    /// Hex Schnorr signature over the message hash, when the sender signed.
    pub inner_signature: Option<String>,
    /// The trade pubkey the rumor claims as its author.
    pub rumor_pubkey: String,
    pub rumor_created_at: u64,
}

/// A timestamp drawn uniformly from `(now - 2 days, now - 60 s)`.
pub fn tweaked_timestamp(now: u64) -> u64 {
    let offset = TWEAK_MIN_SECS + rand::thread_rng().gen_range(0..TWEAK_SPAN_SECS);
    now.saturating_sub(offset)
}

/// Wrap a protocol message for the coordinator.
///
/// The inner payload is signed by the trade key; the coordinator silently
/// ignores unsigned actions. The seal is signed by the identity key when
/// one is supplied (reputation mode), else by the trade key (privacy
/// mode).
pub fn wrap_message(
    message: &Message,
    trade: &Keypair,
    identity: Option<&Keypair>,
    recipient_pubkey: &str,
) -> Result<Event, WrapError> {
    let message_json = message.to_json()?;
    let message_hash = crypto::sha256(message_json.as_bytes());
    let inner_signature = crypto::sign_hash(&message_hash, trade)?;

    let content = serde_json::to_string(&(message, Some(inner_signature)))?;
    wrap_payload(&content, trade, identity, recipient_pubkey)
}

fn wrap_payload(
    rumor_content: &str,
    trade: &Keypair,
    identity: Option<&Keypair>,
    recipient_pubkey: &str,
) -> Result<Event, WrapError> {
    let now = unix_now();

    let rumor = UnsignedEvent::new(
        trade.public_hex(),
        now,
        TEXT_KIND,
        vec![p_tag(recipient_pubkey)],
        rumor_content.to_string(),
    );

    let seal_key = identity.unwrap_or(trade);
    let seal_conversation = crypto::conversation_key(&seal_key.secret_bytes(), recipient_pubkey)?;
    let sealed_rumor = crypto::encrypt(&seal_conversation, &serde_json::to_string(&rumor)?)?;

    let seal = UnsignedEvent::new(
        seal_key.public_hex(),
        tweaked_timestamp(now),
        SEAL_KIND,
        vec![],
        sealed_rumor,
    )
    .finalize(seal_key)?;

    let ephemeral = ephemeral_keypair()?;
    let wrap_conversation =
        crypto::conversation_key(&ephemeral.secret_bytes(), recipient_pubkey)?;
    let wrapped_seal = crypto::encrypt(&wrap_conversation, &serde_json::to_string(&seal)?)?;

    let wrap = UnsignedEvent::new(
        ephemeral.public_hex(),
        tweaked_timestamp(now),
        GIFT_WRAP_KIND,
        vec![p_tag(recipient_pubkey)],
        wrapped_seal,
    )
    .finalize(&ephemeral)?;

    Ok(wrap)
}

/// The rumor as carried inside a seal. Extra fields (a precomputed id,
/// tags) are ignored.
#[derive(Debug, Deserialize)]
struct RumorLayer {
    pubkey: String,
    created_at: u64,
    content: String,
}

/// Unwrap one incoming gift wrap with the recipient's key.
///
/// The rumor's declared pubkey is reported as-is; it legitimately differs
/// from the seal signer in reputation mode. Inner-signature verification
/// is left to the caller.
pub fn unwrap_event(wrap: &Event, recipient: &Keypair) -> Result<UnwrappedGift, WrapError> {
    let wrap_conversation =
        crypto::conversation_key(&recipient.secret_bytes(), &wrap.pubkey)?;
    let seal_json = crypto::decrypt(&wrap_conversation, &wrap.content)?;
    let seal: Event = serde_json::from_str(&seal_json)?;

    let seal_conversation =
        crypto::conversation_key(&recipient.secret_bytes(), &seal.pubkey)?;
    let rumor_json = crypto::decrypt(&seal_conversation, &seal.content)?;
    let rumor: RumorLayer = serde_json::from_str(&rumor_json)?;

    let (message, inner_signature): (Message, Option<String>) =
        serde_json::from_str(&rumor.content)?;

    Ok(UnwrappedGift {
        message,
        inner_signature,
        rumor_pubkey: rumor.pubkey,
        rumor_created_at: rumor.created_at,
    })
}

/// A single-use signing key for the outermost layer.
fn ephemeral_keypair() -> Result<Keypair, WrapError> {
    let secret: [u8; 32] = rand::random();
    Ok(Keypair::from_secret_bytes(secret)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::KeyRing;
    use crate::message::{new_order, Action, Payload};
    use crate::order::OrderKind;

    const MNEMONIC: &str =
        "leader monkey parrot ring guide accident before fence cannon height naive bean";
    const COORDINATOR_MNEMONIC: &str =
        "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    fn sender() -> (Keypair, Keypair) {
        let ring = KeyRing::import(MNEMONIC).unwrap();
        (
            ring.identity_keypair().unwrap(),
            ring.trade_keypair(1).unwrap(),
        )
    }

    fn coordinator() -> Keypair {
        KeyRing::import(COORDINATOR_MNEMONIC)
            .unwrap()
            .identity_keypair()
            .unwrap()
    }

    fn sample_message() -> Message {
        new_order(
            OrderKind::Sell,
            "ars",
            5_555,
            None,
            None,
            0,
            "Mostro",
            1,
            None,
            77,
            1,
        )
    }

    #[test]
    fn round_trip_preserves_message_and_signature() -> Result<(), WrapError> {
        let (identity, trade) = sender();
        let coordinator = coordinator();
        let message = sample_message();

        let wrap = wrap_message(&message, &trade, Some(&identity), &coordinator.public_hex())?;
        assert_eq!(wrap.kind, GIFT_WRAP_KIND);
        assert_eq!(wrap.tag_value("p"), Some(coordinator.public_hex().as_str()));
        // The outer author is ephemeral, linked to neither of our keys.
        assert_ne!(wrap.pubkey, trade.public_hex());
        assert_ne!(wrap.pubkey, identity.public_hex());

        let unwrapped = unwrap_event(&wrap, &coordinator)?;
        assert_eq!(unwrapped.message, message);
        assert_eq!(unwrapped.rumor_pubkey, trade.public_hex());

        // The inner signature authenticates the trade key over the
        // canonical message hash.
        let signature = unwrapped.inner_signature.expect("inner signature present");
        let hash = crypto::sha256(message.to_json()?.as_bytes());
        assert!(crypto::verify_sig(&hash, &signature, &trade.public_hex()));
        Ok(())
    }

    #[test]
    fn privacy_mode_seals_with_trade_key() -> Result<(), WrapError> {
        let (_, trade) = sender();
        let coordinator = coordinator();

        let wrap = wrap_message(&sample_message(), &trade, None, &coordinator.public_hex())?;
        let unwrapped = unwrap_event(&wrap, &coordinator)?;
        assert_eq!(unwrapped.rumor_pubkey, trade.public_hex());
        Ok(())
    }

    #[test]
    fn wrong_recipient_cannot_unwrap() -> Result<(), WrapError> {
        let (identity, trade) = sender();
        let coordinator = coordinator();
        let wrap = wrap_message(&sample_message(), &trade, Some(&identity), &coordinator.public_hex())?;

        let stranger = KeyRing::import(MNEMONIC).unwrap().trade_keypair(9)?;
        assert!(unwrap_event(&wrap, &stranger).is_err());
        Ok(())
    }

    #[test]
    fn timestamps_are_tweaked_into_the_past() -> Result<(), WrapError> {
        let (identity, trade) = sender();
        let coordinator = coordinator();
        let before = unix_now();

        for _ in 0..16 {
            let wrap =
                wrap_message(&sample_message(), &trade, Some(&identity), &coordinator.public_hex())?;
            let after = unix_now();
            assert!(wrap.created_at <= after - TWEAK_MIN_SECS);
            assert!(wrap.created_at > before - 2 * 86_400 - TWEAK_MIN_SECS);
        }
        Ok(())
    }

    #[test]
    fn each_wrap_uses_a_fresh_ephemeral_key() -> Result<(), WrapError> {
        let (identity, trade) = sender();
        let coordinator = coordinator();

        let first = wrap_message(&sample_message(), &trade, Some(&identity), &coordinator.public_hex())?;
        let second = wrap_message(&sample_message(), &trade, Some(&identity), &coordinator.public_hex())?;
        assert_ne!(first.pubkey, second.pubkey);
        Ok(())
    }

    #[test]
    fn unwrapped_action_survives() -> Result<(), WrapError> {
        let (identity, trade) = sender();
        let coordinator = coordinator();
        let wrap = wrap_message(&sample_message(), &trade, Some(&identity), &coordinator.public_hex())?;
        let unwrapped = unwrap_event(&wrap, &coordinator)?;

        assert_eq!(unwrapped.message.action(), Action::NewOrder);
        assert!(matches!(
            unwrapped.message.payload(),
            Some(Payload::Order(_))
        ));
        Ok(())
    }
}
