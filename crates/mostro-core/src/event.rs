//! Canonical relay event record.
//!
//! Events are the unit of exchange with relays: an immutable tuple of
//! id, signer pubkey, kind, creation time, tags, content and signature.
//! The id is the SHA-256 of the canonical serialization; the signature is
//! Schnorr over the id.

use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

use crate::crypto::{self, CryptoError};
use crate::keys::Keypair;

/// Kind of the plaintext rumor / chat inner event.
pub const TEXT_KIND: u16 = 1;
/// Kind of the sealed middle layer of a gift wrap.
pub const SEAL_KIND: u16 = 13;
/// Kind of the outermost gift-wrap layer.
pub const GIFT_WRAP_KIND: u16 = 1059;
/// Kind of public order-book events published by the coordinator.
pub const ORDER_KIND: u16 = 38383;
/// Kind of user rating events published by the coordinator.
pub const RATING_KIND: u16 = 31986;
/// Kind of coordinator instance-info events.
pub const INFO_KIND: u16 = 38000;

/// Errors from event construction and verification.
#[derive(Debug, Error)]
pub enum EventError {
    #[error("event id mismatch")]
    IdMismatch,

    #[error("invalid event signature")]
    BadSignature,

    #[error("event serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

/// A signed relay event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub pubkey: String,
    pub created_at: u64,
    pub kind: u16,
    pub tags: Vec<Vec<String>>,
    pub content: String,
    pub sig: String,
}

/// An event without id or signature: the rumor form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsignedEvent {
    pub pubkey: String,
    pub created_at: u64,
    pub kind: u16,
    pub tags: Vec<Vec<String>>,
    pub content: String,
}

impl UnsignedEvent {
    pub fn new(
        pubkey: String,
        created_at: u64,
        kind: u16,
        tags: Vec<Vec<String>>,
        content: String,
    ) -> Self {
        Self {
            pubkey,
            created_at,
            kind,
            tags,
            content,
        }
    }

    /// SHA-256 of the canonical serialization
    /// `[0, pubkey, created_at, kind, tags, content]`.
    pub fn compute_id(&self) -> Result<[u8; 32], EventError> {
        let canonical = json!([
            0,
            self.pubkey,
            self.created_at,
            self.kind,
            self.tags,
            self.content,
        ]);
        Ok(crypto::sha256(serde_json::to_string(&canonical)?.as_bytes()))
    }

    /// Compute the id and sign it, producing a complete event.
    ///
    /// The signer must be the keypair whose public key is `self.pubkey`.
    pub fn finalize(self, keypair: &Keypair) -> Result<Event, EventError> {
        let id = self.compute_id()?;
        let sig = crypto::sign_hash(&id, keypair)?;
        Ok(Event {
            id: hex::encode(id),
            pubkey: self.pubkey,
            created_at: self.created_at,
            kind: self.kind,
            tags: self.tags,
            content: self.content,
            sig,
        })
    }
}

impl Event {
    /// Verify id recomputation and the Schnorr signature.
    ///
    /// Every event entering the system from the network must pass this.
    pub fn verify(&self) -> Result<(), EventError> {
        let unsigned = UnsignedEvent {
            pubkey: self.pubkey.clone(),
            created_at: self.created_at,
            kind: self.kind,
            tags: self.tags.clone(),
            content: self.content.clone(),
        };
        let id = unsigned.compute_id()?;
        if hex::encode(id) != self.id {
            return Err(EventError::IdMismatch);
        }
        if !crypto::verify_sig(&id, &self.sig, &self.pubkey) {
            return Err(EventError::BadSignature);
        }
        Ok(())
    }

    /// First value of the first tag named `name`.
    pub fn tag_value(&self, name: &str) -> Option<&str> {
        find_tag_value(&self.tags, name)
    }

    /// All values (beyond the name) of the first tag named `name`.
    pub fn tag_values(&self, name: &str) -> Option<&[String]> {
        self.tags
            .iter()
            .find(|tag| is_tag(tag, name))
            .map(|tag| &tag[1..])
    }
}

pub(crate) fn tag_name(tag: &[String]) -> Option<&str> {
    tag.first().map(String::as_str)
}

pub(crate) fn is_tag(tag: &[String], name: &str) -> bool {
    matches!(tag_name(tag), Some(tag_name) if tag_name == name)
}

pub(crate) fn tag_field(tag: &[String], index: usize) -> Option<&str> {
    tag.get(index).map(String::as_str)
}

pub(crate) fn find_tag_value<'a>(tags: &'a [Vec<String>], name: &str) -> Option<&'a str> {
    tags.iter()
        .find(|tag| is_tag(tag, name))
        .and_then(|tag| tag_field(tag, 1))
}

pub(crate) fn parse_tag_value<T>(tags: &[Vec<String>], name: &str) -> Option<T>
where
    T: std::str::FromStr,
{
    find_tag_value(tags, name).and_then(|value| value.parse::<T>().ok())
}

/// Single-recipient `p` tag.
pub fn p_tag(recipient_pubkey_hex: &str) -> Vec<String> {
    vec!["p".to_string(), recipient_pubkey_hex.to_string()]
}

/// Current Unix time in seconds.
pub fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|duration| duration.as_secs())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::KeyRing;

    const MNEMONIC: &str =
        "leader monkey parrot ring guide accident before fence cannon height naive bean";

    fn signer() -> Keypair {
        KeyRing::import(MNEMONIC).unwrap().trade_keypair(1).unwrap()
    }

    fn sample_unsigned(signer: &Keypair) -> UnsignedEvent {
        UnsignedEvent::new(
            signer.public_hex(),
            1_700_000_000,
            TEXT_KIND,
            vec![p_tag("ab".repeat(32).as_str())],
            "hello".to_string(),
        )
    }

    #[test]
    fn finalize_produces_verifiable_event() -> Result<(), EventError> {
        let signer = signer();
        let event = sample_unsigned(&signer).finalize(&signer)?;
        event.verify()?;
        assert_eq!(event.pubkey, signer.public_hex());
        assert_eq!(event.id.len(), 64);
        assert_eq!(event.sig.len(), 128);
        Ok(())
    }

    #[test]
    fn id_is_deterministic() -> Result<(), EventError> {
        let signer = signer();
        let first = sample_unsigned(&signer).compute_id()?;
        let second = sample_unsigned(&signer).compute_id()?;
        assert_eq!(first, second);
        Ok(())
    }

    #[test]
    fn tampered_content_fails_verification() -> Result<(), EventError> {
        let signer = signer();
        let mut event = sample_unsigned(&signer).finalize(&signer)?;
        event.content = "goodbye".to_string();
        assert!(matches!(event.verify(), Err(EventError::IdMismatch)));
        Ok(())
    }

    #[test]
    fn forged_signature_fails_verification() -> Result<(), EventError> {
        let signer = signer();
        let other = KeyRing::import(MNEMONIC).unwrap().trade_keypair(2).unwrap();

        let unsigned = sample_unsigned(&signer);
        // Signature by the wrong key over the right id.
        let id = unsigned.compute_id()?;
        let bad_sig = crypto::sign_hash(&id, &other)?;
        let event = Event {
            id: hex::encode(id),
            pubkey: unsigned.pubkey,
            created_at: unsigned.created_at,
            kind: unsigned.kind,
            tags: unsigned.tags,
            content: unsigned.content,
            sig: bad_sig,
        };
        assert!(matches!(event.verify(), Err(EventError::BadSignature)));
        Ok(())
    }

    #[test]
    fn tag_helpers() -> Result<(), EventError> {
        let signer = signer();
        let mut unsigned = sample_unsigned(&signer);
        unsigned.tags = vec![
            vec!["d".into(), "order-id".into()],
            vec!["pm".into(), "cash".into(), "bank".into()],
        ];
        let event = unsigned.finalize(&signer)?;

        assert_eq!(event.tag_value("d"), Some("order-id"));
        assert_eq!(
            event.tag_values("pm"),
            Some(&["cash".to_string(), "bank".to_string()][..])
        );
        assert_eq!(event.tag_value("missing"), None);
        Ok(())
    }

    #[test]
    fn event_serde_round_trip() -> Result<(), EventError> {
        let signer = signer();
        let event = sample_unsigned(&signer).finalize(&signer)?;
        let text = serde_json::to_string(&event)?;
        let back: Event = serde_json::from_str(&text)?;
        assert_eq!(event, back);
        Ok(())
    }
}
