//! Cryptographic primitives.
//!
//! - conversation keys and authenticated symmetric encryption (NIP-44 v2)
//! - BIP-340 Schnorr signing over 32-byte digests
//! - ECDH shared identity used as the routing target for peer chat

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bitcoin::key::Secp256k1;
use bitcoin::secp256k1::{ecdh, schnorr, Message, PublicKey, SecretKey, XOnlyPublicKey};
use chacha20::cipher::{KeyIvInit, StreamCipher};
use chacha20::ChaCha20;
use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::keys::Keypair;

type HmacSha256 = Hmac<Sha256>;

const CONVERSATION_KEY_SALT: &[u8] = b"nip44-v2";
const PAYLOAD_VERSION: u8 = 2;
const NONCE_SIZE: usize = 32;
const MAC_SIZE: usize = 32;
const MAX_PLAINTEXT_SIZE: usize = 65535;

/// Errors from the crypto layer.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid key material: {0}")]
    InvalidKey(String),

    #[error("invalid signature encoding: {0}")]
    InvalidSignature(String),

    #[error("decryption failed")]
    DecryptFailed,

    #[error("plaintext length {0} out of range")]
    PlaintextLength(usize),
}

/// SHA-256 digest.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Schnorr-sign a 32-byte digest. Returns the 64-byte signature hex-encoded.
pub fn sign_hash(digest: &[u8; 32], keypair: &Keypair) -> Result<String, CryptoError> {
    let secp = Secp256k1::new();
    let secret = bitcoin::secp256k1::Keypair::from_seckey_slice(&secp, &keypair.secret_bytes())
        .map_err(|error| CryptoError::InvalidKey(error.to_string()))?;
    let signature = secp.sign_schnorr(&Message::from_digest(*digest), &secret);
    Ok(hex::encode(signature.serialize()))
}

/// Verify a hex-encoded Schnorr signature over a 32-byte digest.
pub fn verify_sig(digest: &[u8; 32], signature_hex: &str, pubkey_hex: &str) -> bool {
    let Ok(signature_bytes) = hex::decode(signature_hex) else {
        return false;
    };
    let Ok(signature) = schnorr::Signature::from_slice(&signature_bytes) else {
        return false;
    };
    let Ok(pubkey) = parse_xonly(pubkey_hex) else {
        return false;
    };
    let secp = Secp256k1::verification_only();
    secp.verify_schnorr(&signature, &Message::from_digest(*digest), &pubkey)
        .is_ok()
}

/// Derive the NIP-44 conversation key for `(my_secret, their_pubkey)`.
///
/// Symmetric: `conversation_key(a, B) == conversation_key(b, A)`.
pub fn conversation_key(
    my_secret: &[u8; 32],
    their_pubkey_hex: &str,
) -> Result<[u8; 32], CryptoError> {
    let shared_x = ecdh_shared_x(my_secret, their_pubkey_hex)?;
    let (prk, _) = Hkdf::<Sha256>::extract(Some(CONVERSATION_KEY_SALT), &shared_x);
    Ok(prk.into())
}

/// Encrypt plaintext under a conversation key into a versioned base64 blob.
pub fn encrypt(conversation_key: &[u8; 32], plaintext: &str) -> Result<String, CryptoError> {
    let mut nonce = [0u8; NONCE_SIZE];
    rand::thread_rng().fill_bytes(&mut nonce);
    encrypt_with_nonce(conversation_key, plaintext, &nonce)
}

fn encrypt_with_nonce(
    conversation_key: &[u8; 32],
    plaintext: &str,
    nonce: &[u8; NONCE_SIZE],
) -> Result<String, CryptoError> {
    let (chacha_key, chacha_nonce, hmac_key) = message_keys(conversation_key, nonce)?;

    let mut padded = pad_plaintext(plaintext.as_bytes())?;
    let mut cipher = ChaCha20::new(&chacha_key.into(), &chacha_nonce.into());
    cipher.apply_keystream(&mut padded);

    let mac = hmac_with_aad(&hmac_key, nonce, &padded)?;

    let mut payload = Vec::with_capacity(1 + NONCE_SIZE + padded.len() + MAC_SIZE);
    payload.push(PAYLOAD_VERSION);
    payload.extend_from_slice(nonce);
    payload.extend_from_slice(&padded);
    payload.extend_from_slice(&mac);
    Ok(BASE64.encode(payload))
}

/// Decrypt a versioned base64 blob. Any MAC, version, or framing failure
/// collapses into `DecryptFailed`; callers are expected to skip the event.
pub fn decrypt(conversation_key: &[u8; 32], payload: &str) -> Result<String, CryptoError> {
    let bytes = BASE64.decode(payload).map_err(|_| CryptoError::DecryptFailed)?;
    // version || nonce(32) || ciphertext(>= 34) || mac(32)
    if bytes.len() < 1 + NONCE_SIZE + 34 + MAC_SIZE {
        return Err(CryptoError::DecryptFailed);
    }
    if bytes[0] != PAYLOAD_VERSION {
        return Err(CryptoError::DecryptFailed);
    }

    let nonce: [u8; NONCE_SIZE] = bytes[1..1 + NONCE_SIZE]
        .try_into()
        .map_err(|_| CryptoError::DecryptFailed)?;
    let mac_offset = bytes.len() - MAC_SIZE;
    let ciphertext = &bytes[1 + NONCE_SIZE..mac_offset];
    let given_mac = &bytes[mac_offset..];

    let (chacha_key, chacha_nonce, hmac_key) =
        message_keys(conversation_key, &nonce).map_err(|_| CryptoError::DecryptFailed)?;

    let mut mac = HmacSha256::new_from_slice(&hmac_key).map_err(|_| CryptoError::DecryptFailed)?;
    mac.update(&nonce);
    mac.update(ciphertext);
    mac.verify_slice(given_mac)
        .map_err(|_| CryptoError::DecryptFailed)?;

    let mut padded = ciphertext.to_vec();
    let mut cipher = ChaCha20::new(&chacha_key.into(), &chacha_nonce.into());
    cipher.apply_keystream(&mut padded);

    unpad_plaintext(&padded)
}

/// Derive the symmetric trade-chat identity for two parties.
///
/// The x-coordinate of `my_secret * their_pubkey` is reused as a secret
/// scalar; its keypair is identical from both ends and serves as the `p`
/// routing target for chat wraps.
pub fn shared_keypair(
    my_secret: &[u8; 32],
    their_pubkey_hex: &str,
) -> Result<Keypair, CryptoError> {
    let shared_x = ecdh_shared_x(my_secret, their_pubkey_hex)?;
    Keypair::from_secret_bytes(shared_x)
        .map_err(|error| CryptoError::InvalidKey(error.to_string()))
}

fn ecdh_shared_x(
    my_secret: &[u8; 32],
    their_pubkey_hex: &str,
) -> Result<[u8; 32], CryptoError> {
    let secret = SecretKey::from_slice(my_secret)
        .map_err(|error| CryptoError::InvalidKey(error.to_string()))?;
    let xonly = parse_xonly(their_pubkey_hex)?;
    let full = PublicKey::from_x_only_public_key(xonly, bitcoin::secp256k1::Parity::Even);

    let point = ecdh::shared_secret_point(&full, &secret);
    let mut shared_x = [0u8; 32];
    shared_x.copy_from_slice(&point[..32]);
    Ok(shared_x)
}

fn parse_xonly(pubkey_hex: &str) -> Result<XOnlyPublicKey, CryptoError> {
    let bytes = hex::decode(pubkey_hex)
        .map_err(|error| CryptoError::InvalidKey(error.to_string()))?;
    XOnlyPublicKey::from_slice(&bytes).map_err(|error| CryptoError::InvalidKey(error.to_string()))
}

/// Expand per-message keys: chacha key (32) || chacha nonce (12) || hmac key (32).
fn message_keys(
    conversation_key: &[u8; 32],
    nonce: &[u8; NONCE_SIZE],
) -> Result<([u8; 32], [u8; 12], [u8; 32]), CryptoError> {
    let hk = Hkdf::<Sha256>::from_prk(conversation_key)
        .map_err(|_| CryptoError::InvalidKey("bad conversation key".to_string()))?;
    let mut okm = [0u8; 76];
    hk.expand(nonce, &mut okm)
        .map_err(|_| CryptoError::InvalidKey("hkdf expand failed".to_string()))?;

    let mut chacha_key = [0u8; 32];
    let mut chacha_nonce = [0u8; 12];
    let mut hmac_key = [0u8; 32];
    chacha_key.copy_from_slice(&okm[0..32]);
    chacha_nonce.copy_from_slice(&okm[32..44]);
    hmac_key.copy_from_slice(&okm[44..76]);
    Ok((chacha_key, chacha_nonce, hmac_key))
}

fn hmac_with_aad(
    hmac_key: &[u8; 32],
    aad: &[u8],
    message: &[u8],
) -> Result<[u8; 32], CryptoError> {
    let mut mac = HmacSha256::new_from_slice(hmac_key)
        .map_err(|_| CryptoError::InvalidKey("bad hmac key".to_string()))?;
    mac.update(aad);
    mac.update(message);
    Ok(mac.finalize().into_bytes().into())
}

fn padded_len(unpadded: usize) -> usize {
    if unpadded <= 32 {
        return 32;
    }
    // Next power of two above (unpadded - 1), then chunks of 1/8 of it.
    let bits = usize::BITS - (unpadded - 1).leading_zeros();
    let next_power = 1usize << bits;
    let chunk = if next_power <= 256 { 32 } else { next_power / 8 };
    chunk * ((unpadded - 1) / chunk + 1)
}

fn pad_plaintext(plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let len = plaintext.len();
    if len == 0 || len > MAX_PLAINTEXT_SIZE {
        return Err(CryptoError::PlaintextLength(len));
    }
    let mut padded = vec![0u8; 2 + padded_len(len)];
    padded[0..2].copy_from_slice(&(len as u16).to_be_bytes());
    padded[2..2 + len].copy_from_slice(plaintext);
    Ok(padded)
}

fn unpad_plaintext(padded: &[u8]) -> Result<String, CryptoError> {
    if padded.len() < 2 {
        return Err(CryptoError::DecryptFailed);
    }
    let len = u16::from_be_bytes([padded[0], padded[1]]) as usize;
    if len == 0 || padded.len() != 2 + padded_len(len) || 2 + len > padded.len() {
        return Err(CryptoError::DecryptFailed);
    }
    String::from_utf8(padded[2..2 + len].to_vec()).map_err(|_| CryptoError::DecryptFailed)
}
