//! Hierarchical-deterministic key management.
//!
//! A single 12-word mnemonic backs every key the client uses. Child 0 of
//! the fixed account path is the identity key; children 1..N are
//! single-trade keys rotated to prevent cross-trade linkage.

use std::path::{Path, PathBuf};

use bech32::{Bech32, Hrp};
use bip39::{Language, Mnemonic};
use bitcoin::bip32::{ChildNumber, DerivationPath, Xpriv};
use bitcoin::key::Secp256k1;
use bitcoin::secp256k1::{PublicKey, SecretKey};
use bitcoin::Network;
use thiserror::Error;

const NOSTR_COIN_TYPE: u32 = 1237;
const MOSTRO_ACCOUNT: u32 = 38383;
const NSEC_HRP: &str = "nsec";
const NPUB_HRP: &str = "npub";

/// Errors from key derivation and seed persistence.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("invalid mnemonic: {0}")]
    InvalidMnemonic(String),

    #[error("invalid trade index: {0} (index 0 is reserved for the identity key)")]
    InvalidIndex(u32),

    #[error("key derivation failed: {0}")]
    Derivation(String),

    #[error("seed file error: {0}")]
    SeedFile(#[from] std::io::Error),

    #[error("bech32 encoding failed: {0}")]
    Bech32(String),
}

/// A derived key pair: 32-byte secret scalar and x-only public key.
#[derive(Clone)]
pub struct Keypair {
    secret: [u8; 32],
    public: [u8; 32],
}

impl Keypair {
    /// Build from a raw secret scalar.
    pub fn from_secret_bytes(secret: [u8; 32]) -> Result<Self, KeyError> {
        let secp = Secp256k1::new();
        let secret_key = SecretKey::from_slice(&secret)
            .map_err(|error| KeyError::Derivation(error.to_string()))?;
        let public_full = PublicKey::from_secret_key(&secp, &secret_key).serialize();
        let mut public = [0u8; 32];
        public.copy_from_slice(&public_full[1..33]);
        Ok(Self { secret, public })
    }

    /// The secret scalar, by value.
    pub fn secret_bytes(&self) -> [u8; 32] {
        self.secret
    }

    /// The x-only public key bytes.
    pub fn public_bytes(&self) -> [u8; 32] {
        self.public
    }

    pub fn public_hex(&self) -> String {
        hex::encode(self.public)
    }

    pub fn npub(&self) -> Result<String, KeyError> {
        encode_bech32(NPUB_HRP, &self.public)
    }

    pub fn nsec(&self) -> Result<String, KeyError> {
        encode_bech32(NSEC_HRP, &self.secret)
    }
}

impl std::fmt::Debug for Keypair {
    // The secret scalar must never leak through Debug output.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keypair")
            .field("public", &self.public_hex())
            .finish_non_exhaustive()
    }
}

/// The client's key hierarchy, backed by a mnemonic seed.
///
/// Owns the seed; identity and trade keys are derived on demand and handed
/// out by value.
#[derive(Clone)]
pub struct KeyRing {
    mnemonic: String,
}

impl KeyRing {
    /// Generate a fresh 12-word mnemonic (128 bits of entropy).
    pub fn generate() -> Result<Self, KeyError> {
        let entropy: [u8; 16] = rand::random();
        let mnemonic = Mnemonic::from_entropy_in(Language::English, &entropy)
            .map_err(|error| KeyError::InvalidMnemonic(error.to_string()))?;
        Ok(Self {
            mnemonic: mnemonic.to_string(),
        })
    }

    /// Import an existing mnemonic, enforcing the English word-list checksum.
    pub fn import(phrase: &str) -> Result<Self, KeyError> {
        let parsed = Mnemonic::parse_in(Language::English, phrase.trim())
            .map_err(|error| KeyError::InvalidMnemonic(error.to_string()))?;
        Ok(Self {
            mnemonic: parsed.to_string(),
        })
    }

    /// Load the seed file at `path`, creating a new one if absent.
    ///
    /// Returns the key ring and whether a new seed was generated.
    pub fn load_or_create(path: impl AsRef<Path>) -> Result<(Self, bool), KeyError> {
        let path = path.as_ref();
        if path.exists() {
            let phrase = std::fs::read_to_string(path)?;
            return Ok((Self::import(&phrase)?, false));
        }
        let ring = Self::generate()?;
        write_seed_file(path, &ring.mnemonic)?;
        Ok((ring, true))
    }

    /// The backing mnemonic phrase. Handle with care; this is the wallet.
    pub fn mnemonic(&self) -> &str {
        &self.mnemonic
    }

    /// Identity key: child 0 of the account path.
    pub fn identity_keypair(&self) -> Result<Keypair, KeyError> {
        self.derive(0)
    }

    /// Trade key at `index`. Index 0 is reserved and rejected.
    pub fn trade_keypair(&self, index: u32) -> Result<Keypair, KeyError> {
        if index == 0 {
            return Err(KeyError::InvalidIndex(index));
        }
        self.derive(index)
    }

    fn derive(&self, index: u32) -> Result<Keypair, KeyError> {
        let parsed = Mnemonic::parse_in(Language::English, &self.mnemonic)
            .map_err(|error| KeyError::InvalidMnemonic(error.to_string()))?;
        let seed = parsed.to_seed("");

        let secp = Secp256k1::new();
        let master = Xpriv::new_master(Network::Bitcoin, &seed)
            .map_err(|error| KeyError::Derivation(error.to_string()))?;

        let path = DerivationPath::from(vec![
            hardened(44)?,
            hardened(NOSTR_COIN_TYPE)?,
            hardened(MOSTRO_ACCOUNT)?,
            normal(0)?,
            normal(index)?,
        ]);

        let derived = master
            .derive_priv(&secp, &path)
            .map_err(|error| KeyError::Derivation(error.to_string()))?;

        Keypair::from_secret_bytes(derived.private_key.secret_bytes())
    }
}

fn hardened(index: u32) -> Result<ChildNumber, KeyError> {
    ChildNumber::from_hardened_idx(index).map_err(|error| KeyError::Derivation(error.to_string()))
}

fn normal(index: u32) -> Result<ChildNumber, KeyError> {
    ChildNumber::from_normal_idx(index).map_err(|error| KeyError::Derivation(error.to_string()))
}

fn encode_bech32(hrp: &str, data: &[u8; 32]) -> Result<String, KeyError> {
    let parsed_hrp = Hrp::parse(hrp).map_err(|error| KeyError::Bech32(error.to_string()))?;
    bech32::encode::<Bech32>(parsed_hrp, data).map_err(|error| KeyError::Bech32(error.to_string()))
}

fn write_seed_file(path: &Path, mnemonic: &str) -> Result<(), KeyError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, format!("{mnemonic}\n"))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }

    Ok(())
}

/// Default seed file location under the client data directory.
pub fn seed_path(data_dir: impl AsRef<Path>) -> PathBuf {
    data_dir.as_ref().join("seed")
}
