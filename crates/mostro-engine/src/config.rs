//! Client configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

pub const ENV_DATA_DIR: &str = "MOSTRO_CLI_DATA_DIR";

const DEFAULT_PRICE_API: &str = "https://api.yadio.io/exrates/BTC";

/// Bitcoin network the coordinator trades on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Mainnet,
    Testnet,
    Signet,
}

/// Hard limits enforced before any trade leaves the machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Limits {
    #[serde(default = "default_max_trade_amount")]
    pub max_trade_amount_sats: u64,
    #[serde(default = "default_max_daily_volume")]
    pub max_daily_volume_sats: u64,
    #[serde(default = "default_max_trades_per_day")]
    pub max_trades_per_day: u32,
    #[serde(default = "default_cooldown")]
    pub cooldown_seconds: u64,
    #[serde(default = "default_require_confirmation")]
    pub require_confirmation: bool,
}

fn default_max_trade_amount() -> u64 {
    1_000_000
}

fn default_max_daily_volume() -> u64 {
    5_000_000
}

fn default_max_trades_per_day() -> u32 {
    10
}

fn default_cooldown() -> u64 {
    300
}

fn default_require_confirmation() -> bool {
    true
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_trade_amount_sats: default_max_trade_amount(),
            max_daily_volume_sats: default_max_daily_volume(),
            max_trades_per_day: default_max_trades_per_day(),
            cooldown_seconds: default_cooldown(),
            require_confirmation: default_require_confirmation(),
        }
    }
}

/// A named alternative coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MostroInstance {
    pub name: String,
    pub pubkey: String,
    pub relays: Vec<String>,
}

/// Client configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// The coordinator's 32-byte hex pubkey.
    pub mostro_pubkey: String,
    pub relays: Vec<String>,
    #[serde(default)]
    pub network: Network,
    #[serde(default)]
    pub limits: Limits,
    #[serde(default = "default_price_api")]
    pub price_api: String,
    #[serde(default = "default_max_premium_deviation")]
    pub max_premium_deviation: f64,
    #[serde(default)]
    pub mostro_instances: Vec<MostroInstance>,
}

fn default_price_api() -> String {
    DEFAULT_PRICE_API.to_string()
}

fn default_max_premium_deviation() -> f64 {
    10.0
}

impl Config {
    /// Load and validate a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|error| {
            EngineError::ConfigInvalid(format!("cannot read {}: {}", path.display(), error))
        })?;
        let config: Config = serde_json::from_str(&text)
            .map_err(|error| EngineError::ConfigInvalid(error.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate field constraints.
    pub fn validate(&self) -> Result<()> {
        if self.mostro_pubkey.len() != 64 || hex::decode(&self.mostro_pubkey).is_err() {
            return Err(EngineError::ConfigInvalid(
                "mostro_pubkey must be 32 bytes of hex".to_string(),
            ));
        }
        if self.relays.is_empty() {
            return Err(EngineError::ConfigInvalid(
                "relays must not be empty".to_string(),
            ));
        }
        for relay in &self.relays {
            if !relay.starts_with("ws://") && !relay.starts_with("wss://") {
                return Err(EngineError::ConfigInvalid(format!(
                    "relay {relay} must be a websocket URL"
                )));
            }
        }
        if self.max_premium_deviation < 0.0 {
            return Err(EngineError::ConfigInvalid(
                "max_premium_deviation must not be negative".to_string(),
            ));
        }
        Ok(())
    }

    /// Switch to a named alternative coordinator.
    pub fn instance(&self, name: &str) -> Option<&MostroInstance> {
        self.mostro_instances
            .iter()
            .find(|instance| instance.name == name)
    }
}

/// Per-user data directory, overridable through the environment.
pub fn data_dir() -> Result<PathBuf> {
    if let Ok(override_path) = std::env::var(ENV_DATA_DIR) {
        let trimmed = override_path.trim();
        if !trimmed.is_empty() {
            return Ok(PathBuf::from(trimmed));
        }
    }

    let home = std::env::var("HOME")
        .map_err(|_| EngineError::ConfigInvalid("HOME is not set".to_string()))?;
    Ok(PathBuf::from(home).join(".mostro-cli"))
}

/// Create the data directory with owner-only permissions.
pub fn ensure_data_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))?;
    }

    Ok(())
}
