//! Persisted trade state.
//!
//! One JSON file holds the trade-index cursor, the rolling daily
//! counters, and the order-to-trade-index map. Writes are whole-file
//! rewrites with owner-only permissions; reads tolerate an absent file.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;

/// Counter entries older than this are pruned on write.
const COUNTER_RETENTION_DAYS: i64 = 7;

/// File-backed client state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeState {
    /// Next unused trade-key index. Index 0 is the identity key.
    #[serde(default = "default_next_trade_index")]
    pub next_trade_index: u32,
    /// Satoshi volume per UTC date (`YYYY-MM-DD`).
    #[serde(default)]
    pub daily_volume: BTreeMap<String, u64>,
    /// Trade count per UTC date.
    #[serde(default)]
    pub daily_trades: BTreeMap<String, u32>,
    /// Unix time of the most recent trade.
    #[serde(default)]
    pub last_trade_at: u64,
    /// Which trade-key index was used for which order.
    #[serde(default)]
    pub order_index_map: BTreeMap<Uuid, u32>,
}

fn default_next_trade_index() -> u32 {
    1
}

impl Default for TradeState {
    fn default() -> Self {
        Self {
            next_trade_index: default_next_trade_index(),
            daily_volume: BTreeMap::new(),
            daily_trades: BTreeMap::new(),
            last_trade_at: 0,
            order_index_map: BTreeMap::new(),
        }
    }
}

impl TradeState {
    /// Load state, defaulting when the file does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Rewrite the state file, pruning stale counters first.
    pub fn save(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.prune_counters(Utc::now());

        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        Ok(())
    }

    /// Allocate the next trade-key index, advancing the cursor.
    pub fn allocate_trade_index(&mut self) -> u32 {
        let index = self.next_trade_index;
        self.next_trade_index += 1;
        index
    }

    /// Force the cursor, as session restore does.
    pub fn set_trade_index(&mut self, index: u32) {
        self.next_trade_index = index.max(1);
    }

    /// The trade-key index recorded for `order_id`, if any.
    pub fn index_for_order(&self, order_id: &Uuid) -> Option<u32> {
        self.order_index_map.get(order_id).copied()
    }

    /// Remember which index served `order_id`.
    pub fn record_order_index(&mut self, order_id: Uuid, index: u32) {
        self.order_index_map.insert(order_id, index);
    }

    /// Today's recorded satoshi volume.
    pub fn volume_for(&self, date: &str) -> u64 {
        self.daily_volume.get(date).copied().unwrap_or_default()
    }

    /// Today's recorded trade count.
    pub fn trades_for(&self, date: &str) -> u32 {
        self.daily_trades.get(date).copied().unwrap_or_default()
    }

    /// Record a trade of `amount_sats` at `now`.
    pub fn record_trade(&mut self, amount_sats: u64, now: DateTime<Utc>) {
        let date = date_key(now);
        *self.daily_volume.entry(date.clone()).or_default() += amount_sats;
        *self.daily_trades.entry(date).or_default() += 1;
        self.last_trade_at = now.timestamp().max(0) as u64;
    }

    fn prune_counters(&mut self, now: DateTime<Utc>) {
        let cutoff = date_key(now - chrono::Duration::days(COUNTER_RETENTION_DAYS));
        self.daily_volume.retain(|date, _| *date >= cutoff);
        self.daily_trades.retain(|date, _| *date >= cutoff);
    }
}

/// UTC date key in `YYYY-MM-DD` form.
pub fn date_key(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d").to_string()
}
