//! Trade orchestration and safety envelope for the Mostro client.
//!
//! Module boundaries:
//! - `engine`: per-action orchestration against one coordinator
//! - `safety`: limits, cooldown, market-price deviation
//! - `audit`: append-only journal
//! - `state`: trade-index cursor, daily counters, order-index map
//! - `config` / `price`: configuration file and fiat oracle

pub mod audit;
pub mod config;
pub mod engine;
pub mod error;
pub mod price;
pub mod safety;
pub mod state;

pub use audit::{AuditEntry, AuditJournal, AuditResult};
pub use config::{data_dir, Config, Limits, MostroInstance, Network};
pub use engine::{NewOrderParams, TradeEngine, TradeOutcome};
pub use error::{EngineError, Result};
pub use price::PriceOracle;
pub use safety::{LimitViolation, PriceCheck};
pub use state::TradeState;
