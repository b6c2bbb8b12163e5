//! Fiat price oracle.
//!
//! A null or failed oracle response must never block trading: every
//! failure surfaces as `None` and callers fall back or warn.

use std::time::Duration;

use serde_json::Value;
use tracing::warn;

/// Sats-per-fiat-unit assumed when the oracle is unreachable. Deliberately
/// conservative so limit checks overestimate trade size.
pub const FALLBACK_SATS_PER_FIAT: u64 = 1000;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP client for the configured price API.
pub struct PriceOracle {
    url: String,
}

impl PriceOracle {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    /// BTC price in `fiat_code`, or `None` when the oracle fails.
    ///
    /// Expected response shape: `{"BTC": {"<FIAT>": <price>, ...}}`.
    pub async fn btc_price(&self, fiat_code: &str) -> Option<f64> {
        let response = match reqwest::Client::new()
            .get(&self.url)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
        {
            Ok(response) => response,
            Err(error) => {
                warn!("price oracle unreachable: {}", error);
                return None;
            }
        };

        let body: Value = match response.json().await {
            Ok(body) => body,
            Err(error) => {
                warn!("price oracle returned malformed body: {}", error);
                return None;
            }
        };

        let price = extract_price(&body, fiat_code);
        if price.is_none() {
            warn!("price oracle has no {} quote", fiat_code.to_uppercase());
        }
        price
    }
}

fn extract_price(body: &Value, fiat_code: &str) -> Option<f64> {
    let price = body.get("BTC")?.get(fiat_code.to_uppercase())?.as_f64()?;
    (price > 0.0).then_some(price)
}

/// Estimate a fiat amount in sats at `price` BTC/fiat, falling back to the
/// conservative constant when no price is available.
pub fn estimate_sats(fiat_amount: i64, price: Option<f64>) -> u64 {
    match price {
        Some(price) if price > 0.0 => {
            ((fiat_amount as f64 / price) * 100_000_000.0).round().max(0.0) as u64
        }
        _ => fiat_amount.max(0) as u64 * FALLBACK_SATS_PER_FIAT,
    }
}
