//! Trade safety envelope.
//!
//! Limits are checked before any new trade leaves the machine, in a fixed
//! order: per-trade size, daily volume, daily count, cooldown. The
//! market-price deviation check protects against mispriced orders but
//! fails open when the oracle is down.

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::config::Limits;
use crate::state::{date_key, TradeState};

/// Why a trade was refused.
#[derive(Debug, Clone, PartialEq)]
pub enum LimitViolation {
    TradeTooLarge { amount_sats: u64, max: u64 },
    DailyVolumeExceeded { would_be: u64, max: u64 },
    TooManyTrades { today: u32, max: u32 },
    CooldownActive { remaining_seconds: u64 },
}

impl std::fmt::Display for LimitViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LimitViolation::TradeTooLarge { amount_sats, max } => {
                write!(f, "amount {amount_sats} exceeds max trade amount {max}")
            }
            LimitViolation::DailyVolumeExceeded { would_be, max } => {
                write!(f, "daily volume would reach {would_be}, above the {max} cap")
            }
            LimitViolation::TooManyTrades { today, max } => {
                write!(f, "{today} trades today already, max is {max}")
            }
            LimitViolation::CooldownActive { remaining_seconds } => {
                write!(f, "cooldown active for another {remaining_seconds}s")
            }
        }
    }
}

/// Result of the deviation check.
#[derive(Debug, Clone, PartialEq)]
pub enum PriceCheck {
    /// Within the configured band, or declared premium acceptable.
    Ok,
    /// The oracle was unreachable; trading proceeds with a warning.
    OracleUnavailable,
    /// Outside the band; the trade should not proceed.
    Deviates { deviation_percent: f64, max: f64 },
}

/// Enforce the configured limits against the current state.
pub fn check_limits(
    limits: &Limits,
    state: &TradeState,
    amount_sats: u64,
    now: DateTime<Utc>,
) -> Result<(), LimitViolation> {
    if amount_sats > limits.max_trade_amount_sats {
        return Err(LimitViolation::TradeTooLarge {
            amount_sats,
            max: limits.max_trade_amount_sats,
        });
    }

    let today = date_key(now);
    let would_be = state.volume_for(&today) + amount_sats;
    if would_be > limits.max_daily_volume_sats {
        return Err(LimitViolation::DailyVolumeExceeded {
            would_be,
            max: limits.max_daily_volume_sats,
        });
    }

    let today_count = state.trades_for(&today);
    if today_count >= limits.max_trades_per_day {
        return Err(LimitViolation::TooManyTrades {
            today: today_count,
            max: limits.max_trades_per_day,
        });
    }

    let elapsed = (now.timestamp().max(0) as u64).saturating_sub(state.last_trade_at);
    if state.last_trade_at > 0 && elapsed < limits.cooldown_seconds {
        return Err(LimitViolation::CooldownActive {
            remaining_seconds: limits.cooldown_seconds - elapsed,
        });
    }

    Ok(())
}

/// Compare an order against the oracle market price.
///
/// A declared premium is compared directly against the band. Otherwise,
/// when the order fixes both sats and fiat, the implied price is compared
/// against the market. Without an oracle price the check passes with a
/// warning rather than blocking the trade.
pub fn check_price_deviation(
    premium: Option<i64>,
    amount_sats: u64,
    fiat_amount: f64,
    market_price: Option<f64>,
    max_deviation_percent: f64,
) -> PriceCheck {
    if let Some(premium) = premium {
        if premium != 0 {
            let deviation = premium.unsigned_abs() as f64;
            if deviation > max_deviation_percent {
                return PriceCheck::Deviates {
                    deviation_percent: premium as f64,
                    max: max_deviation_percent,
                };
            }
            return PriceCheck::Ok;
        }
    }

    let Some(market) = market_price else {
        warn!("price oracle unavailable, skipping deviation check");
        return PriceCheck::OracleUnavailable;
    };

    if amount_sats == 0 || fiat_amount <= 0.0 {
        // Market-priced or range order: nothing to compare yet.
        return PriceCheck::Ok;
    }

    let effective_price = fiat_amount / (amount_sats as f64 / 100_000_000.0);
    let deviation_percent = (effective_price - market) / market * 100.0;
    if deviation_percent.abs() > max_deviation_percent {
        return PriceCheck::Deviates {
            deviation_percent,
            max: max_deviation_percent,
        };
    }
    PriceCheck::Ok
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> Limits {
        Limits {
            max_trade_amount_sats: 50_000,
            max_daily_volume_sats: 100_000,
            max_trades_per_day: 3,
            cooldown_seconds: 300,
            require_confirmation: true,
        }
    }

    #[test]
    fn oversized_trade_is_rejected() {
        let state = TradeState::default();
        let result = check_limits(&limits(), &state, 60_000, Utc::now());
        assert!(matches!(result, Err(LimitViolation::TradeTooLarge { .. })));
    }

    #[test]
    fn daily_volume_is_monotonic() {
        let mut state = TradeState::default();
        let now = Utc::now();

        check_limits(&limits(), &state, 40_000, now).unwrap();
        state.record_trade(40_000, now);
        state.last_trade_at = 0; // isolate the volume check from cooldown

        check_limits(&limits(), &state, 50_000, now).unwrap();
        state.record_trade(50_000, now);
        state.last_trade_at = 0;

        // 90k recorded; 20k more would cross the 100k cap.
        let result = check_limits(&limits(), &state, 20_000, now);
        assert!(matches!(
            result,
            Err(LimitViolation::DailyVolumeExceeded { would_be: 110_000, .. })
        ));
    }

    #[test]
    fn trade_count_cap_applies() {
        let mut state = TradeState::default();
        let now = Utc::now();
        for _ in 0..3 {
            state.record_trade(1_000, now);
        }
        state.last_trade_at = 0;

        let result = check_limits(&limits(), &state, 1_000, now);
        assert!(matches!(result, Err(LimitViolation::TooManyTrades { .. })));
    }

    #[test]
    fn cooldown_blocks_rapid_fire() {
        let mut state = TradeState::default();
        let now = Utc::now();
        state.record_trade(1_000, now - chrono::Duration::seconds(30));

        let result = check_limits(&limits(), &state, 1_000, now);
        assert!(matches!(
            result,
            Err(LimitViolation::CooldownActive { .. })
        ));

        let later = now + chrono::Duration::seconds(300);
        check_limits(&limits(), &state, 1_000, later).unwrap();
    }

    #[test]
    fn declared_premium_is_compared_directly() {
        assert_eq!(check_price_deviation(Some(5), 0, 0.0, None, 10.0), PriceCheck::Ok);
        assert!(matches!(
            check_price_deviation(Some(-15), 0, 0.0, None, 10.0),
            PriceCheck::Deviates { .. }
        ));
    }

    #[test]
    fn implied_price_is_checked_against_market() {
        // 100k sats for $35 at $30k/BTC: ~16.7% above market.
        let result = check_price_deviation(Some(0), 100_000, 35.0, Some(30_000.0), 10.0);
        assert!(matches!(result, PriceCheck::Deviates { .. }));

        // $31 is ~3.3% above market: fine.
        let result = check_price_deviation(Some(0), 100_000, 31.0, Some(30_000.0), 10.0);
        assert_eq!(result, PriceCheck::Ok);
    }

    #[test]
    fn oracle_outage_fails_open() {
        let result = check_price_deviation(Some(0), 100_000, 35.0, None, 10.0);
        assert_eq!(result, PriceCheck::OracleUnavailable);
    }

    #[test]
    fn market_priced_orders_skip_the_implied_check() {
        let result = check_price_deviation(None, 0, 100.0, Some(30_000.0), 10.0);
        assert_eq!(result, PriceCheck::Ok);
    }
}
