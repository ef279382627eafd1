//! raydium_clmm parser: concentrated-liquidity, priced off `sqrt_price_q64`.

use super::layouts::{is_plausible_raw_amount, read_i32_le, read_u128_le};
use crate::clock::LogicalTime;
use crate::model::{Completeness, DexKind, Pool, PoolState, SourceTier};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// `sqrt_price_q64` at or above this is a known initialization sentinel
/// (2^96 is the canonical example) rather than a real price.
pub const SQRT_PRICE_SENTINEL_THRESHOLD: u128 = 1u128 << 95;

/// Fixed byte offsets into the CLMM account layout for the fields this
/// parser needs. The full layout carries reward infos and config data
/// this crate has no use for.
mod offset {
    pub const SQRT_PRICE_X64: usize = 0;
    pub const TICK_CURRENT: usize = 16;
}

pub fn parse_account(
    pool: &Pool,
    data: &[u8],
    slot: u64,
) -> Option<PoolState> {
    let sqrt_price_q64 = read_u128_le(data, offset::SQRT_PRICE_X64)?;
    let _tick_current = read_i32_le(data, offset::TICK_CURRENT)?;

    if sqrt_price_q64 >= SQRT_PRICE_SENTINEL_THRESHOLD {
        return None;
    }

    let price = price_from_sqrt_price(sqrt_price_q64, pool.base_decimals, pool.quote_decimals)?;
    let (base_reserve, quote_reserve) = synthetic_reserves_from_price(price)?;

    Some(PoolState {
        pool: pool.address,
        base_reserve,
        quote_reserve,
        sqrt_price_q64: Some(sqrt_price_q64),
        at: LogicalTime::now(slot),
        source_sig: None,
        confidence: DexKind::RaydiumClmm.account_confidence(),
        tier: SourceTier::StreamAccount,
        completeness: Completeness::Full,
    })
}

/// `price = (sqrt_price_q64 / 2^64)^2`, decimal-adjusted by the pool's
/// declared base/quote decimals.
pub fn price_from_sqrt_price(sqrt_price_q64: u128, base_decimals: u8, quote_decimals: u8) -> Option<Decimal> {
    if sqrt_price_q64 >= SQRT_PRICE_SENTINEL_THRESHOLD {
        return None;
    }
    let q64 = 2f64.powi(64);
    let ratio = sqrt_price_q64 as f64 / q64;
    let raw_price = ratio * ratio;
    let decimal_adjustment = 10f64.powi(base_decimals as i32 - quote_decimals as i32);
    let adjusted = raw_price * decimal_adjustment;
    Decimal::from_f64_retain(adjusted)
}

/// The Fuser's weighting wants `base_reserve * quote_reserve`; CLMM pools
/// have no single pair of AMM-style reserves, so this synthesizes a
/// notional pair preserving the price ratio for weighting purposes only.
fn synthetic_reserves_from_price(price: Decimal) -> Option<(u128, u128)> {
    const NOTIONAL_BASE: u128 = 1_000_000_000;
    let price_f64 = price.to_f64()?;
    if price_f64 <= 0.0 || !price_f64.is_finite() {
        return None;
    }
    let quote = (NOTIONAL_BASE as f64 * price_f64) as u128;
    if quote == 0 {
        return None;
    }
    Some((NOTIONAL_BASE, quote))
}

/// A decoded swap event from program logs: the post-swap `sqrt_price_x64`
/// plus the swapped amounts, before it is turned into a `PoolState` delta.
#[derive(Debug, Clone, Copy)]
pub struct SwapEvent {
    pub sqrt_price_q64: u128,
    pub amount_in: u128,
    pub amount_out: u128,
}

/// Parse program log lines for CLMM swap events, reading
/// `sqrt_price_x64`/`amount_in`/`amount_out` off the `ray_log`-style
/// line CLMM swaps emit. Rejects the same sentinel `sqrt_price_x64` and
/// implausible raw amounts the account parser and the V4 log parser do.
pub fn parse_logs(log_lines: &[String]) -> Vec<SwapEvent> {
    let mut events = Vec::new();
    for line in log_lines {
        if !line.contains("sqrt_price_x64") {
            continue;
        }
        let Some(sqrt_price_q64) = extract_field(line, "sqrt_price_x64") else {
            continue;
        };
        let Some(amount_in) = extract_field(line, "amount_in") else {
            continue;
        };
        let Some(amount_out) = extract_field(line, "amount_out") else {
            continue;
        };
        if sqrt_price_q64 >= SQRT_PRICE_SENTINEL_THRESHOLD {
            continue;
        }
        if !is_plausible_raw_amount(amount_in) || !is_plausible_raw_amount(amount_out) {
            continue;
        }
        events.push(SwapEvent {
            sqrt_price_q64,
            amount_in,
            amount_out,
        });
    }
    events
}

fn extract_field(line: &str, key: &str) -> Option<u128> {
    let needle = format!("{key}=");
    let start = line.find(&needle)? + needle.len();
    let rest = &line[start..];
    let end = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
    rest[..end].parse().ok()
}

/// Turn a decoded swap event into a partial `PoolState`, deriving the
/// price from the event's `sqrt_price_x64` rather than the pool's
/// resting account state. `None` if that price can't be derived (the
/// sentinel case is already filtered by `parse_logs`).
pub fn swap_event_to_state(pool: &Pool, event: &SwapEvent, slot: u64, source_sig: Option<String>) -> Option<PoolState> {
    let price = price_from_sqrt_price(event.sqrt_price_q64, pool.base_decimals, pool.quote_decimals)?;
    let (base_reserve, quote_reserve) = synthetic_reserves_from_price(price)?;
    Some(PoolState {
        pool: pool.address,
        base_reserve,
        quote_reserve,
        sqrt_price_q64: Some(event.sqrt_price_q64),
        at: LogicalTime::now(slot),
        source_sig,
        confidence: DexKind::RaydiumClmm.log_confidence(),
        tier: SourceTier::StreamSwap,
        completeness: Completeness::Partial,
    })
}
