//! raydium_v4 parser: constant-product AMM, fixed-offset account layout
//! matching Raydium's `LIQUIDITY_STATE_LAYOUT_V4`.

use super::layouts::{is_plausible_raw_amount, read_u64_le};
use crate::clock::LogicalTime;
use crate::model::{Completeness, DexKind, Pool, PoolState, SourceTier};
use borsh::BorshDeserialize;
use rust_decimal::Decimal;

/// Subset of `LIQUIDITY_STATE_LAYOUT_V4` needed for price extraction.
/// Field order and widths must match the on-chain layout exactly; this
/// is a new `dex_kind` the day that layout changes, never a mutation.
#[derive(Debug, Clone, BorshDeserialize)]
pub struct RaydiumV4Layout {
    pub status: u64,
    pub nonce: u64,
    pub max_order: u64,
    pub depth: u64,
    pub base_decimals: u64,
    pub quote_decimals: u64,
    pub state: u64,
    pub reset_flag: u64,
    pub min_size: u64,
    pub vol_max_cut_ratio: u64,
    pub amount_wave_ratio: u64,
    pub base_lot_size: u64,
    pub quote_lot_size: u64,
    pub min_price_multiplier: u64,
    pub max_price_multiplier: u64,
    pub system_decimals_value: u64,
    pub min_separate_numerator: u64,
    pub min_separate_denominator: u64,
    pub trade_fee_numerator: u64,
    pub trade_fee_denominator: u64,
    pub pnl_numerator: u64,
    pub pnl_denominator: u64,
    pub swap_fee_numerator: u64,
    pub swap_fee_denominator: u64,
    pub base_need_take_pnl: u64,
    pub quote_need_take_pnl: u64,
    pub quote_total_pnl: u64,
    pub base_total_pnl: u64,
    pub pool_base_token_amount: u64,
    pub pool_quote_token_amount: u64,
    pub swap_base_in_amount: u64,
    pub swap_quote_out_amount: u64,
    pub swap_base_out_amount: u64,
    pub swap_quote_in_amount: u64,
    pub base_vault: [u8; 32],
    pub quote_vault: [u8; 32],
    pub base_mint: [u8; 32],
    pub quote_mint: [u8; 32],
    pub lp_mint: [u8; 32],
    pub open_orders: [u8; 32],
    pub market_id: [u8; 32],
    pub market_base_vault: [u8; 32],
    pub market_quote_vault: [u8; 32],
    pub market_authority: [u8; 32],
    pub withdraw_queue: [u8; 32],
    pub lp_vault: [u8; 32],
    pub owner: [u8; 32],
    pub lp_reserve: u64,
    pub padding: [u8; 7],
}

impl RaydiumV4Layout {
    pub fn is_active(&self) -> bool {
        self.status == 6 && self.state == 1
    }
}

/// Decode a base64-decoded account blob into a `PoolState`, returning
/// `None` on any decode/validity failure — callers count it, never fail.
pub fn parse_account(pool: &Pool, data: &[u8], slot: u64) -> Option<PoolState> {
    let layout = RaydiumV4Layout::try_from_slice(data).ok()?;
    if !layout.is_active() {
        return None;
    }
    if layout.pool_base_token_amount == 0 || layout.pool_quote_token_amount == 0 {
        return None;
    }

    Some(PoolState {
        pool: pool.address,
        base_reserve: layout.pool_base_token_amount as u128,
        quote_reserve: layout.pool_quote_token_amount as u128,
        sqrt_price_q64: None,
        at: LogicalTime::now(slot),
        source_sig: None,
        confidence: DexKind::RaydiumV4.account_confidence(),
        tier: SourceTier::StreamAccount,
        completeness: Completeness::Full,
    })
}

/// Compute `price_sol = quote_reserve * 10^(base_decimals - quote_decimals) / base_reserve`.
pub fn price_from_reserves(
    base_reserve: u128,
    quote_reserve: u128,
    base_decimals: u8,
    quote_decimals: u8,
) -> Option<Decimal> {
    if base_reserve == 0 {
        return None;
    }
    let base = Decimal::from(base_reserve);
    let quote = Decimal::from(quote_reserve);
    let exponent = base_decimals as i32 - quote_decimals as i32;
    let scale = Decimal::from(10i64.checked_pow(exponent.unsigned_abs())?);
    let adjusted_quote = if exponent >= 0 {
        quote.checked_mul(scale)?
    } else {
        quote.checked_div(scale)?
    };
    adjusted_quote.checked_div(base)
}

/// Direction of a decoded swap instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapDirection {
    BaseIn,
    BaseOut,
}

/// A decoded swap event from program logs, before it is turned into a
/// `PoolState` delta by the caller (which needs the pool's decimals).
#[derive(Debug, Clone, Copy)]
pub struct SwapEvent {
    pub direction: SwapDirection,
    pub amount_in: u128,
    pub amount_out: u128,
}

/// Parse program log lines for `SwapBaseIn`/`SwapBaseOut` events,
/// filtering out implausible raw amounts. Multiple swap instructions in
/// one transaction yield multiple events, in log order.
pub fn parse_logs(log_lines: &[String]) -> Vec<SwapEvent> {
    let mut events = Vec::new();
    for line in log_lines {
        let Some(direction) = classify_direction(line) else {
            continue;
        };
        let Some(amount_in) = extract_field(line, "amount_in") else {
            continue;
        };
        let Some(amount_out) = extract_field(line, "amount_out") else {
            continue;
        };
        if !is_plausible_raw_amount(amount_in) || !is_plausible_raw_amount(amount_out) {
            continue;
        }
        events.push(SwapEvent {
            direction,
            amount_in,
            amount_out,
        });
    }
    events
}

fn classify_direction(line: &str) -> Option<SwapDirection> {
    if line.contains("SwapBaseIn") {
        Some(SwapDirection::BaseIn)
    } else if line.contains("SwapBaseOut") {
        Some(SwapDirection::BaseOut)
    } else {
        None
    }
}

fn extract_field(line: &str, key: &str) -> Option<u128> {
    let needle = format!("{key}=");
    let start = line.find(&needle)? + needle.len();
    let rest = &line[start..];
    let end = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
    rest[..end].parse().ok()
}

/// Turn a decoded swap event into a partial `PoolState`, deriving a
/// price from the implied swap ratio (not the pool's total reserves).
pub fn swap_event_to_state(
    pool: &Pool,
    event: &SwapEvent,
    slot: u64,
    source_sig: Option<String>,
) -> PoolState {
    let (base_reserve, quote_reserve) = match event.direction {
        SwapDirection::BaseIn => (event.amount_out, event.amount_in),
        SwapDirection::BaseOut => (event.amount_in, event.amount_out),
    };
    PoolState {
        pool: pool.address,
        base_reserve,
        quote_reserve,
        sqrt_price_q64: None,
        at: LogicalTime::now(slot),
        source_sig,
        confidence: DexKind::RaydiumV4.log_confidence(),
        tier: SourceTier::StreamSwap,
        completeness: Completeness::Partial,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DexKind as DK, Mint, PoolAddress};

    fn pool() -> Pool {
        Pool {
            address: PoolAddress([1; 32]),
            dex_kind: DK::RaydiumV4,
            base_mint: Mint([2; 32]),
            quote_mint: Mint([3; 32]),
            base_decimals: 5,
            quote_decimals: 9,
        }
    }

    #[test]
    fn bonk_slot_1000_price_matches_reserve_ratio() {
        // base_reserve=100e5, quote_reserve=1e9, decimals 5 and 9:
        // quote/base = 100, scaled by 10^(5-9) = 0.01.
        let price = price_from_reserves(100 * 100_000, 1_000_000_000, 5, 9).unwrap();
        let expected = Decimal::new(1, 2); // 0.01
        assert_eq!(price, expected);
    }

    #[test]
    fn zero_base_reserve_has_no_price() {
        assert!(price_from_reserves(0, 1_000_000_000, 5, 9).is_none());
    }

    #[test]
    fn log_parser_extracts_swap_base_in() {
        let lines = vec!["Program log: ray_log: SwapBaseIn amount_in=1000000000 amount_out=9500000".to_string()];
        let events = parse_logs(&lines);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].direction, SwapDirection::BaseIn);
        assert_eq!(events[0].amount_in, 1_000_000_000);
    }

    #[test]
    fn log_parser_discards_implausible_amount() {
        let lines = vec![format!(
            "Program log: ray_log: SwapBaseIn amount_in=999999999999999999999999 amount_out=1"
        )];
        assert!(parse_logs(&lines).is_empty());
    }

    #[test]
    fn log_parser_ignores_unrelated_lines() {
        let lines = vec!["Program log: Instruction: InitializePool".to_string()];
        assert!(parse_logs(&lines).is_empty());
    }

    #[test]
    fn account_parse_rejects_inactive_pool() {
        let p = pool();
        // 34 u64 fields + 13 [u8;32] fields + 1 u64 + 7-byte padding,
        // all zero: decodes fine but status/state won't be 6/1.
        let data = vec![0u8; 34 * 8 + 13 * 32 + 8 + 7];
        assert!(parse_account(&p, &data, 1000).is_none());
    }
}
