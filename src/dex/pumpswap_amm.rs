//! pumpswap_amm parser: constant-product AMM with separate base/quote
//! token accounts and an explicit decimals field (unlike raydium_v4,
//! which derives decimals from pool metadata alone).

use super::layouts::{is_plausible_raw_amount, read_u64_le, read_u8};
use crate::clock::LogicalTime;
use crate::model::{Completeness, DexKind, Pool, PoolState, SourceTier};

mod offset {
    pub const BASE_BALANCE: usize = 0;
    pub const QUOTE_BALANCE: usize = 8;
    pub const BASE_DECIMALS: usize = 16;
}

pub fn parse_account(pool: &Pool, data: &[u8], slot: u64) -> Option<PoolState> {
    let base_balance = read_u64_le(data, offset::BASE_BALANCE)?;
    let quote_balance = read_u64_le(data, offset::QUOTE_BALANCE)?;
    let _base_decimals = read_u8(data, offset::BASE_DECIMALS)?;

    if base_balance == 0 || quote_balance == 0 {
        return None;
    }

    Some(PoolState {
        pool: pool.address,
        base_reserve: base_balance as u128,
        quote_reserve: quote_balance as u128,
        sqrt_price_q64: None,
        at: LogicalTime::now(slot),
        source_sig: None,
        confidence: DexKind::PumpswapAmm.account_confidence(),
        tier: SourceTier::StreamAccount,
        completeness: Completeness::Full,
    })
}

/// A decoded `sol_amount`/`token_amount` swap pair from program logs.
#[derive(Debug, Clone, Copy)]
pub struct SwapEvent {
    pub sol_amount: u128,
    pub token_amount: u128,
}

pub fn parse_logs(log_lines: &[String]) -> Vec<SwapEvent> {
    let mut events = Vec::new();
    for line in log_lines {
        if !line.contains("sol_amount") || !line.contains("token_amount") {
            continue;
        }
        let Some(sol_amount) = extract_field(line, "sol_amount") else {
            continue;
        };
        let Some(token_amount) = extract_field(line, "token_amount") else {
            continue;
        };
        if !is_plausible_raw_amount(sol_amount) || !is_plausible_raw_amount(token_amount) {
            continue;
        }
        events.push(SwapEvent { sol_amount, token_amount });
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

pub fn swap_event_to_state(pool: &Pool, event: &SwapEvent, slot: u64, source_sig: Option<String>) -> PoolState {
    PoolState {
        pool: pool.address,
        base_reserve: event.token_amount,
        quote_reserve: event.sol_amount,
        sqrt_price_q64: None,
        at: LogicalTime::now(slot),
        source_sig,
        confidence: DexKind::PumpswapAmm.log_confidence(),
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
            address: PoolAddress([4; 32]),
            dex_kind: DK::PumpswapAmm,
            base_mint: Mint([2; 32]),
            quote_mint: Mint([3; 32]),
            base_decimals: 6,
            quote_decimals: 9,
        }
    }

    #[test]
    fn account_parse_reads_balances() {
        let mut data = vec![0u8; 32];
        data[0..8].copy_from_slice(&500_000u64.to_le_bytes());
        data[8..16].copy_from_slice(&9_000_000u64.to_le_bytes());
        data[16] = 6;

        let state = parse_account(&pool(), &data, 42).unwrap();
        assert_eq!(state.base_reserve, 500_000);
        assert_eq!(state.quote_reserve, 9_000_000);
        assert_eq!(state.completeness, Completeness::Full);
    }

    #[test]
    fn account_parse_rejects_zero_balance() {
        let data = vec![0u8; 32];
        assert!(parse_account(&pool(), &data, 42).is_none());
    }

    #[test]
    fn log_parser_extracts_swap() {
        let lines = vec!["Program log: sol_amount=1000000 token_amount=2000000".to_string()];
        let events = parse_logs(&lines);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].sol_amount, 1_000_000);
    }
}
