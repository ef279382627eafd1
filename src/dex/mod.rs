//! C1: DEX Parser Set. One parser per `dex_kind`, selected by dispatch
//! on the tag rather than a trait-object registry — a new layout means
//! a new `DexKind` variant, not a new implementation slotted in at
//! runtime.

pub mod layouts;
pub mod pumpfun_bonding;
pub mod pumpswap_amm;
pub mod raydium_clmm;
pub mod raydium_v4;

use crate::model::{DexKind, Pool, PoolState};

/// Decode an account-update payload into a `PoolState`. Returns `None`
/// on any decode or validity failure; callers count it, never treat it
/// as an error.
pub fn parse_account(pool: &Pool, data: &[u8], slot: u64) -> Option<PoolState> {
    match pool.dex_kind {
        DexKind::RaydiumV4 => raydium_v4::parse_account(pool, data, slot),
        DexKind::RaydiumClmm => raydium_clmm::parse_account(pool, data, slot),
        DexKind::PumpswapAmm => pumpswap_amm::parse_account(pool, data, slot),
        DexKind::PumpfunBonding => pumpfun_bonding::parse_account(pool, data, slot),
    }
}

/// Decode program-log lines into zero or more `PoolState` deltas, in
/// log order. `raydium_v4`, `raydium_clmm`, and `pumpswap_amm` all carry
/// log-derived swap events in this crate; `pumpfun_bonding` is account-only.
pub fn parse_logs(pool: &Pool, log_lines: &[String], slot: u64, source_sig: Option<String>) -> Vec<PoolState> {
    match pool.dex_kind {
        DexKind::RaydiumV4 => raydium_v4::parse_logs(log_lines)
            .iter()
            .map(|event| raydium_v4::swap_event_to_state(pool, event, slot, source_sig.clone()))
            .collect(),
        DexKind::RaydiumClmm => raydium_clmm::parse_logs(log_lines)
            .iter()
            .filter_map(|event| raydium_clmm::swap_event_to_state(pool, event, slot, source_sig.clone()))
            .collect(),
        DexKind::PumpswapAmm => pumpswap_amm::parse_logs(log_lines)
            .iter()
            .map(|event| pumpswap_amm::swap_event_to_state(pool, event, slot, source_sig.clone()))
            .collect(),
        DexKind::PumpfunBonding => Vec::new(),
    }
}
