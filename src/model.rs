//! Core data model shared by every component: `Mint`, `Pool`, `PoolState`,
//! `TokenPrice`, `Subscription`, `EndpointConnection`.
//!
//! Prices are `Decimal`, never `f64` — floats may only appear at the
//! output/presentation boundary (`output::formatter`).

use crate::clock::LogicalTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 32-byte Solana address identifying a token. Immutable once created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Mint(pub [u8; 32]);

impl Mint {
    pub fn from_base58(s: &str) -> Option<Self> {
        let bytes = bs58_decode(s)?;
        if bytes.len() != 32 {
            return None;
        }
        let mut out = [0u8; 32];
        out.copy_from_slice(&bytes);
        Some(Self(out))
    }
}

impl fmt::Display for Mint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", bs58_encode(&self.0))
    }
}

/// 32-byte Solana address identifying a liquidity venue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PoolAddress(pub [u8; 32]);

impl fmt::Display for PoolAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", bs58_encode(&self.0))
    }
}

/// Which DEX family a pool belongs to. A new on-chain layout is a new
/// variant, never a mutation of an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DexKind {
    RaydiumV4,
    RaydiumClmm,
    PumpswapAmm,
    PumpfunBonding,
}

impl DexKind {
    /// Base account-parse confidence for this family, per the parser contract.
    pub fn account_confidence(&self) -> Decimal {
        match self {
            DexKind::RaydiumV4 => Decimal::new(9, 1),
            DexKind::RaydiumClmm => Decimal::new(7, 1),
            DexKind::PumpswapAmm => Decimal::new(9, 1),
            DexKind::PumpfunBonding => Decimal::new(9, 1),
        }
    }

    /// Base log-parse confidence for this family, where logs carry a
    /// derived swap event rather than the authoritative account state.
    pub fn log_confidence(&self) -> Decimal {
        match self {
            DexKind::RaydiumV4 => Decimal::new(7, 1),
            DexKind::RaydiumClmm => Decimal::new(7, 1),
            DexKind::PumpswapAmm => Decimal::new(8, 1),
            DexKind::PumpfunBonding => Decimal::new(9, 1),
        }
    }
}

/// Immutable once created: the pool's identity, decimals, and DEX family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pool {
    pub address: PoolAddress,
    pub dex_kind: DexKind,
    pub base_mint: Mint,
    pub quote_mint: Mint,
    pub base_decimals: u8,
    pub quote_decimals: u8,
}

/// Where a PoolState delta or TokenPrice ultimately derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SourceTier {
    StreamAccount,
    StreamSwap,
    HttpQuote,
    HttpPair,
    StaleStream,
}

/// Whether a PoolState carries both reserves (full) or only a
/// swap-direction observation (partial). A partial state must never
/// overwrite a full state from the same or newer slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Completeness {
    Full,
    Partial,
}

/// Mutable reflection of an on-chain pool, versioned by slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolState {
    pub pool: PoolAddress,
    pub base_reserve: u128,
    pub quote_reserve: u128,
    pub sqrt_price_q64: Option<u128>,
    pub at: LogicalTime,
    pub source_sig: Option<String>,
    pub confidence: Decimal,
    pub tier: SourceTier,
    pub completeness: Completeness,
}

impl PoolState {
    /// `true` if this state would be accepted by `apply_delta` over `current`,
    /// per the slot-monotonic / tier-then-confidence tie-break rule in C3.
    pub fn supersedes(&self, current: Option<&PoolState>) -> bool {
        let current = match current {
            None => return true,
            Some(c) => c,
        };
        if self.at.slot != current.at.slot {
            return self.at.slot > current.at.slot;
        }
        if self.completeness == Completeness::Partial && current.completeness == Completeness::Full
        {
            return false;
        }
        // Two log-derived (StreamSwap) deltas at the same slot carry no
        // ordering information beyond slot order: neither may supersede
        // the other, so the first one seen wins.
        if self.tier == SourceTier::StreamSwap && current.tier == SourceTier::StreamSwap {
            return false;
        }
        match self.tier.cmp(&current.tier) {
            std::cmp::Ordering::Less => true,
            std::cmp::Ordering::Greater => false,
            std::cmp::Ordering::Equal => self.confidence >= current.confidence,
        }
    }

    pub fn is_valid_amm_state(&self) -> bool {
        self.base_reserve > 0 && self.quote_reserve > 0
    }
}

/// Per-mint best-known price, strictly separating SOL- and USD-denominated
/// values (source code conflates these; this model never does).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPrice {
    pub mint: Mint,
    pub price_sol: Decimal,
    pub price_usd: Option<Decimal>,
    pub best_pool: Option<PoolAddress>,
    pub computed_at: LogicalTime,
    pub source_tier: SourceTier,
    pub confidence: Decimal,
}

/// Freshness classification relative to configured TTLs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Fresh,
    Stale,
    Expired,
}

impl TokenPrice {
    pub fn freshness(&self, fresh_ttl_ms: u64, expire_ttl_ms: u64) -> Freshness {
        let age = self.computed_at.age_ms();
        if age <= fresh_ttl_ms {
            Freshness::Fresh
        } else if age <= expire_ttl_ms {
            Freshness::Stale
        } else {
            Freshness::Expired
        }
    }
}

/// Registration priority for a monitored mint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Priority {
    High,
    Low,
}

/// Kind of WebSocket subscription a pool can have open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubscriptionKind {
    AccountUpdates,
    ProgramLogs,
}

/// A (mint, pool, dex_kind) triple under active registry management.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub mint: Mint,
    pub pool: PoolAddress,
    pub dex_kind: DexKind,
    pub priority: Priority,
}

/// Lifecycle state of one logical WebSocket connection to an RPC provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointState {
    Connecting,
    Open,
    Degraded,
    Closed,
}

/// Minimal base58 codec so the crate has no extra dependency for address
/// display; Solana addresses are 32 raw bytes everywhere else in this crate.
fn bs58_encode(bytes: &[u8]) -> String {
    const ALPHABET: &[u8] = b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";
    let mut digits = vec![0u8];
    for &byte in bytes {
        let mut carry = byte as u32;
        for digit in digits.iter_mut() {
            carry += (*digit as u32) << 8;
            *digit = (carry % 58) as u8;
            carry /= 58;
        }
        while carry > 0 {
            digits.push((carry % 58) as u8);
            carry /= 58;
        }
    }
    for &byte in bytes {
        if byte == 0 {
            digits.push(0);
        } else {
            break;
        }
    }
    digits.reverse();
    digits.into_iter().map(|d| ALPHABET[d as usize] as char).collect()
}

fn bs58_decode(s: &str) -> Option<Vec<u8>> {
    const ALPHABET: &[u8] = b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";
    let mut bytes = vec![0u8];
    for c in s.chars() {
        let value = ALPHABET.iter().position(|&a| a as char == c)? as u32;
        let mut carry = value;
        for byte in bytes.iter_mut() {
            carry += (*byte as u32) * 58;
            *byte = (carry & 0xff) as u8;
            carry >>= 8;
        }
        while carry > 0 {
            bytes.push((carry & 0xff) as u8);
            carry >>= 8;
        }
    }
    for c in s.chars() {
        if c == '1' {
            bytes.push(0);
        } else {
            break;
        }
    }
    bytes.reverse();
    Some(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(slot: u64, tier: SourceTier, completeness: Completeness, confidence: i64) -> PoolState {
        PoolState {
            pool: PoolAddress([1; 32]),
            base_reserve: 100,
            quote_reserve: 200,
            sqrt_price_q64: None,
            at: LogicalTime::now(slot),
            source_sig: None,
            confidence: Decimal::new(confidence, 1),
            tier,
            completeness,
        }
    }

    #[test]
    fn newer_slot_always_supersedes() {
        let current = state(100, SourceTier::StreamSwap, Completeness::Full, 7);
        let next = state(101, SourceTier::StreamSwap, Completeness::Partial, 1);
        assert!(next.supersedes(Some(&current)));
    }

    #[test]
    fn older_slot_never_supersedes() {
        let current = state(100, SourceTier::StreamSwap, Completeness::Full, 7);
        let next = state(99, SourceTier::StreamAccount, Completeness::Full, 9);
        assert!(!next.supersedes(Some(&current)));
    }

    #[test]
    fn same_slot_account_beats_log() {
        let current = state(100, SourceTier::StreamSwap, Completeness::Partial, 7);
        let next = state(100, SourceTier::StreamAccount, Completeness::Full, 9);
        assert!(next.supersedes(Some(&current)));
    }

    #[test]
    fn same_slot_partial_never_overwrites_full() {
        let current = state(100, SourceTier::StreamAccount, Completeness::Full, 9);
        let next = state(100, SourceTier::StreamAccount, Completeness::Partial, 9);
        assert!(!next.supersedes(Some(&current)));
    }

    #[test]
    fn same_slot_log_never_supersedes_another_log() {
        let current = state(100, SourceTier::StreamSwap, Completeness::Partial, 5);
        let next = state(100, SourceTier::StreamSwap, Completeness::Partial, 9);
        assert!(!next.supersedes(Some(&current)));
        assert!(!current.supersedes(Some(&next)));
    }

    #[test]
    fn base58_roundtrip() {
        let mint = Mint([7u8; 32]);
        let encoded = mint.to_string();
        let decoded = Mint::from_base58(&encoded).unwrap();
        assert_eq!(mint, decoded);
    }
}
