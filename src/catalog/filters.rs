//! Admission rules for new catalog candidates: minimum liquidity, a
//! minimum pool age before it's trusted, and an explicit blocklist.
//! Mirrors the shape of a rug/trending filter — a threshold check per
//! rule, returning every rule the candidate failed rather than just the
//! first one, so callers can log the full picture.

use crate::model::Mint;
use rust_decimal::Decimal;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    BelowMinLiquidity,
    TooNew,
    Blocklisted,
}

#[derive(Debug, Clone)]
pub struct FilterConfig {
    pub min_liquidity_sol: Decimal,
    pub min_pool_age_ms: u64,
    pub blocklist: HashSet<Mint>,
}

impl FilterConfig {
    pub fn permissive() -> Self {
        Self {
            min_liquidity_sol: Decimal::ZERO,
            min_pool_age_ms: 0,
            blocklist: HashSet::new(),
        }
    }
}

/// Evaluate one candidate; an empty result means every rule passed.
pub fn evaluate(
    mint: &Mint,
    liquidity_sol: Decimal,
    age_ms: u64,
    config: &FilterConfig,
) -> Vec<RejectReason> {
    let mut reasons = Vec::new();
    if config.blocklist.contains(mint) {
        reasons.push(RejectReason::Blocklisted);
    }
    if liquidity_sol < config.min_liquidity_sol {
        reasons.push(RejectReason::BelowMinLiquidity);
    }
    if age_ms < config.min_pool_age_ms {
        reasons.push(RejectReason::TooNew);
    }
    reasons
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> FilterConfig {
        FilterConfig {
            min_liquidity_sol: Decimal::new(10, 0),
            min_pool_age_ms: 60_000,
            blocklist: HashSet::new(),
        }
    }

    #[test]
    fn passes_when_all_thresholds_met() {
        let mint = Mint([1; 32]);
        assert!(evaluate(&mint, Decimal::new(20, 0), 120_000, &config()).is_empty());
    }

    #[test]
    fn flags_low_liquidity() {
        let mint = Mint([1; 32]);
        let reasons = evaluate(&mint, Decimal::new(1, 0), 120_000, &config());
        assert_eq!(reasons, vec![RejectReason::BelowMinLiquidity]);
    }

    #[test]
    fn flags_blocklisted_and_new_together() {
        let mint = Mint([1; 32]);
        let mut cfg = config();
        cfg.blocklist.insert(mint);
        let reasons = evaluate(&mint, Decimal::new(20, 0), 10, &cfg);
        assert_eq!(reasons, vec![RejectReason::Blocklisted, RejectReason::TooNew]);
    }
}
