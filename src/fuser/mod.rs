//! C4: Price Fuser. Turns the set of `PoolState`s known for a mint into
//! one `TokenPrice`, weighted by confidence and liquidity depth.

use crate::cache::PoolStateCache;
use crate::model::{Completeness, DexKind, Mint, Pool, PoolAddress, PoolState, SourceTier, TokenPrice};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// How far a candidate price may sit from the weight-leading candidate
/// and still be folded into the weighted median, per §4.4.
const AGREEMENT_TOLERANCE: Decimal = Decimal::from_parts(5, 0, 0, false, 2); // 0.05

/// One pool's contribution to the fuse: its derived price_sol and its
/// fuse weight (confidence scaled by liquidity depth).
struct Candidate {
    pool: PoolAddress,
    price_sol: Decimal,
    weight: Decimal,
    confidence: Decimal,
    tier: SourceTier,
}

fn price_from_state(pool: &Pool, state: &PoolState) -> Option<Decimal> {
    match pool.dex_kind {
        DexKind::RaydiumV4 | DexKind::PumpswapAmm | DexKind::PumpfunBonding => {
            crate::dex::raydium_v4::price_from_reserves(
                state.base_reserve,
                state.quote_reserve,
                pool.base_decimals,
                pool.quote_decimals,
            )
        }
        DexKind::RaydiumClmm => {
            let sqrt_price = state.sqrt_price_q64?;
            crate::dex::raydium_clmm::price_from_sqrt_price(sqrt_price, pool.base_decimals, pool.quote_decimals)
        }
    }
}

/// sqrt(base_reserve * quote_reserve), the depth term in the fuse weight.
/// Reserves are u128 raw units; we clamp the product before the sqrt to
/// avoid overflow on pathological inputs.
fn liquidity_weight(base_reserve: u128, quote_reserve: u128) -> Decimal {
    let product = base_reserve.saturating_mul(quote_reserve) as f64;
    let depth = product.sqrt();
    Decimal::from_f64_retain(depth).unwrap_or(Decimal::ZERO)
}

fn source_tier_for(state: &PoolState) -> SourceTier {
    match state.completeness {
        Completeness::Full => state.tier,
        Completeness::Partial => SourceTier::StreamSwap,
    }
}

/// Builds candidates for every pool known to back a mint, fusing them
/// into one `TokenPrice`, weighted by `confidence * liquidity_weight`.
/// Applies no confidence floor of its own; the Oracle gates the fused
/// output against the caller's `min_confidence`.
pub fn fuse(mint: Mint, pools: &[(Pool, PoolState)], sol_usd_reference: Option<Decimal>) -> Option<TokenPrice> {
    let mut candidates: Vec<Candidate> = Vec::new();
    for (pool, state) in pools {
        let Some(price_sol) = price_from_state(pool, state) else {
            continue;
        };
        if price_sol <= Decimal::ZERO {
            continue;
        }
        let weight = state.confidence * liquidity_weight(state.base_reserve, state.quote_reserve);
        candidates.push(Candidate {
            pool: pool.address,
            price_sol,
            weight,
            confidence: state.confidence,
            tier: source_tier_for(state),
        });
    }

    if candidates.is_empty() {
        return None;
    }

    candidates.sort_by(|a, b| b.weight.cmp(&a.weight));
    let leader = &candidates[0];
    let leader_price = leader.price_sol;

    let mut agreeing: Vec<&Candidate> = candidates
        .iter()
        .filter(|c| {
            if leader_price.is_zero() {
                return c.price_sol.is_zero();
            }
            ((c.price_sol - leader_price) / leader_price).abs() <= AGREEMENT_TOLERANCE
        })
        .collect();
    agreeing.sort_by(|a, b| a.price_sol.cmp(&b.price_sol));

    let price_sol = weighted_median(&agreeing);
    let best_pool = leader.pool;
    let confidence = agreeing
        .iter()
        .map(|c| c.confidence)
        .max()
        .unwrap_or(leader.confidence);
    let tier = agreeing.iter().map(|c| c.tier).min().unwrap_or(leader.tier);

    let price_usd = sol_usd_reference.map(|rate| price_sol * rate);

    let at = pools
        .iter()
        .map(|(_, s)| s.at)
        .max()
        .unwrap_or_else(|| crate::clock::LogicalTime::now(0));

    Some(TokenPrice {
        mint,
        price_sol,
        price_usd,
        best_pool: Some(best_pool),
        computed_at: at,
        source_tier: tier,
        confidence,
    })
}

/// Weighted median over candidates already sorted ascending by price.
fn weighted_median(candidates: &[&Candidate]) -> Decimal {
    if candidates.is_empty() {
        return Decimal::ZERO;
    }
    let total: Decimal = candidates.iter().map(|c| c.weight).sum();
    if total <= Decimal::ZERO {
        let mid = candidates.len() / 2;
        return candidates[mid].price_sol;
    }
    let half = total / Decimal::from(2);
    let mut cumulative = Decimal::ZERO;
    for candidate in candidates {
        cumulative += candidate.weight;
        if cumulative >= half {
            return candidate.price_sol;
        }
    }
    candidates.last().unwrap().price_sol
}

struct LastEmit {
    at: Instant,
    price: TokenPrice,
}

/// Coalesces re-fuse requests for the same mint so downstream consumers
/// never see updates closer together than `min_emit_interval`.
pub struct Fuser {
    cache: Arc<PoolStateCache>,
    pools: HashMap<PoolAddress, Pool>,
    pools_by_mint: HashMap<Mint, Vec<PoolAddress>>,
    min_emit_interval: Duration,
    last_emit: Mutex<HashMap<Mint, LastEmit>>,
}

impl Fuser {
    pub fn new(cache: Arc<PoolStateCache>, min_emit_interval: Duration) -> Self {
        Self {
            cache,
            pools: HashMap::new(),
            pools_by_mint: HashMap::new(),
            min_emit_interval,
            last_emit: Mutex::new(HashMap::new()),
        }
    }

    pub fn register_pool(&mut self, pool: Pool) {
        self.pools_by_mint.entry(pool.base_mint).or_default().push(pool.address);
        self.pools.insert(pool.address, pool);
    }

    fn known_states(&self, mint: Mint) -> Vec<(Pool, PoolState)> {
        self.pools_by_mint
            .get(&mint)
            .into_iter()
            .flatten()
            .filter_map(|address| {
                let pool = self.pools.get(address)?.clone();
                let state = self.cache.get(*address)?;
                Some((pool, state))
            })
            .collect()
    }

    /// Recompute the fused price for `mint`, applying coalescing: a
    /// caller polling faster than `min_emit_interval` gets the last
    /// emitted value back unchanged instead of a fresh recomputation.
    pub async fn price_for(&self, mint: Mint, sol_usd_reference: Option<Decimal>) -> Option<TokenPrice> {
        let mut last_emit = self.last_emit.lock().await;
        if let Some(entry) = last_emit.get(&mint) {
            if entry.at.elapsed() < self.min_emit_interval {
                return Some(entry.price.clone());
            }
        }

        let states = self.known_states(mint);
        let fused = fuse(mint, &states, sol_usd_reference)?;
        last_emit.insert(
            mint,
            LastEmit {
                at: Instant::now(),
                price: fused.clone(),
            },
        );
        Some(fused)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::LogicalTime;
    use crate::model::{Completeness, DexKind, Mint, Pool, PoolAddress, SourceTier};

    fn pool(address: u8, base_decimals: u8, quote_decimals: u8) -> Pool {
        Pool {
            address: PoolAddress([address; 32]),
            dex_kind: DexKind::RaydiumV4,
            base_mint: Mint([99; 32]),
            quote_mint: Mint([0; 32]),
            base_decimals,
            quote_decimals,
        }
    }

    fn state(slot: u64, base: u128, quote: u128, confidence: i64) -> PoolState {
        PoolState {
            pool: PoolAddress([0; 32]),
            base_reserve: base,
            quote_reserve: quote,
            sqrt_price_q64: None,
            at: LogicalTime::now(slot),
            source_sig: None,
            confidence: Decimal::new(confidence, 1),
            tier: SourceTier::StreamAccount,
            completeness: Completeness::Full,
        }
    }

    #[test]
    fn single_pool_price_matches_reserve_ratio() {
        let pool = pool(1, 5, 9);
        let state = state(1000, 100 * 100_000, 1_000_000_000, 9);
        let fused = fuse(Mint([99; 32]), &[(pool, state)], None).unwrap();
        assert_eq!(fused.price_sol, Decimal::new(1, 2));
    }

    #[test]
    fn best_pool_is_the_highest_weight_candidate() {
        let deep_pool = pool(1, 5, 9);
        let deep_state = state(1000, 100_000_000_000, 1_000_000_000_000, 9);
        let thin_pool = pool(2, 5, 9);
        let thin_state = state(1000, 100_000, 1_000_000, 9);

        let fused = fuse(Mint([99; 32]), &[(deep_pool, deep_state), (thin_pool, thin_state)], None).unwrap();
        assert_eq!(fused.best_pool, Some(PoolAddress([1; 32])));
    }

    #[test]
    fn disagreeing_outlier_is_excluded_from_the_median() {
        let agreeing_a = pool(1, 5, 9);
        let agreeing_a_state = state(1000, 100_000_000, 1_000_000_000, 9);
        let agreeing_b = pool(2, 5, 9);
        let agreeing_b_state = state(1000, 100_000_000, 1_000_000_000, 9);
        let outlier = pool(3, 5, 9);
        let mut outlier_state = state(1000, 1_000_000_000, 1_000_000_000, 9);
        outlier_state.base_reserve = 1;

        let fused = fuse(
            Mint([99; 32]),
            &[
                (agreeing_a, agreeing_a_state),
                (agreeing_b, agreeing_b_state),
                (outlier, outlier_state),
            ],
            None,
        )
        .unwrap();
        assert_eq!(fused.price_sol, Decimal::new(1, 2));
    }

    #[test]
    fn price_usd_derives_from_sol_reference() {
        let pool = pool(1, 5, 9);
        let state = state(1000, 100 * 100_000, 1_000_000_000, 9);
        let fused = fuse(Mint([99; 32]), &[(pool, state)], Some(Decimal::new(150, 0))).unwrap();
        assert_eq!(fused.price_usd, Some(Decimal::new(15, 1)));
    }

    #[test]
    fn low_confidence_candidate_still_fuses_with_reduced_weight() {
        // fuse() itself applies no confidence floor; gating on
        // min_confidence is the Oracle's responsibility.
        let pool = pool(1, 5, 9);
        let state = state(1000, 100 * 100_000, 1_000_000_000, 3);
        let fused = fuse(Mint([99; 32]), &[(pool, state)], None).unwrap();
        assert_eq!(fused.confidence, Decimal::new(3, 1));
    }

    #[tokio::test]
    async fn coalesces_rapid_repeated_queries() {
        let cache = Arc::new(PoolStateCache::new());
        let mint = Mint([99; 32]);
        let pool_def = pool(1, 5, 9);
        let mut fused_state = state(1000, 100 * 100_000, 1_000_000_000, 9);
        fused_state.pool = pool_def.address;
        cache.apply_delta(fused_state);

        let mut fuser = Fuser::new(cache.clone(), Duration::from_secs(60));
        fuser.register_pool(pool_def.clone());

        let first = fuser.price_for(mint, None).await.unwrap();
        let mut advanced_state = state(1001, 1, 1, 9);
        advanced_state.pool = pool_def.address;
        cache.apply_delta(advanced_state);
        let second = fuser.price_for(mint, None).await.unwrap();
        assert_eq!(first.price_sol, second.price_sol);
    }
}
