//! C6: Fallback Orchestrator. One entry point (`Oracle::price_for`)
//! that tries progressively slower, progressively less-authoritative
//! sources until one answers, tracking each tier's recent health so a
//! persistently failing tier can be deprioritized without ever being
//! hard disabled — the policy is fail-open throughout.

use crate::cache::PoolStateCache;
use crate::errors::OracleError;
use crate::fuser::Fuser;
use crate::http::aggregator::AggregatorQuoteAdapter;
use crate::http::pair_metadata::PairMetadataAdapter;
use crate::http::sol_reference::SolReferenceAdapter;
use crate::model::{Freshness, Mint, Pool, SourceTier, TokenPrice};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;

/// Exponential-moving-average health score in `[0, 1]` for one fallback
/// tier, used only for observability and ordering hints — never to
/// hard-disable a tier.
pub struct TierHealth {
    ema: Mutex<f64>,
}

impl TierHealth {
    fn new() -> Self {
        Self { ema: Mutex::new(1.0) }
    }

    fn record(&self, success: bool) {
        const ALPHA: f64 = 0.2;
        let sample = if success { 1.0 } else { 0.0 };
        let mut ema = self.ema.lock().unwrap();
        *ema = ALPHA * sample + (1.0 - ALPHA) * *ema;
    }

    pub fn score(&self) -> f64 {
        *self.ema.lock().unwrap()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    FuserLive,
    AggregatorHttp,
    PairMetadataHttp,
    StaleStream,
}

pub struct Oracle {
    fuser: Fuser,
    aggregator: Option<AggregatorQuoteAdapter>,
    pair_metadata: Option<PairMetadataAdapter>,
    sol_reference: Option<SolReferenceAdapter>,
    cache: std::sync::Arc<PoolStateCache>,
    health: HashMap<Tier, TierHealth>,
    /// Absolute ceiling on answer age: no tier, including the
    /// stale-stream tier of last resort, may ever answer with data
    /// older than this, regardless of the caller's requested `max_age`.
    expire_ttl: Duration,
}

impl Oracle {
    pub fn new(
        fuser: Fuser,
        cache: std::sync::Arc<PoolStateCache>,
        aggregator: Option<AggregatorQuoteAdapter>,
        pair_metadata: Option<PairMetadataAdapter>,
        sol_reference: Option<SolReferenceAdapter>,
        expire_ttl: Duration,
    ) -> Self {
        let mut health = HashMap::new();
        health.insert(Tier::FuserLive, TierHealth::new());
        health.insert(Tier::AggregatorHttp, TierHealth::new());
        health.insert(Tier::PairMetadataHttp, TierHealth::new());
        health.insert(Tier::StaleStream, TierHealth::new());
        Self {
            fuser,
            aggregator,
            pair_metadata,
            sol_reference,
            cache,
            health,
            expire_ttl,
        }
    }

    pub fn tier_health(&self, tier: Tier) -> f64 {
        self.health.get(&tier).map(|h| h.score()).unwrap_or(1.0)
    }

    async fn sol_usd_reference(&self) -> Option<Decimal> {
        let adapter = self.sol_reference.as_ref()?;
        adapter.sol_usd().await.ok().map(|(price, _)| price)
    }

    /// A tier's answer is accepted only if it isn't outright expired
    /// (older than `expire_ttl`, the hard ceiling no tier may cross)
    /// and carries at least `min_confidence`. `max_age` sets where the
    /// Fresh/Stale line falls but doesn't reject a Stale answer outright
    /// — that's what lets the stale-stream tier degrade gracefully
    /// instead of failing outright once past `max_age`.
    fn passes(&self, price: &TokenPrice, max_age: Duration, min_confidence: Decimal) -> bool {
        let freshness = price.freshness(max_age.as_millis() as u64, self.expire_ttl.as_millis() as u64);
        freshness != Freshness::Expired && price.confidence >= min_confidence
    }

    /// Tier 1: the live Fuser. Succeeds whenever at least one pool
    /// backing `mint` has a known state; the caller's `min_confidence`
    /// is applied afterward by `passes`, not inside the fuse itself.
    async fn try_fuser(&self, mint: Mint) -> Option<TokenPrice> {
        let sol_usd = self.sol_usd_reference().await;
        let result = self.fuser.price_for(mint, sol_usd).await;
        self.health.get(&Tier::FuserLive).unwrap().record(result.is_some());
        result
    }

    /// Tier 2: an aggregator swap quote, priced directly off the venue
    /// rather than this crate's own stream state.
    async fn try_aggregator(&self, mint: Mint, representative: &Pool) -> Option<TokenPrice> {
        let Some(adapter) = &self.aggregator else { return None };
        let result = adapter.price_sol(&mint, representative.base_decimals).await;
        self.health
            .get(&Tier::AggregatorHttp)
            .unwrap()
            .record(result.is_ok());
        let (price_sol, confidence) = result.ok()?;
        let sol_usd = self.sol_usd_reference().await;
        Some(TokenPrice {
            mint,
            price_sol,
            price_usd: sol_usd.map(|rate| price_sol * rate),
            best_pool: Some(representative.address),
            computed_at: crate::clock::LogicalTime::now(0),
            source_tier: SourceTier::HttpQuote,
            confidence,
        })
    }

    /// Tier 3: pair-metadata lookup by pool address.
    async fn try_pair_metadata(&self, mint: Mint, representative: &Pool) -> Option<TokenPrice> {
        let Some(adapter) = &self.pair_metadata else { return None };
        let result = adapter.price_sol(representative.address).await;
        self.health
            .get(&Tier::PairMetadataHttp)
            .unwrap()
            .record(result.is_ok());
        let (price_sol, confidence) = result.ok()?;
        let sol_usd = self.sol_usd_reference().await;
        Some(TokenPrice {
            mint,
            price_sol,
            price_usd: sol_usd.map(|rate| price_sol * rate),
            best_pool: Some(representative.address),
            computed_at: crate::clock::LogicalTime::now(0),
            source_tier: SourceTier::HttpPair,
            confidence,
        })
    }

    /// Tier 4: whatever the pool-state cache holds for the
    /// representative pool, at half confidence. This is the tier of
    /// last resort — it answers whenever the cache has ever seen this
    /// pool at all, but is still subject to the caller's constraints
    /// like every other tier.
    fn try_stale_stream(&self, mint: Mint, representative: &Pool) -> Option<TokenPrice> {
        let state = self.cache.get(representative.address)?;
        let price_sol = match representative.dex_kind {
            crate::model::DexKind::RaydiumClmm => crate::dex::raydium_clmm::price_from_sqrt_price(
                state.sqrt_price_q64?,
                representative.base_decimals,
                representative.quote_decimals,
            )?,
            _ => crate::dex::raydium_v4::price_from_reserves(
                state.base_reserve,
                state.quote_reserve,
                representative.base_decimals,
                representative.quote_decimals,
            )?,
        };
        let result = Some(TokenPrice {
            mint,
            price_sol,
            price_usd: None,
            best_pool: Some(representative.address),
            computed_at: state.at,
            source_tier: SourceTier::StaleStream,
            confidence: state.confidence / Decimal::from(2),
        });
        self.health.get(&Tier::StaleStream).unwrap().record(result.is_some());
        result
    }

    /// Cascades through all four tiers in order, short-circuiting on the
    /// first one whose answer meets the caller's `max_age` and
    /// `min_confidence`. `representative` is used by the HTTP and
    /// stale-stream tiers, which need a concrete pool rather than a
    /// fused view across many.
    pub async fn price_for(
        &self,
        mint: Mint,
        representative: Option<&Pool>,
        max_age: Duration,
        min_confidence: Decimal,
    ) -> Result<TokenPrice, OracleError> {
        if let Some(price) = self.try_fuser(mint).await {
            if self.passes(&price, max_age, min_confidence) {
                return Ok(price);
            }
        }
        if let Some(representative) = representative {
            if let Some(price) = self.try_aggregator(mint, representative).await {
                if self.passes(&price, max_age, min_confidence) {
                    return Ok(price);
                }
            }
            if let Some(price) = self.try_pair_metadata(mint, representative).await {
                if self.passes(&price, max_age, min_confidence) {
                    return Ok(price);
                }
            }
            if let Some(price) = self.try_stale_stream(mint, representative) {
                if self.passes(&price, max_age, min_confidence) {
                    return Ok(price);
                }
            }
        }
        Err(OracleError::NotAvailable)
    }
}

/// Drop-oldest bounded stream of oracle answers: a slow consumer sees a
/// channel that always has room because `push` evicts its own oldest
/// unread entry rather than blocking the producer.
pub struct PriceStream {
    tx: mpsc::Sender<TokenPrice>,
    buffer: Mutex<std::collections::VecDeque<TokenPrice>>,
    capacity: usize,
}

impl PriceStream {
    pub fn new(capacity: usize) -> (std::sync::Arc<Self>, mpsc::Receiver<TokenPrice>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            std::sync::Arc::new(Self {
                tx,
                buffer: Mutex::new(std::collections::VecDeque::with_capacity(capacity)),
                capacity: capacity.max(1),
            }),
            rx,
        )
    }

    /// Attempt a non-blocking send; on a full channel, drop the oldest
    /// buffered price in favor of the newest rather than stalling the
    /// Oracle's polling loop.
    pub fn push(&self, price: TokenPrice) {
        match self.tx.try_send(price.clone()) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                let mut buffer = self.buffer.lock().unwrap();
                if buffer.len() >= self.capacity {
                    buffer.pop_front();
                }
                buffer.push_back(price);
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }
}
