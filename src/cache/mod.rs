//! C3: Pool State Cache. Holds the latest `PoolState` per pool,
//! versioned by slot, with a single-writer-per-pool invariant enforced
//! by the Multiplexer's per-pool task serialization upstream.

use crate::model::{PoolAddress, PoolState};
use dashmap::DashMap;
use std::time::Duration;
use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    pub accepted: u64,
    pub rejected_stale: u64,
    pub rejected_invalid_reserves: u64,
}

/// A change notification fanned out to `subscribe_changes` callers.
#[derive(Debug, Clone)]
pub struct PoolStateChange {
    pub pool: PoolAddress,
    pub state: PoolState,
}

pub struct PoolStateCache {
    states: DashMap<PoolAddress, PoolState>,
    changes: broadcast::Sender<PoolStateChange>,
    stats: DashMap<PoolAddress, CacheStats>,
}

impl PoolStateCache {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(4096);
        Self {
            states: DashMap::new(),
            changes,
            stats: DashMap::new(),
        }
    }

    /// Applies `delta` if it supersedes the current state per the
    /// slot-then-tier-then-confidence rule, and rejects zero/negative
    /// AMM reserves outright regardless of slot.
    pub fn apply_delta(&self, delta: PoolState) -> bool {
        if !delta.is_valid_amm_state() {
            self.stats.entry(delta.pool).or_default().rejected_invalid_reserves += 1;
            return false;
        }

        let pool = delta.pool;
        let mut accepted = false;
        self.states
            .entry(pool)
            .and_modify(|current| {
                if delta.supersedes(Some(current)) {
                    *current = delta.clone();
                    accepted = true;
                }
            })
            .or_insert_with(|| {
                accepted = true;
                delta.clone()
            });

        if accepted {
            self.stats.entry(pool).or_default().accepted += 1;
            let _ = self.changes.send(PoolStateChange { pool, state: delta });
        } else {
            self.stats.entry(pool).or_default().rejected_stale += 1;
        }
        accepted
    }

    pub fn get(&self, pool: PoolAddress) -> Option<PoolState> {
        self.states.get(&pool).map(|entry| entry.value().clone())
    }

    pub fn stats(&self, pool: PoolAddress) -> CacheStats {
        self.stats.get(&pool).map(|entry| *entry.value()).unwrap_or_default()
    }

    /// Subscribe to accepted-delta notifications for one pool. Callers
    /// filter the shared broadcast by pool address; a bounded channel
    /// means a slow subscriber can miss entries (`Lagged`), never block
    /// the writer.
    pub fn subscribe_changes(&self, pool: PoolAddress) -> PoolChangeStream {
        PoolChangeStream {
            pool,
            inner: self.changes.subscribe(),
        }
    }

    /// Removes entries whose logical-time wall clock is older than `ttl`.
    pub fn evict_idle(&self, ttl: Duration) -> usize {
        let ttl_ms: u64 = ttl.as_millis().try_into().unwrap_or(u64::MAX);
        let stale: Vec<PoolAddress> = self
            .states
            .iter()
            .filter(|entry| entry.value().at.is_older_than_ms(ttl_ms))
            .map(|entry| *entry.key())
            .collect();
        for pool in &stale {
            self.states.remove(pool);
            self.stats.remove(pool);
        }
        stale.len()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

impl Default for PoolStateCache {
    fn default() -> Self {
        Self::new()
    }
}

pub struct PoolChangeStream {
    pool: PoolAddress,
    inner: broadcast::Receiver<PoolStateChange>,
}

impl PoolChangeStream {
    /// Await the next accepted delta for this pool, skipping
    /// notifications for other pools on the shared channel.
    pub async fn next(&mut self) -> Option<PoolState> {
        loop {
            match self.inner.recv().await {
                Ok(change) if change.pool == self.pool => return Some(change.state),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::LogicalTime;
    use crate::model::{Completeness, SourceTier};
    use rust_decimal::Decimal;

    fn state(pool: PoolAddress, slot: u64, base: u128, quote: u128) -> PoolState {
        PoolState {
            pool,
            base_reserve: base,
            quote_reserve: quote,
            sqrt_price_q64: None,
            at: LogicalTime::now(slot),
            source_sig: None,
            confidence: Decimal::new(9, 1),
            tier: SourceTier::StreamAccount,
            completeness: Completeness::Full,
        }
    }

    #[test]
    fn accepts_first_delta_for_a_pool() {
        let cache = PoolStateCache::new();
        let pool = PoolAddress([1; 32]);
        assert!(cache.apply_delta(state(pool, 1000, 100, 200)));
        assert_eq!(cache.get(pool).unwrap().base_reserve, 100);
    }

    #[test]
    fn rejects_older_slot() {
        let cache = PoolStateCache::new();
        let pool = PoolAddress([2; 32]);
        cache.apply_delta(state(pool, 1000, 100, 200));
        assert!(!cache.apply_delta(state(pool, 999, 1, 1)));
        assert_eq!(cache.get(pool).unwrap().base_reserve, 100);
    }

    #[test]
    fn rejects_zero_reserves() {
        let cache = PoolStateCache::new();
        let pool = PoolAddress([3; 32]);
        assert!(!cache.apply_delta(state(pool, 1000, 0, 200)));
        assert!(cache.get(pool).is_none());
        assert_eq!(cache.stats(pool).rejected_invalid_reserves, 1);
    }

    #[test]
    fn evicts_stale_entries() {
        let cache = PoolStateCache::new();
        let pool = PoolAddress([4; 32]);
        let mut stale_state = state(pool, 1000, 100, 200);
        stale_state.at = LogicalTime {
            slot: 1000,
            wall: std::time::SystemTime::now() - Duration::from_secs(3600),
        };
        cache.apply_delta(stale_state);
        assert_eq!(cache.evict_idle(Duration::from_secs(60)), 1);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn subscribers_see_accepted_deltas_for_their_pool_only() {
        let cache = PoolStateCache::new();
        let pool_a = PoolAddress([5; 32]);
        let pool_b = PoolAddress([6; 32]);
        let mut stream = cache.subscribe_changes(pool_a);

        cache.apply_delta(state(pool_b, 1, 1, 1));
        cache.apply_delta(state(pool_a, 1, 10, 20));

        let received = stream.next().await.unwrap();
        assert_eq!(received.pool, pool_a);
        assert_eq!(received.base_reserve, 10);
    }
}
