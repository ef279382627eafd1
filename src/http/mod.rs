//! C5: HTTP Price Adapters. Shared rate-limiting, circuit-breaking, and
//! response caching infrastructure used by every adapter in this module;
//! the adapters themselves live in the sibling files.

pub mod aggregator;
pub mod pair_metadata;
pub mod sol_reference;

use crate::config::CircuitBreakerConfig;
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Identifies this client to every HTTP price source it calls.
pub const USER_AGENT: &str = concat!("solana-price-oracle/", env!("CARGO_PKG_VERSION"));

/// Builds the one `reqwest::Client` shape every adapter uses: a fixed
/// `User-Agent`, nothing else non-default.
pub fn build_client() -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .expect("static client configuration is always valid")
}

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("circuit open, not attempting request")]
    CircuitOpen,
    #[error("http request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("unexpected response shape: {0}")]
    Shape(String),
    #[error("price impact {impact} exceeds cap {cap}")]
    ImpactTooHigh { impact: f64, cap: f64 },
}

/// Consecutive-failure circuit breaker, same shape as the Multiplexer's
/// `ReconnectHandler`: trips open after `failure_threshold` failures in a
/// row, and allows one trial call again once `reset_interval` has passed.
pub struct CircuitBreaker {
    failure_threshold: u32,
    reset_interval: Duration,
    consecutive_failures: AtomicU32,
    opened_at: Mutex<Option<Instant>>,
}

impl CircuitBreaker {
    pub fn new(config: &CircuitBreakerConfig) -> Self {
        Self {
            failure_threshold: config.failure_threshold,
            reset_interval: config.reset_interval,
            consecutive_failures: AtomicU32::new(0),
            opened_at: Mutex::new(None),
        }
    }

    /// `true` if calls should be short-circuited right now. A breaker
    /// that tripped more than `reset_interval` ago lets one call through
    /// (half-open) to probe recovery.
    pub fn is_open(&self) -> bool {
        let opened_at = self.opened_at.lock().unwrap();
        match *opened_at {
            None => false,
            Some(at) => at.elapsed() < self.reset_interval,
        }
    }

    pub fn record_success(&self) {
        self.consecutive_failures.store(0, Ordering::SeqCst);
        *self.opened_at.lock().unwrap() = None;
    }

    pub fn record_failure(&self) {
        let failures = self.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
        if failures >= self.failure_threshold {
            let mut opened_at = self.opened_at.lock().unwrap();
            if opened_at.is_none() {
                *opened_at = Some(Instant::now());
            }
        }
    }
}

/// Sliding-window token bucket: at most `rate_per_sec` calls to
/// `acquire` resolve within any trailing one-second window; the rest
/// wait.
pub struct RateLimiter {
    rate_per_sec: u32,
    window: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(rate_per_sec: u32) -> Self {
        Self {
            rate_per_sec: rate_per_sec.max(1),
            window: Mutex::new(VecDeque::new()),
        }
    }

    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut window = self.window.lock().unwrap();
                let now = Instant::now();
                while matches!(window.front(), Some(oldest) if now.duration_since(*oldest) >= Duration::from_secs(1))
                {
                    window.pop_front();
                }
                if (window.len() as u32) < self.rate_per_sec {
                    window.push_back(now);
                    None
                } else {
                    let oldest = *window.front().unwrap();
                    Some(Duration::from_secs(1).saturating_sub(now.duration_since(oldest)))
                }
            };
            match wait {
                None => return,
                Some(delay) => tokio::time::sleep(delay).await,
            }
        }
    }
}

/// Deterministic backoff delay for retry attempt `n`, jittered by a
/// hash of the attempt count rather than a `rand` dependency — same
/// technique as the WebSocket reconnect handler.
pub fn retry_delay(attempt: u32, initial: Duration, max: Duration) -> Duration {
    let multiplier = 2u64.saturating_pow(attempt.min(20));
    let raw = initial.saturating_mul(multiplier as u32).min(max);

    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    attempt.hash(&mut hasher);
    let jitter_fraction = (hasher.finish() % 1000) as f64 / 1000.0 * 0.25;
    raw.mul_f64(1.0 + jitter_fraction).min(max)
}

struct CacheEntry<T> {
    value: T,
    confidence: Decimal,
    at: Instant,
}

/// Per-adapter response cache. A fresh hit returns the value at full
/// confidence; a stale-serve (used when a live fetch just failed) halves
/// the confidence each time it is re-served, per the fail-open policy.
pub struct AdapterCache<T> {
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry<T>>>,
}

impl<T: Clone> AdapterCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn get_fresh(&self, key: &str) -> Option<(T, Decimal)> {
        let entries = self.entries.lock().unwrap();
        let entry = entries.get(key)?;
        if entry.at.elapsed() <= self.ttl {
            Some((entry.value.clone(), entry.confidence))
        } else {
            None
        }
    }

    /// Serve whatever is cached regardless of TTL, halving its recorded
    /// confidence in place so repeated stale-serves decay toward zero.
    pub fn get_stale_halved(&self, key: &str) -> Option<(T, Decimal)> {
        let mut entries = self.entries.lock().unwrap();
        let entry = entries.get_mut(key)?;
        entry.confidence /= Decimal::from(2);
        Some((entry.value.clone(), entry.confidence))
    }

    pub fn put(&self, key: &str, value: T, confidence: Decimal) {
        self.entries.lock().unwrap().insert(
            key.to_string(),
            CacheEntry {
                value,
                confidence,
                at: Instant::now(),
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cb_config(threshold: u32, reset_ms: u64) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: threshold,
            reset_interval: Duration::from_millis(reset_ms),
        }
    }

    #[test]
    fn circuit_stays_closed_below_threshold() {
        let cb = CircuitBreaker::new(&cb_config(3, 1000));
        cb.record_failure();
        cb.record_failure();
        assert!(!cb.is_open());
    }

    #[test]
    fn circuit_opens_at_threshold() {
        let cb = CircuitBreaker::new(&cb_config(2, 10_000));
        cb.record_failure();
        cb.record_failure();
        assert!(cb.is_open());
    }

    #[test]
    fn circuit_closes_after_reset_interval() {
        let cb = CircuitBreaker::new(&cb_config(1, 1));
        cb.record_failure();
        assert!(cb.is_open());
        std::thread::sleep(Duration::from_millis(5));
        assert!(!cb.is_open());
    }

    #[test]
    fn success_clears_failure_count() {
        let cb = CircuitBreaker::new(&cb_config(2, 10_000));
        cb.record_failure();
        cb.record_success();
        cb.record_failure();
        assert!(!cb.is_open());
    }

    #[tokio::test]
    async fn rate_limiter_admits_up_to_configured_burst() {
        let limiter = RateLimiter::new(2);
        let start = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        assert!(start.elapsed() < Duration::from_millis(200));
    }

    #[test]
    fn cache_returns_none_past_ttl() {
        let cache: AdapterCache<Decimal> = AdapterCache::new(Duration::from_millis(1));
        cache.put("k", Decimal::new(1, 0), Decimal::ONE);
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get_fresh("k").is_none());
    }

    #[test]
    fn stale_serve_halves_confidence_each_call() {
        let cache: AdapterCache<Decimal> = AdapterCache::new(Duration::from_millis(1));
        cache.put("k", Decimal::new(1, 0), Decimal::ONE);
        let (_, first) = cache.get_stale_halved("k").unwrap();
        let (_, second) = cache.get_stale_halved("k").unwrap();
        assert_eq!(first, Decimal::new(5, 1));
        assert_eq!(second, Decimal::new(25, 2));
    }

    #[test]
    fn retry_delay_grows_and_caps() {
        let initial = Duration::from_millis(100);
        let max = Duration::from_secs(5);
        assert!(retry_delay(0, initial, max) >= initial);
        assert!(retry_delay(10, initial, max) <= max.mul_f64(1.25));
    }
}
