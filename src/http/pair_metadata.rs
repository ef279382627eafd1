//! Pair Metadata Adapter: looks up a pool's current price from a
//! pair-metadata API (a DexScreener-shaped response). This is the
//! Oracle's third fallback tier — slower-moving than a live aggregator
//! quote, but it doesn't need an amount or a trade size to answer.

use super::{AdapterCache, AdapterError, CircuitBreaker, RateLimiter};
use crate::config::{CircuitBreakerConfig, HttpConfig};
use crate::model::PoolAddress;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

#[derive(Debug, Deserialize)]
struct PairMetadataResponse {
    pairs: Vec<PairEntry>,
}

#[derive(Debug, Deserialize)]
struct PairEntry {
    #[serde(rename = "priceNative")]
    price_native: String,
}

pub struct PairMetadataAdapter {
    client: reqwest::Client,
    base_url: Url,
    breaker: CircuitBreaker,
    limiter: RateLimiter,
    cache: AdapterCache<Decimal>,
    max_retries: u32,
}

impl PairMetadataAdapter {
    pub fn new(http: &HttpConfig, circuit_breaker: &CircuitBreakerConfig) -> Option<Self> {
        let base_url = http.pair_metadata_url.clone()?;
        Some(Self {
            client: super::build_client(),
            base_url,
            breaker: CircuitBreaker::new(circuit_breaker),
            limiter: RateLimiter::new(http.rate_per_sec),
            cache: AdapterCache::new(http.adapter_cache_ttl),
            max_retries: http.max_retries,
        })
    }

    pub async fn price_sol(&self, pool: PoolAddress) -> Result<(Decimal, Decimal), AdapterError> {
        let cache_key = pool.to_string();

        if self.breaker.is_open() {
            return match self.cache.get_stale_halved(&cache_key) {
                Some(hit) => Ok(hit),
                None => Err(AdapterError::CircuitOpen),
            };
        }

        match self.fetch_with_retry(pool).await {
            Ok(price) => {
                self.breaker.record_success();
                self.cache.put(&cache_key, price, Decimal::ONE);
                Ok((price, Decimal::ONE))
            }
            Err(err) => {
                self.breaker.record_failure();
                self.cache.get_stale_halved(&cache_key).ok_or(err)
            }
        }
    }

    async fn fetch_with_retry(&self, pool: PoolAddress) -> Result<Decimal, AdapterError> {
        let mut last_err = None;
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                tokio::time::sleep(super::retry_delay(attempt, Duration::from_millis(200), Duration::from_secs(5)))
                    .await;
            }
            self.limiter.acquire().await;
            match self.fetch_once(pool).await {
                Ok(price) => return Ok(price),
                Err(err) => last_err = Some(err),
            }
        }
        Err(last_err.unwrap_or(AdapterError::Shape("no attempts made".to_string())))
    }

    async fn fetch_once(&self, pool: PoolAddress) -> Result<Decimal, AdapterError> {
        let url = format!("{}{}", self.base_url, pool);
        let response: PairMetadataResponse = self.client.get(url).send().await?.json().await?;
        let entry = response
            .pairs
            .first()
            .ok_or_else(|| AdapterError::Shape("no pairs in response".to_string()))?;
        entry
            .price_native
            .parse::<Decimal>()
            .map_err(|_| AdapterError::Shape("priceNative not a decimal".to_string()))
    }
}
