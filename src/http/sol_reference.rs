//! Reference SOL Price Adapter: the `price_usd = price_sol * sol_usd_reference`
//! conversion factor, taken as the median of two independent sources so a
//! single source's outage or bad tick never moves every USD-denominated
//! price at once.

use super::{AdapterCache, AdapterError, CircuitBreaker, RateLimiter};
use crate::config::{CircuitBreakerConfig, HttpConfig};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

#[derive(Debug, Deserialize)]
struct ReferencePriceResponse {
    price: String,
}

pub struct SolReferenceAdapter {
    client: reqwest::Client,
    sources: Vec<Url>,
    breaker: CircuitBreaker,
    limiter: RateLimiter,
    cache: AdapterCache<Decimal>,
    max_retries: u32,
}

const CACHE_KEY: &str = "sol_usd";

impl SolReferenceAdapter {
    pub fn new(http: &HttpConfig, circuit_breaker: &CircuitBreakerConfig) -> Option<Self> {
        if http.sol_usd_reference_urls.is_empty() {
            return None;
        }
        Some(Self {
            client: super::build_client(),
            sources: http.sol_usd_reference_urls.clone(),
            breaker: CircuitBreaker::new(circuit_breaker),
            limiter: RateLimiter::new(http.rate_per_sec),
            cache: AdapterCache::new(http.adapter_cache_ttl),
            max_retries: http.max_retries,
        })
    }

    /// Median of whichever sources answered. Two sources: their mean (a
    /// two-point median). One source: that value at reduced confidence.
    /// Zero: fall back to the last cached value, halved.
    pub async fn sol_usd(&self) -> Result<(Decimal, Decimal), AdapterError> {
        if self.breaker.is_open() {
            return match self.cache.get_stale_halved(CACHE_KEY) {
                Some(hit) => Ok(hit),
                None => Err(AdapterError::CircuitOpen),
            };
        }

        let mut prices = Vec::new();
        for source in &self.sources {
            if let Ok(price) = self.fetch_with_retry(source).await {
                prices.push(price);
            }
        }

        if prices.is_empty() {
            self.breaker.record_failure();
            return self
                .cache
                .get_stale_halved(CACHE_KEY)
                .ok_or_else(|| AdapterError::Shape("all sol/usd sources unavailable".to_string()));
        }

        self.breaker.record_success();
        prices.sort();
        let (price, confidence) = if prices.len() >= 2 {
            let mid = prices.len() / 2;
            let median = if prices.len() % 2 == 0 {
                (prices[mid - 1] + prices[mid]) / Decimal::from(2)
            } else {
                prices[mid]
            };
            (median, Decimal::ONE)
        } else {
            (prices[0], Decimal::new(8, 1))
        };

        self.cache.put(CACHE_KEY, price, confidence);
        Ok((price, confidence))
    }

    async fn fetch_with_retry(&self, source: &Url) -> Result<Decimal, AdapterError> {
        let mut last_err = None;
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                tokio::time::sleep(super::retry_delay(attempt, Duration::from_millis(200), Duration::from_secs(5)))
                    .await;
            }
            self.limiter.acquire().await;
            match self.fetch_once(source).await {
                Ok(price) => return Ok(price),
                Err(err) => last_err = Some(err),
            }
        }
        Err(last_err.unwrap_or(AdapterError::Shape("no attempts made".to_string())))
    }

    async fn fetch_once(&self, source: &Url) -> Result<Decimal, AdapterError> {
        let response: ReferencePriceResponse = self.client.get(source.clone()).send().await?.json().await?;
        response
            .price
            .parse::<Decimal>()
            .map_err(|_| AdapterError::Shape("price not a decimal".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration as StdDuration;

    fn http_config() -> HttpConfig {
        HttpConfig {
            pool_size: 4,
            rate_per_sec: 10,
            max_retries: 1,
            aggregator_quote_url: None,
            pair_metadata_url: None,
            sol_usd_reference_urls: vec![
                "https://price-a.example.com/sol-usd".parse().unwrap(),
                "https://price-b.example.com/sol-usd".parse().unwrap(),
            ],
            aggregator_impact_cap: 0.05,
            adapter_cache_ttl: StdDuration::from_secs(10),
        }
    }

    fn cb_config() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: 3,
            reset_interval: StdDuration::from_secs(30),
        }
    }

    #[test]
    fn no_sources_yields_no_adapter() {
        let mut http = http_config();
        http.sol_usd_reference_urls = vec![];
        assert!(SolReferenceAdapter::new(&http, &cb_config()).is_none());
    }

    #[tokio::test]
    async fn open_circuit_without_cache_errors() {
        let adapter = SolReferenceAdapter::new(&http_config(), &cb_config()).unwrap();
        adapter.breaker.record_failure();
        adapter.breaker.record_failure();
        adapter.breaker.record_failure();
        assert!(matches!(adapter.sol_usd().await, Err(AdapterError::CircuitOpen)));
    }

    #[tokio::test]
    async fn open_circuit_with_cache_halves_confidence() {
        let adapter = SolReferenceAdapter::new(&http_config(), &cb_config()).unwrap();
        adapter.cache.put(CACHE_KEY, Decimal::new(1500, 1), Decimal::ONE);
        adapter.breaker.record_failure();
        adapter.breaker.record_failure();
        adapter.breaker.record_failure();
        let (price, confidence) = adapter.sol_usd().await.unwrap();
        assert_eq!(price, Decimal::new(1500, 1));
        assert_eq!(confidence, Decimal::new(5, 1));
    }
}
