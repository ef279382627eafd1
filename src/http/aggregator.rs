//! Aggregator Quote Adapter: prices a mint by requesting a swap quote
//! from a Jupiter-shaped aggregator API and deriving price_sol from the
//! quoted amounts. Quotes above the configured price-impact cap are
//! rejected outright rather than degraded — a large-impact quote isn't
//! evidence of a bad price, it's evidence the pool can't fill this size.

use super::{AdapterCache, AdapterError, CircuitBreaker, RateLimiter};
use crate::config::{CircuitBreakerConfig, HttpConfig};
use crate::model::Mint;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

const PROBE_LAMPORTS: u64 = 1_000_000_000; // 1 SOL, the adapter's fixed quote size

#[derive(Debug, Deserialize)]
struct QuoteResponse {
    #[serde(rename = "outAmount")]
    out_amount: String,
    #[serde(rename = "priceImpactPct")]
    price_impact_pct: String,
}

pub struct AggregatorQuoteAdapter {
    client: reqwest::Client,
    base_url: Url,
    breaker: CircuitBreaker,
    limiter: RateLimiter,
    cache: AdapterCache<Decimal>,
    impact_cap: f64,
    max_retries: u32,
}

impl AggregatorQuoteAdapter {
    pub fn new(http: &HttpConfig, circuit_breaker: &CircuitBreakerConfig) -> Option<Self> {
        let base_url = http.aggregator_quote_url.clone()?;
        Some(Self {
            client: super::build_client(),
            base_url,
            breaker: CircuitBreaker::new(circuit_breaker),
            limiter: RateLimiter::new(http.rate_per_sec),
            cache: AdapterCache::new(http.adapter_cache_ttl),
            impact_cap: http.aggregator_impact_cap,
            max_retries: http.max_retries,
        })
    }

    /// `mint`'s price in SOL, derived from quoting `PROBE_LAMPORTS`
    /// worth of SOL into `mint` and inverting the out amount.
    pub async fn price_sol(&self, mint: &Mint, base_decimals: u8) -> Result<(Decimal, Decimal), AdapterError> {
        let cache_key = mint.to_string();

        if self.breaker.is_open() {
            return match self.cache.get_stale_halved(&cache_key) {
                Some(hit) => Ok(hit),
                None => Err(AdapterError::CircuitOpen),
            };
        }

        match self.fetch_with_retry(mint, base_decimals).await {
            Ok(price) => {
                self.breaker.record_success();
                self.cache.put(&cache_key, price, Decimal::ONE);
                Ok((price, Decimal::ONE))
            }
            Err(err) => {
                self.breaker.record_failure();
                self.cache
                    .get_stale_halved(&cache_key)
                    .ok_or(err)
            }
        }
    }

    async fn fetch_with_retry(&self, mint: &Mint, base_decimals: u8) -> Result<Decimal, AdapterError> {
        let mut last_err = None;
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                tokio::time::sleep(super::retry_delay(attempt, Duration::from_millis(200), Duration::from_secs(5)))
                    .await;
            }
            self.limiter.acquire().await;
            match self.fetch_once(mint, base_decimals).await {
                Ok(price) => return Ok(price),
                Err(err @ AdapterError::ImpactTooHigh { .. }) => return Err(err),
                Err(err) => last_err = Some(err),
            }
        }
        Err(last_err.unwrap_or(AdapterError::Shape("no attempts made".to_string())))
    }

    async fn fetch_once(&self, mint: &Mint, base_decimals: u8) -> Result<Decimal, AdapterError> {
        let response: QuoteResponse = self
            .client
            .get(self.base_url.clone())
            .query(&[
                ("outputMint", mint.to_string()),
                ("amount", PROBE_LAMPORTS.to_string()),
            ])
            .send()
            .await?
            .json()
            .await?;

        let impact: f64 = response
            .price_impact_pct
            .parse()
            .map_err(|_| AdapterError::Shape("priceImpactPct not numeric".to_string()))?;
        if impact > self.impact_cap {
            return Err(AdapterError::ImpactTooHigh { impact, cap: self.impact_cap });
        }

        let out_amount: u128 = response
            .out_amount
            .parse()
            .map_err(|_| AdapterError::Shape("outAmount not numeric".to_string()))?;
        if out_amount == 0 {
            return Err(AdapterError::Shape("outAmount was zero".to_string()));
        }

        let sol_probe = Decimal::from(PROBE_LAMPORTS) / Decimal::from(1_000_000_000u64);
        let mint_amount = Decimal::from(out_amount) / Decimal::from(10u64.pow(base_decimals as u32));
        Ok(sol_probe / mint_amount)
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
            max_retries: 2,
            aggregator_quote_url: Some("https://quote-api.example.com/v6/quote".parse().unwrap()),
            pair_metadata_url: None,
            sol_usd_reference_urls: vec![],
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
    fn absent_url_yields_no_adapter() {
        let mut http = http_config();
        http.aggregator_quote_url = None;
        assert!(AggregatorQuoteAdapter::new(&http, &cb_config()).is_none());
    }

    #[test]
    fn builds_with_configured_url() {
        assert!(AggregatorQuoteAdapter::new(&http_config(), &cb_config()).is_some());
    }

    #[tokio::test]
    async fn open_circuit_with_no_cache_entry_errors() {
        let adapter = AggregatorQuoteAdapter::new(&http_config(), &cb_config()).unwrap();
        adapter.breaker.record_failure();
        adapter.breaker.record_failure();
        adapter.breaker.record_failure();
        let result = adapter.price_sol(&Mint([1; 32]), 6).await;
        assert!(matches!(result, Err(AdapterError::CircuitOpen)));
    }
}
