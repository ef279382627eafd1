//! Configuration surface: CLI/env via `clap`, validated into immutable
//! per-component config structs constructed once at startup.
//!
//! Mirrors the teacher's `RawConfig`/`Config` split: `RawConfig` is the
//! flat `clap::Parser` struct; `Config::new` validates it into a typed
//! `Config` that components borrow by reference. No component reads an
//! undeclared field and nothing here is mutated after construction.

use clap::Parser;
use std::time::Duration;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("min_stream_confidence must be in [0,1], got {0}")]
    InvalidConfidence(f64),
    #[error("max_high_priority must be > 0")]
    InvalidCapacity,
    #[error("fallback url #{index} is invalid: {source}")]
    InvalidFallbackUrl {
        index: usize,
        #[source]
        source: url::ParseError,
    },
}

/// Raw, unvalidated configuration parsed directly from CLI flags / env vars.
#[derive(Parser, Debug, Clone)]
#[command(name = "solana-price-oracle")]
pub struct RawConfig {
    /// Tier-1 WebSocket endpoint
    #[arg(long, env = "PRIMARY_RPC_WS_URL")]
    pub primary_rpc_ws_url: Url,

    /// Ordered list of fallback WS endpoints
    #[arg(long, env = "FALLBACK_RPC_WS_URLS", value_delimiter = ',')]
    pub fallback_rpc_ws_urls: Vec<String>,

    #[arg(long, env = "WS_PING_INTERVAL_MS", default_value_t = 15_000)]
    pub ws_ping_interval_ms: u64,
    #[arg(long, env = "WS_PING_TIMEOUT_MS", default_value_t = 5_000)]
    pub ws_ping_timeout_ms: u64,
    #[arg(long, env = "WS_RECONNECT_INITIAL_DELAY_MS", default_value_t = 500)]
    pub ws_reconnect_initial_delay_ms: u64,
    #[arg(long, env = "WS_RECONNECT_MAX_DELAY_MS", default_value_t = 30_000)]
    pub ws_reconnect_max_delay_ms: u64,
    #[arg(long, env = "WS_RESUBSCRIBE_TIMEOUT_MS", default_value_t = 10_000)]
    pub ws_resubscribe_timeout_ms: u64,
    #[arg(long, env = "WS_CONNECT_TIMEOUT_MS", default_value_t = 10_000)]
    pub ws_connect_timeout_ms: u64,

    #[arg(long, env = "PRICE_FRESH_TTL_MS", default_value_t = 3_000)]
    pub price_fresh_ttl_ms: u64,
    #[arg(long, env = "PRICE_EXPIRE_TTL_MS", default_value_t = 60_000)]
    pub price_expire_ttl_ms: u64,
    #[arg(long, env = "MIN_STREAM_CONFIDENCE", default_value_t = 0.6)]
    pub min_stream_confidence: f64,

    #[arg(long, env = "MAX_HIGH_PRIORITY", default_value_t = 200)]
    pub max_high_priority: usize,
    #[arg(long, env = "MAX_TOTAL_SUBSCRIPTIONS", default_value_t = 2_000)]
    pub max_total_subscriptions: usize,
    #[arg(long, env = "POOL_IDLE_TTL_MS", default_value_t = 300_000)]
    pub pool_idle_ttl_ms: u64,

    #[arg(long, env = "HTTP_POOL_SIZE", default_value_t = 8)]
    pub http_pool_size: usize,
    #[arg(long, env = "HTTP_RATE_PER_SEC", default_value_t = 5)]
    pub http_rate_per_sec: u32,
    #[arg(long, env = "HTTP_MAX_RETRIES", default_value_t = 3)]
    pub http_max_retries: u32,

    #[arg(long, env = "CB_FAILURE_THRESHOLD", default_value_t = 5)]
    pub cb_failure_threshold: u32,
    #[arg(long, env = "CB_RESET_INTERVAL_MS", default_value_t = 30_000)]
    pub cb_reset_interval_ms: u64,
    #[arg(long, env = "ADAPTER_CACHE_TTL_MS", default_value_t = 10_000)]
    pub adapter_cache_ttl_ms: u64,

    #[arg(long, env = "MIN_EMIT_INTERVAL_MS", default_value_t = 250)]
    pub min_emit_interval_ms: u64,

    #[arg(long, env = "SHUTDOWN_GRACE_MS", default_value_t = 2_000)]
    pub shutdown_grace_ms: u64,

    /// Aggregator swap-quote API base URL (e.g. Jupiter-style)
    #[arg(long, env = "AGGREGATOR_QUOTE_URL")]
    pub aggregator_quote_url: Option<Url>,
    /// Pair-metadata API base URL
    #[arg(long, env = "PAIR_METADATA_URL")]
    pub pair_metadata_url: Option<Url>,
    /// SOL/USD reference endpoints (exactly two expected; median is used)
    #[arg(long, env = "SOL_USD_REFERENCE_URLS", value_delimiter = ',')]
    pub sol_usd_reference_urls: Vec<String>,
    /// Max acceptable price impact for an aggregator quote, as a fraction (0.05 = 5%)
    #[arg(long, env = "AGGREGATOR_IMPACT_CAP", default_value_t = 0.05)]
    pub aggregator_impact_cap: f64,

    /// Optional paper-trading strategy config file (TOML)
    #[arg(long, env = "PAPER_TRADING_CONFIG")]
    pub paper_trading_config: Option<String>,

    /// Optional watch-list file (JSON array of pools) to seed the
    /// Registry with at startup
    #[arg(long, env = "WATCHLIST_PATH")]
    pub watchlist_path: Option<String>,

    #[arg(long, env = "OUTPUT_FORMAT", value_enum, default_value_t = crate::output::OutputFormat::Table)]
    pub output_format: crate::output::OutputFormat,
}

/// Validated, immutable configuration. Constructed once; handed by
/// reference to every component.
#[derive(Debug, Clone)]
pub struct Config {
    pub endpoints: EndpointConfig,
    pub ws: WsConfig,
    pub pricing: PricingConfig,
    pub registry: RegistryConfig,
    pub http: HttpConfig,
    pub circuit_breaker: CircuitBreakerConfig,
    pub output_format: crate::output::OutputFormat,
    pub paper_trading_config_path: Option<String>,
    pub watchlist_path: Option<String>,
}

#[derive(Debug, Clone)]
pub struct EndpointConfig {
    pub primary_ws_url: Url,
    pub fallback_ws_urls: Vec<Url>,
    pub connect_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct WsConfig {
    pub ping_interval: Duration,
    pub ping_timeout: Duration,
    pub reconnect_initial_delay: Duration,
    pub reconnect_max_delay: Duration,
    pub resubscribe_timeout: Duration,
    pub shutdown_grace: Duration,
}

#[derive(Debug, Clone)]
pub struct PricingConfig {
    pub fresh_ttl: Duration,
    pub expire_ttl: Duration,
    pub min_stream_confidence: Confidence,
    pub min_emit_interval: Duration,
    pub pool_idle_ttl: Duration,
}

#[derive(Debug, Clone)]
pub struct RegistryConfig {
    pub max_high_priority: usize,
    pub max_total_subscriptions: usize,
}

#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub pool_size: usize,
    pub rate_per_sec: u32,
    pub max_retries: u32,
    pub aggregator_quote_url: Option<Url>,
    pub pair_metadata_url: Option<Url>,
    pub sol_usd_reference_urls: Vec<Url>,
    pub aggregator_impact_cap: f64,
    pub adapter_cache_ttl: Duration,
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub reset_interval: Duration,
}

/// Confidence scalar, always in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Confidence(f64);

impl Confidence {
    pub fn new(value: f64) -> Result<Self, ConfigError> {
        if !(0.0..=1.0).contains(&value) {
            return Err(ConfigError::InvalidConfidence(value));
        }
        Ok(Self(value))
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

impl Config {
    pub fn new(raw: &RawConfig) -> Result<Self, ConfigError> {
        let min_stream_confidence = Confidence::new(raw.min_stream_confidence)?;

        if raw.max_high_priority == 0 || raw.max_total_subscriptions < raw.max_high_priority {
            return Err(ConfigError::InvalidCapacity);
        }

        let fallback_ws_urls = parse_urls(&raw.fallback_rpc_ws_urls)?;
        let sol_usd_reference_urls = parse_urls(&raw.sol_usd_reference_urls)?;

        Ok(Self {
            endpoints: EndpointConfig {
                primary_ws_url: raw.primary_rpc_ws_url.clone(),
                fallback_ws_urls,
                connect_timeout: Duration::from_millis(raw.ws_connect_timeout_ms),
            },
            ws: WsConfig {
                ping_interval: Duration::from_millis(raw.ws_ping_interval_ms),
                ping_timeout: Duration::from_millis(raw.ws_ping_timeout_ms),
                reconnect_initial_delay: Duration::from_millis(raw.ws_reconnect_initial_delay_ms),
                reconnect_max_delay: Duration::from_millis(raw.ws_reconnect_max_delay_ms),
                resubscribe_timeout: Duration::from_millis(raw.ws_resubscribe_timeout_ms),
                shutdown_grace: Duration::from_millis(raw.shutdown_grace_ms),
            },
            pricing: PricingConfig {
                fresh_ttl: Duration::from_millis(raw.price_fresh_ttl_ms),
                expire_ttl: Duration::from_millis(raw.price_expire_ttl_ms),
                min_stream_confidence,
                min_emit_interval: Duration::from_millis(raw.min_emit_interval_ms),
                pool_idle_ttl: Duration::from_millis(raw.pool_idle_ttl_ms),
            },
            registry: RegistryConfig {
                max_high_priority: raw.max_high_priority,
                max_total_subscriptions: raw.max_total_subscriptions,
            },
            http: HttpConfig {
                pool_size: raw.http_pool_size,
                rate_per_sec: raw.http_rate_per_sec,
                max_retries: raw.http_max_retries,
                aggregator_quote_url: raw.aggregator_quote_url.clone(),
                pair_metadata_url: raw.pair_metadata_url.clone(),
                sol_usd_reference_urls,
                aggregator_impact_cap: raw.aggregator_impact_cap,
                adapter_cache_ttl: Duration::from_millis(raw.adapter_cache_ttl_ms),
            },
            circuit_breaker: CircuitBreakerConfig {
                failure_threshold: raw.cb_failure_threshold,
                reset_interval: Duration::from_millis(raw.cb_reset_interval_ms),
            },
            output_format: raw.output_format,
            paper_trading_config_path: raw.paper_trading_config.clone(),
            watchlist_path: raw.watchlist_path.clone(),
        })
    }
}

fn parse_urls(raw: &[String]) -> Result<Vec<Url>, ConfigError> {
    raw.iter()
        .enumerate()
        .map(|(index, value)| {
            value
                .parse::<Url>()
                .map_err(|source| ConfigError::InvalidFallbackUrl { index, source })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_with_primary(url: &str) -> RawConfig {
        RawConfig {
            primary_rpc_ws_url: url.parse().unwrap(),
            fallback_rpc_ws_urls: vec!["wss://mainnet.solana.com".to_string()],
            ws_ping_interval_ms: 15_000,
            ws_ping_timeout_ms: 5_000,
            ws_reconnect_initial_delay_ms: 500,
            ws_reconnect_max_delay_ms: 30_000,
            ws_resubscribe_timeout_ms: 10_000,
            ws_connect_timeout_ms: 10_000,
            price_fresh_ttl_ms: 3_000,
            price_expire_ttl_ms: 60_000,
            min_stream_confidence: 0.6,
            max_high_priority: 200,
            max_total_subscriptions: 2_000,
            pool_idle_ttl_ms: 300_000,
            http_pool_size: 8,
            http_rate_per_sec: 5,
            http_max_retries: 3,
            cb_failure_threshold: 5,
            cb_reset_interval_ms: 30_000,
            adapter_cache_ttl_ms: 10_000,
            min_emit_interval_ms: 250,
            shutdown_grace_ms: 2_000,
            aggregator_quote_url: None,
            pair_metadata_url: None,
            sol_usd_reference_urls: vec![],
            aggregator_impact_cap: 0.05,
            paper_trading_config: None,
            watchlist_path: None,
            output_format: crate::output::OutputFormat::Table,
        }
    }

    #[test]
    fn valid_config_builds() {
        let raw = raw_with_primary("wss://mainnet.helius-rpc.com");
        let config = Config::new(&raw).unwrap();
        assert_eq!(config.registry.max_high_priority, 200);
        assert_eq!(config.endpoints.fallback_ws_urls.len(), 1);
    }

    #[test]
    fn rejects_invalid_confidence() {
        let mut raw = raw_with_primary("wss://mainnet.helius-rpc.com");
        raw.min_stream_confidence = 1.5;
        assert!(matches!(
            Config::new(&raw),
            Err(ConfigError::InvalidConfidence(_))
        ));
    }

    #[test]
    fn rejects_zero_capacity() {
        let mut raw = raw_with_primary("wss://mainnet.helius-rpc.com");
        raw.max_high_priority = 0;
        assert!(matches!(Config::new(&raw), Err(ConfigError::InvalidCapacity)));
    }

    #[test]
    fn rejects_total_capacity_below_high_priority_cap() {
        let mut raw = raw_with_primary("wss://mainnet.helius-rpc.com");
        raw.max_high_priority = 200;
        raw.max_total_subscriptions = 100;
        assert!(matches!(Config::new(&raw), Err(ConfigError::InvalidCapacity)));
    }

    #[test]
    fn rejects_bad_fallback_url() {
        let mut raw = raw_with_primary("wss://mainnet.helius-rpc.com");
        raw.fallback_rpc_ws_urls = vec!["not a url".to_string()];
        assert!(matches!(
            Config::new(&raw),
            Err(ConfigError::InvalidFallbackUrl { .. })
        ));
    }
}
