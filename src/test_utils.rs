//! Shared fixture builders for unit tests across modules. Most modules
//! build their own tiny fixtures locally; this module is for the
//! handful of types (`Config`, a representative `Pool`) that several
//! modules' tests all need the same default shape of.

#[cfg(test)]
pub mod config {
    use crate::config::{Config, RawConfig};

    /// Create a default test configuration pointed at a placeholder
    /// primary endpoint, with every other field at its CLI default.
    pub fn create_test_config() -> Config {
        Config::new(&raw_test_config()).expect("valid test configuration")
    }

    pub fn raw_test_config() -> RawConfig {
        RawConfig {
            primary_rpc_ws_url: "wss://mainnet.helius-rpc.com".parse().unwrap(),
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
}
