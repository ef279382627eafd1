//! Composition root: wires the Multiplexer, Pool State Cache, Fuser,
//! Oracle, Subscription Registry, and paper-trading engine together for
//! manual, single-process operation. The library crate has no CLI
//! surface of its own; everything below is glue.

use clap::Parser;
use log::{error, info, warn};
use rust_decimal::Decimal;
use solana_price_oracle::cache::PoolStateCache;
use solana_price_oracle::catalog::filters::FilterConfig;
use solana_price_oracle::catalog::TokenCatalog;
use solana_price_oracle::clock::LogicalTime;
use solana_price_oracle::config::{Config, RawConfig};
use solana_price_oracle::dex;
use solana_price_oracle::fuser::Fuser;
use solana_price_oracle::http::aggregator::AggregatorQuoteAdapter;
use solana_price_oracle::http::pair_metadata::PairMetadataAdapter;
use solana_price_oracle::http::sol_reference::SolReferenceAdapter;
use solana_price_oracle::model::{Pool, PoolAddress, Priority, SubscriptionKind};
use solana_price_oracle::oracle::{Oracle, PriceStream};
use solana_price_oracle::output::OutputFormatter;
use solana_price_oracle::paper_trading::strategy::PaperTradingConfig;
use solana_price_oracle::paper_trading::PaperTradingEngine;
use solana_price_oracle::registry::SubscriptionRegistry;
use solana_price_oracle::ws::{raw_event::RawEvent, Multiplexer};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;

fn load_watchlist(path: &Option<String>) -> Vec<Pool> {
    let Some(path) = path else { return Vec::new() };
    match std::fs::read_to_string(path) {
        Ok(contents) => serde_json::from_str::<Vec<Pool>>(&contents).unwrap_or_else(|e| {
            error!("watchlist at {} is not valid JSON: {}", path, e);
            Vec::new()
        }),
        Err(e) => {
            error!("could not read watchlist at {}: {}", path, e);
            Vec::new()
        }
    }
}

fn load_paper_trading_config(path: &Option<String>) -> PaperTradingConfig {
    let Some(path) = path else { return PaperTradingConfig::moderate() };
    match std::fs::read_to_string(path) {
        Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
            error!("paper trading config at {} is invalid: {}", path, e);
            PaperTradingConfig::moderate()
        }),
        Err(e) => {
            error!("could not read paper trading config at {}: {}", path, e);
            PaperTradingConfig::moderate()
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let raw_config = RawConfig::parse();
    let config = match Config::new(&raw_config) {
        Ok(config) => config,
        Err(e) => {
            error!("configuration error: {}", e);
            std::process::exit(1);
        }
    };

    info!("Solana price oracle starting");
    info!("Output format: {}", config.output_format);
    info!("Primary endpoint configured, {} fallback(s)", config.endpoints.fallback_ws_urls.len());

    let raw_watchlist = load_watchlist(&config.watchlist_path);
    if raw_watchlist.is_empty() {
        warn!("no watchlist configured; pass --watchlist-path to monitor any pools");
    }

    // A manually curated CLI watchlist is an operator's explicit
    // intent, not a discovery-pipeline candidate: liquidity and age
    // thresholds don't apply, but an explicit blocklist still does.
    let catalog = TokenCatalog::new(FilterConfig::permissive());
    let watchlist: Vec<Pool> = raw_watchlist
        .into_iter()
        .filter(|pool| {
            let reasons = catalog.propose(pool.clone(), Decimal::ZERO, LogicalTime::now(0));
            if !reasons.is_empty() {
                warn!("watchlist pool {} rejected by catalog: {:?}", pool.address, reasons);
            }
            reasons.is_empty()
        })
        .collect();
    let pools_by_address: HashMap<PoolAddress, Pool> = watchlist.iter().cloned().map(|p| (p.address, p)).collect();

    let cache = Arc::new(PoolStateCache::new());

    let mut fuser = Fuser::new(cache.clone(), config.pricing.min_emit_interval);
    for pool in &watchlist {
        fuser.register_pool(pool.clone());
    }

    let aggregator = AggregatorQuoteAdapter::new(&config.http, &config.circuit_breaker);
    let pair_metadata = PairMetadataAdapter::new(&config.http, &config.circuit_breaker);
    let sol_reference = SolReferenceAdapter::new(&config.http, &config.circuit_breaker);
    let oracle = Arc::new(Oracle::new(
        fuser,
        cache.clone(),
        aggregator,
        pair_metadata,
        sol_reference,
        config.pricing.expire_ttl,
    ));

    let registry = SubscriptionRegistry::new(
        config.registry.max_high_priority,
        config.registry.max_total_subscriptions,
    );
    for pool in &watchlist {
        if let Err(e) = registry.add(pool.base_mint, pool.clone(), Priority::High) {
            warn!("could not register {} with the subscription registry: {}", pool.address, e);
        }
    }

    let (mux, mut raw_rx) = Multiplexer::new(config.endpoints.clone(), config.ws.clone());
    let mux = Arc::new(mux);
    for pool in &watchlist {
        mux.subscribe(pool.address, SubscriptionKind::AccountUpdates).await;
        mux.subscribe(pool.address, SubscriptionKind::ProgramLogs).await;
    }

    let mux_for_run = mux.clone();
    let ws_handle = tokio::spawn(async move {
        mux_for_run.run(|pool, _kind| pool.to_string()).await;
    });

    let cache_for_consumer = cache.clone();
    let pools_for_consumer = pools_by_address.clone();
    let consumer_handle = tokio::spawn(async move {
        while let Some(event) = raw_rx.recv().await {
            match event {
                RawEvent::AccountUpdate { pool, slot, data } => {
                    if let Some(pool_def) = pools_for_consumer.get(&pool) {
                        if let Some(state) = dex::parse_account(pool_def, &data, slot) {
                            cache_for_consumer.apply_delta(state);
                        }
                    }
                }
                RawEvent::ProgramLogs { pool, slot, signature, logs } => {
                    if let Some(pool_def) = pools_for_consumer.get(&pool) {
                        for state in dex::parse_logs(pool_def, &logs, slot, Some(signature.clone())) {
                            cache_for_consumer.apply_delta(state);
                        }
                    }
                }
                RawEvent::SubscriptionLost { pool, kind } => {
                    warn!("subscription lost for {} ({:?})", pool, kind);
                }
                RawEvent::SubscriptionMigrated { pool, kind, to_endpoint } => {
                    info!("subscription for {} ({:?}) migrated to {}", pool, kind, to_endpoint);
                }
            }
        }
    });

    let (price_stream, price_rx) = PriceStream::new(256);

    let paper_trading_config = load_paper_trading_config(&config.paper_trading_config_path);
    let mut paper_trading_engine = PaperTradingEngine::new(paper_trading_config);
    for pool in &watchlist {
        paper_trading_engine.register_pool(pool.clone());
    }
    let paper_trading_handle = tokio::spawn(async move {
        paper_trading_engine.run(price_rx).await;
    });

    let formatter = OutputFormatter::new(config.output_format);

    let polling_handle = {
        let oracle = oracle.clone();
        let watchlist = watchlist.clone();
        let price_stream = price_stream.clone();
        let max_age = config.pricing.fresh_ttl;
        let min_confidence = Decimal::from_f64_retain(config.pricing.min_stream_confidence.value()).unwrap_or(Decimal::ZERO);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            loop {
                interval.tick().await;
                for pool in &watchlist {
                    match oracle.price_for(pool.base_mint, Some(pool), max_age, min_confidence).await {
                        Ok(price) => {
                            println!("{}", formatter.format_price(&price));
                            price_stream.push(price);
                        }
                        Err(e) => {
                            warn!("no price for {}: {}", pool.base_mint, e);
                            println!("{}", formatter.format_no_price(&pool.base_mint));
                        }
                    }
                }
            }
        })
    };

    info!("Monitoring {} pool(s)... (Ctrl+C to stop)", watchlist.len());
    signal::ctrl_c().await?;
    info!("Shutdown signal received");

    mux.cancel();
    polling_handle.abort();
    tokio::time::sleep(config.ws.shutdown_grace).await;
    ws_handle.abort();
    consumer_handle.abort();
    paper_trading_handle.abort();

    info!("Solana price oracle stopped");
    Ok(())
}
