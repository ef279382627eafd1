//! Supplemented module: a simulated order book sitting downstream of
//! the Oracle. Never touches a wallet or sends a transaction — it only
//! consumes `TokenPrice` ticks and drives a `Ledger` the same way the
//! live paper trader it's grounded on drives its own position map.

pub mod ledger;
pub mod strategy;

use crate::model::{Pool, TokenPrice};
use ledger::ClosedTrade;
use log::info;
use strategy::{PaperTradingConfig, PaperTradingStrategy, StrategyAction};
use tokio::sync::mpsc;

/// Wraps a `PaperTradingStrategy` and consumes a price stream until the
/// channel closes, logging every open/close the way the original
/// live-trader loop logs entries and exits.
pub struct PaperTradingEngine {
    strategy: PaperTradingStrategy,
}

impl PaperTradingEngine {
    pub fn new(config: PaperTradingConfig) -> Self {
        Self {
            strategy: PaperTradingStrategy::new(config),
        }
    }

    pub fn register_pool(&mut self, pool: Pool) {
        self.strategy.register_pool(pool);
    }

    pub fn closed_trades(&self) -> &[ClosedTrade] {
        self.strategy.ledger().closed_trades()
    }

    pub fn sol_balance(&self) -> rust_decimal::Decimal {
        self.strategy.ledger().sol_balance()
    }

    /// Drains `prices` until the sender side drops, logging every
    /// position open and close. Returns once the channel closes.
    pub async fn run(&mut self, mut prices: mpsc::Receiver<TokenPrice>) {
        while let Some(price) = prices.recv().await {
            match self.strategy.process_tick(&price) {
                Some(StrategyAction::Opened) => {
                    info!("opened simulated position for mint at {} SOL", price.price_sol);
                }
                Some(StrategyAction::Closed(reason)) => {
                    if let Some(trade) = self.closed_trades().last() {
                        info!(
                            "closed simulated position ({:?}): entry {} SOL, exit {} SOL, pnl {} SOL",
                            reason, trade.entry_price_sol, trade.exit_price_sol, trade.realized_pnl_sol
                        );
                    }
                }
                None => {}
            }
        }
    }
}
