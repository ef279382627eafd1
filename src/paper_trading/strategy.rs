//! Entry/exit decisions over a live `TokenPrice` stream. Mirrors the
//! original live paper trader's check loop: stop-loss/take-profit exits
//! run before new entries are considered, and a daily loss limit halts
//! new entries without touching positions already open.

use super::ledger::{ExitReason, Ledger};
use crate::clock::LogicalTime;
use crate::model::{Pool, TokenPrice};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One paper-trading preset. Named after the risk posture it encodes,
/// the way the upstream bot names its presets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperTradingConfig {
    pub name: String,
    pub starting_balance_sol: Decimal,
    pub max_concurrent_positions: usize,
    pub position_size_pct: Decimal,
    pub max_position_size_sol: Decimal,
    pub min_position_size_sol: Decimal,
    pub stop_loss_pct: Decimal,
    pub take_profit_pct: Decimal,
    pub max_daily_loss_sol: Decimal,
    pub min_entry_confidence: Decimal,
}

impl Default for PaperTradingConfig {
    fn default() -> Self {
        Self::moderate()
    }
}

impl PaperTradingConfig {
    pub fn conservative() -> Self {
        Self {
            name: "conservative".to_string(),
            starting_balance_sol: Decimal::new(1000, 0),
            max_concurrent_positions: 2,
            position_size_pct: Decimal::new(1, 1),
            max_position_size_sol: Decimal::new(5, 0),
            min_position_size_sol: Decimal::new(1, 1),
            stop_loss_pct: Decimal::new(5, 2),
            take_profit_pct: Decimal::new(10, 2),
            max_daily_loss_sol: Decimal::new(20, 0),
            min_entry_confidence: Decimal::new(8, 1),
        }
    }

    pub fn moderate() -> Self {
        Self {
            name: "moderate".to_string(),
            starting_balance_sol: Decimal::new(1000, 0),
            max_concurrent_positions: 3,
            position_size_pct: Decimal::new(3, 1),
            max_position_size_sol: Decimal::new(10, 0),
            min_position_size_sol: Decimal::new(1, 1),
            stop_loss_pct: Decimal::new(10, 2),
            take_profit_pct: Decimal::new(20, 2),
            max_daily_loss_sol: Decimal::new(50, 0),
            min_entry_confidence: Decimal::new(6, 1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyAction {
    Opened,
    Closed(ExitReason),
}

/// Drives one `Ledger` off a stream of price ticks for registered
/// pools. Holds no network or clock state of its own; every decision is
/// a pure function of the config, the ledger, and the tick it was
/// handed.
pub struct PaperTradingStrategy {
    config: PaperTradingConfig,
    ledger: Ledger,
    pools: std::collections::HashMap<crate::model::Mint, Pool>,
}

impl PaperTradingStrategy {
    pub fn new(config: PaperTradingConfig) -> Self {
        let ledger = Ledger::new(config.starting_balance_sol);
        Self {
            config,
            ledger,
            pools: std::collections::HashMap::new(),
        }
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn register_pool(&mut self, pool: Pool) {
        self.pools.insert(pool.base_mint, pool);
    }

    fn daily_loss_limit_reached(&self) -> bool {
        self.ledger.realized_pnl_sol() <= -self.config.max_daily_loss_sol
    }

    /// Processes one price tick: checks exit conditions for an open
    /// position on this mint first, then considers a fresh entry if
    /// none is open and room remains under the concurrency cap.
    pub fn process_tick(&mut self, price: &TokenPrice) -> Option<StrategyAction> {
        if self.ledger.has_position(&price.mint) {
            return self.check_exit(price);
        }
        self.check_entry(price)
    }

    fn check_exit(&mut self, price: &TokenPrice) -> Option<StrategyAction> {
        let position = self.ledger.position(&price.mint)?;
        let reason = if price.price_sol <= position.stop_loss_sol {
            ExitReason::StopLoss
        } else if price.price_sol >= position.take_profit_sol {
            ExitReason::TakeProfit
        } else {
            return None;
        };
        self.ledger.close_position(price.mint, price.price_sol, reason, price.computed_at);
        Some(StrategyAction::Closed(reason))
    }

    fn check_entry(&mut self, price: &TokenPrice) -> Option<StrategyAction> {
        if self.ledger.open_position_count() >= self.config.max_concurrent_positions {
            return None;
        }
        if self.daily_loss_limit_reached() {
            return None;
        }
        if price.confidence < self.config.min_entry_confidence {
            return None;
        }
        let pool = self.pools.get(&price.mint)?;
        let position_size_sol = (self.ledger.sol_balance() * self.config.position_size_pct)
            .min(self.config.max_position_size_sol)
            .max(self.config.min_position_size_sol);
        let opened = self.ledger.open_position(
            price.mint,
            pool.address,
            price.price_sol,
            position_size_sol,
            self.config.stop_loss_pct,
            self.config.take_profit_pct,
            price.computed_at,
        );
        opened.then_some(StrategyAction::Opened)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DexKind, Mint, PoolAddress, SourceTier};

    fn pool() -> Pool {
        Pool {
            address: PoolAddress([1; 32]),
            dex_kind: DexKind::RaydiumV4,
            base_mint: Mint([1; 32]),
            quote_mint: Mint([0; 32]),
            base_decimals: 6,
            quote_decimals: 9,
        }
    }

    fn price(mint: Mint, price_sol: Decimal, confidence: Decimal, slot: u64) -> TokenPrice {
        TokenPrice {
            mint,
            price_sol,
            price_usd: None,
            best_pool: Some(PoolAddress([1; 32])),
            computed_at: LogicalTime::now(slot),
            source_tier: SourceTier::StreamAccount,
            confidence,
        }
    }

    #[test]
    fn enters_on_a_confident_tick() {
        let mut strategy = PaperTradingStrategy::new(PaperTradingConfig::moderate());
        strategy.register_pool(pool());
        let action = strategy.process_tick(&price(Mint([1; 32]), Decimal::new(1, 3), Decimal::new(9, 1), 1));
        assert_eq!(action, Some(StrategyAction::Opened));
        assert_eq!(strategy.ledger().open_position_count(), 1);
    }

    #[test]
    fn refuses_entry_below_confidence_floor() {
        let mut strategy = PaperTradingStrategy::new(PaperTradingConfig::moderate());
        strategy.register_pool(pool());
        let action = strategy.process_tick(&price(Mint([1; 32]), Decimal::new(1, 3), Decimal::new(1, 1), 1));
        assert_eq!(action, None);
        assert_eq!(strategy.ledger().open_position_count(), 0);
    }

    #[test]
    fn exits_on_stop_loss() {
        let mut strategy = PaperTradingStrategy::new(PaperTradingConfig::moderate());
        strategy.register_pool(pool());
        strategy.process_tick(&price(Mint([1; 32]), Decimal::new(1, 3), Decimal::new(9, 1), 1));
        let dropped_price = Decimal::new(1, 3) * (Decimal::ONE - PaperTradingConfig::moderate().stop_loss_pct);
        let action = strategy.process_tick(&price(Mint([1; 32]), dropped_price, Decimal::new(9, 1), 2));
        assert_eq!(action, Some(StrategyAction::Closed(ExitReason::StopLoss)));
        assert_eq!(strategy.ledger().open_position_count(), 0);
    }

    #[test]
    fn exits_on_take_profit() {
        let mut strategy = PaperTradingStrategy::new(PaperTradingConfig::moderate());
        strategy.register_pool(pool());
        strategy.process_tick(&price(Mint([1; 32]), Decimal::new(1, 3), Decimal::new(9, 1), 1));
        let raised_price = Decimal::new(1, 3) * (Decimal::ONE + PaperTradingConfig::moderate().take_profit_pct);
        let action = strategy.process_tick(&price(Mint([1; 32]), raised_price, Decimal::new(9, 1), 2));
        assert_eq!(action, Some(StrategyAction::Closed(ExitReason::TakeProfit)));
    }

    #[test]
    fn refuses_new_entries_past_the_concurrency_cap() {
        let mut config = PaperTradingConfig::moderate();
        config.max_concurrent_positions = 1;
        let mut strategy = PaperTradingStrategy::new(config);
        let mut second_pool = pool();
        second_pool.address = PoolAddress([2; 32]);
        second_pool.base_mint = Mint([2; 32]);
        strategy.register_pool(pool());
        strategy.register_pool(second_pool);

        strategy.process_tick(&price(Mint([1; 32]), Decimal::new(1, 3), Decimal::new(9, 1), 1));
        let action = strategy.process_tick(&price(Mint([2; 32]), Decimal::new(1, 3), Decimal::new(9, 1), 2));
        assert_eq!(action, None);
    }
}
