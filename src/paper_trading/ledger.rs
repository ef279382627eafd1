//! Simulated cash/position ledger. Holds one `SimulatedPosition` per
//! mint, never touches a real wallet, and records every close as a
//! `ClosedTrade` for later review.

use crate::clock::LogicalTime;
use crate::model::{Mint, PoolAddress};
use rust_decimal::Decimal;

#[derive(Debug, Clone)]
pub struct SimulatedPosition {
    pub mint: Mint,
    pub pool: PoolAddress,
    pub entry_price_sol: Decimal,
    pub amount: Decimal,
    pub stop_loss_sol: Decimal,
    pub take_profit_sol: Decimal,
    pub opened_at: LogicalTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    Manual,
}

#[derive(Debug, Clone)]
pub struct ClosedTrade {
    pub mint: Mint,
    pub entry_price_sol: Decimal,
    pub exit_price_sol: Decimal,
    pub amount: Decimal,
    pub realized_pnl_sol: Decimal,
    pub reason: ExitReason,
    pub closed_at: LogicalTime,
}

impl ClosedTrade {
    pub fn is_win(&self) -> bool {
        self.realized_pnl_sol > Decimal::ZERO
    }
}

/// Tracks simulated SOL balance and open positions. Every mutation is
/// synchronous and infallible from the caller's perspective; the only
/// way an open or close is refused is a plain bool return.
pub struct Ledger {
    sol_balance: Decimal,
    positions: std::collections::HashMap<Mint, SimulatedPosition>,
    closed_trades: Vec<ClosedTrade>,
    realized_pnl_sol: Decimal,
}

impl Ledger {
    pub fn new(starting_balance_sol: Decimal) -> Self {
        Self {
            sol_balance: starting_balance_sol,
            positions: std::collections::HashMap::new(),
            closed_trades: Vec::new(),
            realized_pnl_sol: Decimal::ZERO,
        }
    }

    pub fn sol_balance(&self) -> Decimal {
        self.sol_balance
    }

    pub fn realized_pnl_sol(&self) -> Decimal {
        self.realized_pnl_sol
    }

    pub fn open_position_count(&self) -> usize {
        self.positions.len()
    }

    pub fn has_position(&self, mint: &Mint) -> bool {
        self.positions.contains_key(mint)
    }

    pub fn position(&self, mint: &Mint) -> Option<&SimulatedPosition> {
        self.positions.get(mint)
    }

    pub fn closed_trades(&self) -> &[ClosedTrade] {
        &self.closed_trades
    }

    /// Opens a position sized at `position_size_sol`, debiting the
    /// balance. Refuses (returns `false`) if the balance can't cover it
    /// or a position for this mint is already open.
    pub fn open_position(
        &mut self,
        mint: Mint,
        pool: PoolAddress,
        entry_price_sol: Decimal,
        position_size_sol: Decimal,
        stop_loss_pct: Decimal,
        take_profit_pct: Decimal,
        opened_at: LogicalTime,
    ) -> bool {
        if self.positions.contains_key(&mint) || position_size_sol > self.sol_balance || entry_price_sol <= Decimal::ZERO {
            return false;
        }
        let amount = position_size_sol / entry_price_sol;
        self.sol_balance -= position_size_sol;
        self.positions.insert(
            mint,
            SimulatedPosition {
                mint,
                pool,
                entry_price_sol,
                amount,
                stop_loss_sol: entry_price_sol * (Decimal::ONE - stop_loss_pct),
                take_profit_sol: entry_price_sol * (Decimal::ONE + take_profit_pct),
                opened_at,
            },
        );
        true
    }

    /// Closes an open position at `exit_price_sol`, crediting proceeds
    /// back to the balance and recording the trade. No-op (returns
    /// `None`) if no position is open for this mint.
    pub fn close_position(&mut self, mint: Mint, exit_price_sol: Decimal, reason: ExitReason, closed_at: LogicalTime) -> Option<ClosedTrade> {
        let position = self.positions.remove(&mint)?;
        let proceeds = exit_price_sol * position.amount;
        let cost = position.entry_price_sol * position.amount;
        let realized_pnl_sol = proceeds - cost;
        self.sol_balance += proceeds;
        self.realized_pnl_sol += realized_pnl_sol;
        let trade = ClosedTrade {
            mint,
            entry_price_sol: position.entry_price_sol,
            exit_price_sol,
            amount: position.amount,
            realized_pnl_sol,
            reason,
            closed_at,
        };
        self.closed_trades.push(trade.clone());
        Some(trade)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mint(byte: u8) -> Mint {
        Mint([byte; 32])
    }

    #[test]
    fn opening_debits_balance_by_position_size() {
        let mut ledger = Ledger::new(Decimal::new(100, 0));
        let opened = ledger.open_position(
            mint(1),
            PoolAddress([1; 32]),
            Decimal::new(1, 3),
            Decimal::new(10, 0),
            Decimal::new(1, 1),
            Decimal::new(2, 1),
            LogicalTime::now(1),
        );
        assert!(opened);
        assert_eq!(ledger.sol_balance(), Decimal::new(90, 0));
        assert_eq!(ledger.open_position_count(), 1);
    }

    #[test]
    fn cannot_open_a_second_position_for_the_same_mint() {
        let mut ledger = Ledger::new(Decimal::new(100, 0));
        ledger.open_position(mint(1), PoolAddress([1; 32]), Decimal::new(1, 3), Decimal::new(10, 0), Decimal::new(1, 1), Decimal::new(2, 1), LogicalTime::now(1));
        let second = ledger.open_position(mint(1), PoolAddress([1; 32]), Decimal::new(1, 3), Decimal::new(10, 0), Decimal::new(1, 1), Decimal::new(2, 1), LogicalTime::now(2));
        assert!(!second);
        assert_eq!(ledger.open_position_count(), 1);
    }

    #[test]
    fn refuses_position_larger_than_balance() {
        let mut ledger = Ledger::new(Decimal::new(5, 0));
        let opened = ledger.open_position(mint(1), PoolAddress([1; 32]), Decimal::new(1, 3), Decimal::new(10, 0), Decimal::new(1, 1), Decimal::new(2, 1), LogicalTime::now(1));
        assert!(!opened);
    }

    #[test]
    fn closing_credits_proceeds_and_records_pnl() {
        let mut ledger = Ledger::new(Decimal::new(100, 0));
        ledger.open_position(mint(2), PoolAddress([2; 32]), Decimal::new(1, 0), Decimal::new(10, 0), Decimal::new(1, 1), Decimal::new(2, 1), LogicalTime::now(1));
        let trade = ledger
            .close_position(mint(2), Decimal::new(12, 1), ExitReason::TakeProfit, LogicalTime::now(2))
            .unwrap();
        assert_eq!(trade.realized_pnl_sol, Decimal::new(2, 0));
        assert_eq!(ledger.sol_balance(), Decimal::new(102, 0));
        assert_eq!(ledger.realized_pnl_sol(), Decimal::new(2, 0));
        assert!(trade.is_win());
        assert_eq!(ledger.open_position_count(), 0);
    }

    #[test]
    fn closing_an_unknown_mint_is_a_no_op() {
        let mut ledger = Ledger::new(Decimal::new(100, 0));
        assert!(ledger.close_position(mint(9), Decimal::ONE, ExitReason::Manual, LogicalTime::now(1)).is_none());
    }
}
