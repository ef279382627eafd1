//! Supplemented module: a token catalog sitting in front of the
//! Registry. New pools are proposed here first; only candidates that
//! clear the admission filters in `filters` ever reach
//! `SubscriptionRegistry::add`.

pub mod filters;

use crate::clock::LogicalTime;
use crate::model::{Mint, Pool};
use dashmap::DashMap;
use filters::{evaluate, FilterConfig, RejectReason};
use rust_decimal::Decimal;

#[derive(Debug, Clone)]
pub struct CatalogEntry {
    pub pool: Pool,
    pub liquidity_sol: Decimal,
    pub first_seen: LogicalTime,
}

pub struct TokenCatalog {
    entries: DashMap<Mint, CatalogEntry>,
    filters: FilterConfig,
}

impl TokenCatalog {
    pub fn new(filters: FilterConfig) -> Self {
        Self {
            entries: DashMap::new(),
            filters,
        }
    }

    /// Propose a newly observed pool for admission. Returns the reasons
    /// it was rejected, if any; an empty `Vec` means it was admitted
    /// (or was already present, which counts as admitted).
    pub fn propose(&self, pool: Pool, liquidity_sol: Decimal, first_seen: LogicalTime) -> Vec<RejectReason> {
        if self.entries.contains_key(&pool.base_mint) {
            return Vec::new();
        }

        let age_ms = first_seen.age_ms();
        let reasons = evaluate(&pool.base_mint, liquidity_sol, age_ms, &self.filters);
        if reasons.is_empty() {
            self.entries.insert(
                pool.base_mint,
                CatalogEntry {
                    pool,
                    liquidity_sol,
                    first_seen,
                },
            );
        }
        reasons
    }

    pub fn get(&self, mint: &Mint) -> Option<CatalogEntry> {
        self.entries.get(mint).map(|entry| entry.value().clone())
    }

    pub fn remove(&self, mint: &Mint) -> Option<CatalogEntry> {
        self.entries.remove(mint).map(|(_, entry)| entry)
    }

    pub fn snapshot(&self) -> Vec<CatalogEntry> {
        self.entries.iter().map(|entry| entry.value().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DexKind, Mint, Pool, PoolAddress};
    use std::collections::HashSet;

    fn pool(byte: u8) -> Pool {
        Pool {
            address: PoolAddress([byte; 32]),
            dex_kind: DexKind::RaydiumV4,
            base_mint: Mint([byte; 32]),
            quote_mint: Mint([0; 32]),
            base_decimals: 6,
            quote_decimals: 9,
        }
    }

    fn lenient_filters() -> FilterConfig {
        FilterConfig {
            min_liquidity_sol: Decimal::ONE,
            min_pool_age_ms: 0,
            blocklist: HashSet::new(),
        }
    }

    #[test]
    fn admits_a_qualifying_candidate() {
        let catalog = TokenCatalog::new(lenient_filters());
        let p = pool(1);
        let reasons = catalog.propose(p.clone(), Decimal::new(5, 0), LogicalTime::now(1));
        assert!(reasons.is_empty());
        assert_eq!(catalog.len(), 1);
        assert!(catalog.get(&p.base_mint).is_some());
    }

    #[test]
    fn rejects_a_thin_candidate() {
        let catalog = TokenCatalog::new(lenient_filters());
        let p = pool(2);
        let reasons = catalog.propose(p, Decimal::new(1, 1), LogicalTime::now(1));
        assert_eq!(reasons, vec![filters::RejectReason::BelowMinLiquidity]);
        assert!(catalog.is_empty());
    }

    #[test]
    fn re_proposing_an_admitted_mint_is_a_no_op() {
        let catalog = TokenCatalog::new(lenient_filters());
        let p = pool(3);
        catalog.propose(p.clone(), Decimal::new(5, 0), LogicalTime::now(1));
        let reasons = catalog.propose(p, Decimal::new(1, 1), LogicalTime::now(2));
        assert!(reasons.is_empty());
        assert_eq!(catalog.len(), 1);
    }
}
