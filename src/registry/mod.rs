//! C7: Subscription Registry. Tracks which (mint, pool, dex_kind)
//! triples are under active management, at what priority, refcounted so
//! overlapping callers (catalog scan, paper-trading strategy, CLI watch
//! list) share one underlying subscription.

use crate::errors::OracleError;
use crate::model::{Mint, Pool, PoolAddress, Priority, Subscription};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("unknown subscription for pool {0}")]
    Unknown(PoolAddress),
}

struct Entry {
    subscription: Subscription,
    refcount: usize,
}

/// Single mutex guarding the whole map; held only across plain map
/// operations, never across an `.await`.
pub struct SubscriptionRegistry {
    max_high_priority: usize,
    max_total: usize,
    entries: Mutex<Inner>,
}

struct Inner {
    by_pool: HashMap<PoolAddress, Entry>,
    high_priority_order: VecDeque<PoolAddress>,
}

impl SubscriptionRegistry {
    pub fn new(max_high_priority: usize, max_total: usize) -> Self {
        Self {
            max_high_priority,
            max_total,
            entries: Mutex::new(Inner {
                by_pool: HashMap::new(),
                high_priority_order: VecDeque::new(),
            }),
        }
    }

    /// Adds interest in `pool`, bumping refcount if already tracked.
    /// Returns the priority the pool actually ended up at — `High` can
    /// be downgraded to `Low` on the spot if the high-priority cap is
    /// already full. A brand-new pool is rejected with `Busy` once the
    /// registry holds `max_total` distinct pools and has no demotion
    /// path left to make room.
    pub fn add(&self, mint: Mint, pool: Pool, priority: Priority) -> Result<Priority, OracleError> {
        let mut inner = self.entries.lock().unwrap();
        if let Some(entry) = inner.by_pool.get_mut(&pool.address) {
            entry.refcount += 1;
            return Ok(entry.subscription.priority);
        }

        if inner.by_pool.len() >= self.max_total {
            return Err(OracleError::Busy(format!(
                "registry at capacity ({}/{} pools)",
                inner.by_pool.len(),
                self.max_total
            )));
        }

        let granted_priority = if priority == Priority::High && inner.high_priority_order.len() >= self.max_high_priority {
            Self::demote_oldest(&mut inner);
            Priority::High
        } else {
            priority
        };

        if granted_priority == Priority::High {
            inner.high_priority_order.push_back(pool.address);
        }

        inner.by_pool.insert(
            pool.address,
            Entry {
                subscription: Subscription {
                    mint,
                    pool: pool.address,
                    dex_kind: pool.dex_kind,
                    priority: granted_priority,
                },
                refcount: 1,
            },
        );
        Ok(granted_priority)
    }

    fn demote_oldest(inner: &mut Inner) {
        if let Some(oldest) = inner.high_priority_order.pop_front() {
            if let Some(entry) = inner.by_pool.get_mut(&oldest) {
                entry.subscription.priority = Priority::Low;
            }
        }
    }

    /// Releases one reference; the pool drops out of the registry once
    /// its refcount reaches zero.
    pub fn remove(&self, pool: PoolAddress) {
        let mut inner = self.entries.lock().unwrap();
        let Some(entry) = inner.by_pool.get_mut(&pool) else {
            return;
        };
        entry.refcount = entry.refcount.saturating_sub(1);
        if entry.refcount == 0 {
            inner.by_pool.remove(&pool);
            inner.high_priority_order.retain(|p| *p != pool);
        }
    }

    /// Raises `pool` to `High`, demoting the oldest existing `High`
    /// entry if that would exceed the cap.
    pub fn promote(&self, pool: PoolAddress) -> Result<(), RegistryError> {
        let mut inner = self.entries.lock().unwrap();
        if !inner.by_pool.contains_key(&pool) {
            return Err(RegistryError::Unknown(pool));
        }
        if inner.by_pool[&pool].subscription.priority == Priority::High {
            return Ok(());
        }
        if inner.high_priority_order.len() >= self.max_high_priority {
            Self::demote_oldest(&mut inner);
        }
        inner.high_priority_order.push_back(pool);
        inner.by_pool.get_mut(&pool).unwrap().subscription.priority = Priority::High;
        Ok(())
    }

    pub fn demote(&self, pool: PoolAddress) -> Result<(), RegistryError> {
        let mut inner = self.entries.lock().unwrap();
        let entry = inner.by_pool.get_mut(&pool).ok_or(RegistryError::Unknown(pool))?;
        if entry.subscription.priority == Priority::Low {
            return Ok(());
        }
        entry.subscription.priority = Priority::Low;
        inner.high_priority_order.retain(|p| *p != pool);
        Ok(())
    }

    pub fn snapshot(&self) -> Vec<Subscription> {
        self.entries
            .lock()
            .unwrap()
            .by_pool
            .values()
            .map(|entry| entry.subscription.clone())
            .collect()
    }

    pub fn refcount(&self, pool: PoolAddress) -> usize {
        self.entries
            .lock()
            .unwrap()
            .by_pool
            .get(&pool)
            .map(|entry| entry.refcount)
            .unwrap_or(0)
    }
}
