//! C2: WebSocket Multiplexer. Presents one logical subscription stream
//! to the core, backed by a tiered pool of endpoints.

pub mod endpoint;
pub mod protocol;
pub mod raw_event;
pub mod reconnect;

use crate::config::{EndpointConfig, WsConfig};
use crate::model::{PoolAddress, SubscriptionKind};
use endpoint::EndpointConnection;
use raw_event::RawEvent;
use reconnect::{ReconnectConfig, ReconnectHandler};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};
use url::Url;

/// Handle returned by `subscribe`; dropping it does not unsubscribe —
/// callers must explicitly call `unsubscribe` per C2's contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionHandle {
    pub pool: PoolAddress,
    pub kind: SubscriptionKind,
}

struct RefcountedInterest {
    refcount: usize,
}

/// Shared mutable state behind the refcount map. Guarded by a short
/// critical section per §5's shared-resource policy — never held
/// across an await point.
struct Interests {
    map: HashMap<(PoolAddress, SubscriptionKind), RefcountedInterest>,
}

impl Interests {
    fn new() -> Self {
        Self { map: HashMap::new() }
    }
}

/// One logical subscription stream over N tiered endpoints.
pub struct Multiplexer {
    endpoints: EndpointConfig,
    ws: WsConfig,
    interests: Arc<Mutex<Interests>>,
    out_tx: mpsc::Sender<RawEvent>,
    cancel_tx: watch::Sender<bool>,
    cancel_rx: watch::Receiver<bool>,
}

impl Multiplexer {
    /// Construct the multiplexer and its output event stream. The
    /// returned receiver is the only `RawEvent` source for the rest of
    /// the pipeline.
    pub fn new(endpoints: EndpointConfig, ws: WsConfig) -> (Self, mpsc::Receiver<RawEvent>) {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let (out_tx, out_rx) = mpsc::channel(1024);

        let this = Self {
            endpoints,
            ws,
            interests: Arc::new(Mutex::new(Interests::new())),
            out_tx,
            cancel_tx,
            cancel_rx,
        };
        (this, out_rx)
    }

    /// Idempotent per (pool, kind): a second `subscribe` for the same
    /// pair just bumps the refcount and returns a fresh handle.
    pub async fn subscribe(&self, pool: PoolAddress, kind: SubscriptionKind) -> SubscriptionHandle {
        let mut interests = self.interests.lock().await;
        interests
            .map
            .entry((pool, kind))
            .and_modify(|entry| entry.refcount += 1)
            .or_insert(RefcountedInterest { refcount: 1 });
        SubscriptionHandle { pool, kind }
    }

    /// Removes local interest; the underlying remote subscription is
    /// released only when the refcount hits zero.
    pub async fn unsubscribe(&self, handle: SubscriptionHandle) {
        let mut interests = self.interests.lock().await;
        let key = (handle.pool, handle.kind);
        if let Some(entry) = interests.map.get_mut(&key) {
            entry.refcount = entry.refcount.saturating_sub(1);
            if entry.refcount == 0 {
                interests.map.remove(&key);
            }
        }
    }

    /// Number of live local subscribers for a (pool, kind) pair. Used
    /// by tests and by the Registry's refcount bookkeeping.
    pub async fn refcount(&self, pool: PoolAddress, kind: SubscriptionKind) -> usize {
        self.interests
            .lock()
            .await
            .map
            .get(&(pool, kind))
            .map(|entry| entry.refcount)
            .unwrap_or(0)
    }

    /// Signal all endpoint tasks to drain and close. In-flight events
    /// already in the output channel are still delivered.
    pub fn cancel(&self) {
        let _ = self.cancel_tx.send(true);
    }

    fn tiers(&self) -> Vec<Url> {
        std::iter::once(self.endpoints.primary_ws_url.clone())
            .chain(self.endpoints.fallback_ws_urls.iter().cloned())
            .collect()
    }

    /// Drive the tiered failover loop: connect to tier 0, and on
    /// failure advance to tier 1, 2, ... wrapping back to tier 0 after
    /// exhausting the list, backing off between full passes. Never
    /// returns except on cancellation — connect errors are retried
    /// indefinitely per §4.2's failure semantics.
    pub async fn run(&self, address_for: impl Fn(PoolAddress, SubscriptionKind) -> String + Clone) {
        let tiers = self.tiers();
        if tiers.is_empty() {
            return;
        }

        let reconnect_config = ReconnectConfig::new(
            self.ws.reconnect_initial_delay,
            self.ws.reconnect_max_delay,
            2.0,
        );
        let mut handler = ReconnectHandler::new(reconnect_config).expect("valid reconnect config");
        let mut tier_index = 0usize;

        loop {
            if *self.cancel_rx.borrow() {
                return;
            }

            let url = tiers[tier_index % tiers.len()].clone();
            let mut endpoint = EndpointConnection::new(url);

            {
                let interests = self.interests.lock().await;
                for (pool, kind) in interests.map.keys() {
                    endpoint.queue_subscription(*pool, *kind);
                }
            }

            let result = endpoint
                .run(&self.ws, address_for.clone(), self.out_tx.clone(), self.cancel_rx.clone())
                .await;

            if *self.cancel_rx.borrow() {
                return;
            }

            match result {
                Ok(()) => {
                    handler.reset();
                }
                Err(_) => {
                    tier_index += 1;
                    if tier_index % tiers.len() == 0 {
                        if let Ok(delay) = handler.should_reconnect() {
                            tokio::time::sleep(delay).await;
                        }
                    }
                }
            }
        }
    }
}
