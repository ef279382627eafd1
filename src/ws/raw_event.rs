//! `RawEvent`: the one-way event stream the Multiplexer emits into a
//! bounded channel. Any upward signal (subscription lost, endpoint
//! migrated) is a distinct event kind on this same channel, not a
//! callback back into the Multiplexer.

use crate::model::{PoolAddress, SubscriptionKind};

#[derive(Debug, Clone)]
pub enum RawEvent {
    AccountUpdate {
        pool: PoolAddress,
        slot: u64,
        data: Vec<u8>,
    },
    ProgramLogs {
        pool: PoolAddress,
        slot: u64,
        signature: String,
        logs: Vec<String>,
    },
    SubscriptionLost {
        pool: PoolAddress,
        kind: SubscriptionKind,
    },
    SubscriptionMigrated {
        pool: PoolAddress,
        kind: SubscriptionKind,
        to_endpoint: String,
    },
}
