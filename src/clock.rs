//! Shared logical clock: wall time plus Solana slot.
//!
//! Every component that timestamps a value (PoolState, TokenPrice) uses
//! this pair so ordering decisions are made on slot, never on wall time
//! alone — wall time is for staleness/TTL math only.

use std::time::SystemTime;

/// A point in the shared logical clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct LogicalTime {
    pub slot: u64,
    #[serde(with = "wall_time_millis")]
    pub wall: SystemTime,
}

impl LogicalTime {
    pub fn now(slot: u64) -> Self {
        Self {
            slot,
            wall: SystemTime::now(),
        }
    }

    /// Age of this timestamp in milliseconds, saturating at `u64::MAX`.
    pub fn age_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(self.wall)
            .unwrap_or_default()
            .as_millis()
            .try_into()
            .unwrap_or(u64::MAX)
    }

    pub fn is_older_than_ms(&self, max_age_ms: u64) -> bool {
        self.age_ms() > max_age_ms
    }
}

mod wall_time_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::{SystemTime, UNIX_EPOCH};

    pub fn serialize<S>(time: &SystemTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let duration = time.duration_since(UNIX_EPOCH).unwrap_or_default();
        duration.as_millis().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<SystemTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u128::deserialize(deserializer)?;
        Ok(UNIX_EPOCH + std::time::Duration::from_millis(millis as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn age_ms_grows_with_time() {
        let t = LogicalTime::now(100);
        std::thread::sleep(Duration::from_millis(5));
        assert!(t.age_ms() >= 5);
    }

    #[test]
    fn ordering_is_by_slot_then_wall() {
        let a = LogicalTime::now(1);
        let b = LogicalTime::now(2);
        assert!(a < b);
    }

    #[test]
    fn staleness_threshold() {
        let t = LogicalTime::now(1);
        assert!(!t.is_older_than_ms(1_000));
    }
}
