//! Read-only views of the manager: status snapshot, counters, queue level.

use serde::{Deserialize, Serialize};

/// Fraction of capacity (in percent) at which the badge starts warning.
pub const NEAR_CAPACITY_PERCENT: usize = 80;

/// Coarse fill level of the pending queue, for the control's badge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueLevel {
    Empty,
    Pending,
    /// At or above [`NEAR_CAPACITY_PERCENT`] of capacity: further bursts
    /// will start forcing early reveals.
    NearCapacity,
    AtCapacity,
}

impl QueueLevel {
    pub fn classify(size: usize, capacity: usize) -> Self {
        if size == 0 {
            QueueLevel::Empty
        } else if size >= capacity {
            QueueLevel::AtCapacity
        } else if size * 100 >= capacity * NEAR_CAPACITY_PERCENT {
            QueueLevel::NearCapacity
        } else {
            QueueLevel::Pending
        }
    }

    pub fn is_warning(&self) -> bool {
        matches!(self, QueueLevel::NearCapacity | QueueLevel::AtCapacity)
    }
}

/// Point-in-time snapshot of a manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayStatus {
    pub active: bool,
    pub delay_ms: u64,
    pub queue_size: usize,
    pub capacity: usize,
    pub level: QueueLevel,
    /// Earliest pending reveal time, on the manager's clock.
    pub next_reveal_at_ms: Option<u64>,
}

/// Lifetime counters. Every hidden item ends up in exactly one of the
/// three reveal counters (or `reveal_failures` when the sink refused).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayStats {
    pub hidden: u64,
    pub passed_through: u64,
    pub duplicates_ignored: u64,
    pub revealed_on_expiry: u64,
    pub revealed_on_stop: u64,
    pub evicted: u64,
    pub hide_failures: u64,
    pub reveal_failures: u64,
}

impl DelayStats {
    /// Items whose pending lifetime has ended, successfully or not.
    pub fn released(&self) -> u64 {
        self.revealed_on_expiry + self.revealed_on_stop + self.evicted + self.reveal_failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_levels() {
        assert_eq!(QueueLevel::classify(0, 100), QueueLevel::Empty);
        assert_eq!(QueueLevel::classify(1, 100), QueueLevel::Pending);
        assert_eq!(QueueLevel::classify(79, 100), QueueLevel::Pending);
        assert_eq!(QueueLevel::classify(80, 100), QueueLevel::NearCapacity);
        assert_eq!(QueueLevel::classify(99, 100), QueueLevel::NearCapacity);
        assert_eq!(QueueLevel::classify(100, 100), QueueLevel::AtCapacity);
    }

    #[test]
    fn tiny_capacity() {
        assert_eq!(QueueLevel::classify(1, 1), QueueLevel::AtCapacity);
        assert_eq!(QueueLevel::classify(1, 2), QueueLevel::Pending);
    }

    #[test]
    fn warning_levels() {
        assert!(!QueueLevel::Pending.is_warning());
        assert!(QueueLevel::NearCapacity.is_warning());
        assert!(QueueLevel::AtCapacity.is_warning());
    }

    #[test]
    fn released_sums_reveal_paths() {
        let stats = DelayStats {
            hidden: 10,
            revealed_on_expiry: 4,
            revealed_on_stop: 3,
            evicted: 2,
            reveal_failures: 1,
            ..DelayStats::default()
        };
        assert_eq!(stats.released(), 10);
    }
}
