//! Timer scheduling seam and a deterministic virtual-time implementation.
//!
//! Every pending item holds exactly one token returned by
//! [`TimerScheduler::schedule`]. The manager cancels the token before it
//! drops the item, so a fired timer can never act on a stale identity.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::types::ItemIdentity;

/// Schedules one-shot reveal timers. Enables mock injection for testing.
pub trait TimerScheduler {
    /// Cancellable handle of one scheduled timer.
    type Token: Copy + Eq + fmt::Debug;

    /// Schedule a timer for `identity` firing `delay_ms` after `now_ms`.
    fn schedule(&mut self, identity: ItemIdentity, now_ms: u64, delay_ms: u64) -> Self::Token;

    /// Cancel a timer. Returns `false` if it already fired or was cancelled.
    fn cancel(&mut self, token: Self::Token) -> bool;

    /// Number of timers still scheduled.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ─── VirtualScheduler ───────────────────────────────────────────────

/// Token issued by [`VirtualScheduler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerToken(u64);

/// Scheduler driven by an explicit virtual clock.
///
/// Nothing fires until [`VirtualScheduler::advance_to`] is called. Due
/// timers come out ordered by fire time, then by scheduling order.
#[derive(Debug, Clone, Default)]
pub struct VirtualScheduler {
    now_ms: u64,
    next_seq: u64,
    /// (fire_at_ms, seq) → identity.
    queue: BTreeMap<(u64, u64), ItemIdentity>,
    /// seq → fire_at_ms, for cancellation by token.
    fire_times: HashMap<u64, u64>,
}

impl VirtualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest time passed to `advance_to`.
    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    /// Earliest scheduled fire time, if any timer is live.
    pub fn next_deadline(&self) -> Option<u64> {
        self.queue.first_key_value().map(|((at, _), _)| *at)
    }

    /// Move the virtual clock to `now_ms` and return every timer due at or
    /// before it, in firing order. The clock never moves backwards.
    pub fn advance_to(&mut self, now_ms: u64) -> Vec<(TimerToken, ItemIdentity)> {
        self.now_ms = self.now_ms.max(now_ms);
        let mut due = Vec::new();
        while let Some(entry) = self.queue.first_entry() {
            let (fire_at, seq) = *entry.key();
            if fire_at > self.now_ms {
                break;
            }
            let identity = entry.remove();
            self.fire_times.remove(&seq);
            due.push((TimerToken(seq), identity));
        }
        due
    }
}

impl TimerScheduler for VirtualScheduler {
    type Token = TimerToken;

    fn schedule(&mut self, identity: ItemIdentity, now_ms: u64, delay_ms: u64) -> TimerToken {
        let seq = self.next_seq;
        self.next_seq += 1;
        let fire_at = now_ms.saturating_add(delay_ms);
        self.queue.insert((fire_at, seq), identity);
        self.fire_times.insert(seq, fire_at);
        TimerToken(seq)
    }

    fn cancel(&mut self, token: TimerToken) -> bool {
        match self.fire_times.remove(&token.0) {
            Some(fire_at) => self.queue.remove(&(fire_at, token.0)).is_some(),
            None => false,
        }
    }

    fn len(&self) -> usize {
        self.queue.len()
    }
}
