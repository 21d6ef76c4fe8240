//! Reveal timers backed by `tokio_util::time::DelayQueue`.
//!
//! The queue's `Key` is the cancellable token the manager stores with each
//! pending item. Expired entries are pulled by the driver loop.

use std::task::{Context, Poll};
use std::time::Duration;

use tokio_util::time::DelayQueue;
use tokio_util::time::delay_queue::Key;

use livedelay_core::{ItemIdentity, TimerScheduler};

#[derive(Debug, Default)]
pub struct DelayQueueScheduler {
    queue: DelayQueue<ItemIdentity>,
}

impl DelayQueueScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn poll_fired(&mut self, cx: &mut Context<'_>) -> Poll<Option<(Key, ItemIdentity)>> {
        self.queue
            .poll_expired(cx)
            .map(|expired| expired.map(|e| (e.key(), e.into_inner())))
    }

    /// Wait for the next timer to fire. Resolves to `None` immediately when
    /// nothing is scheduled, so callers should check `is_empty` first.
    pub async fn next_fired(&mut self) -> Option<(Key, ItemIdentity)> {
        std::future::poll_fn(|cx| self.poll_fired(cx)).await
    }
}

impl TimerScheduler for DelayQueueScheduler {
    type Token = Key;

    fn schedule(&mut self, identity: ItemIdentity, _now_ms: u64, delay_ms: u64) -> Key {
        self.queue.insert(identity, Duration::from_millis(delay_ms))
    }

    fn cancel(&mut self, token: Key) -> bool {
        self.queue.try_remove(&token).is_some()
    }

    fn len(&self) -> usize {
        self.queue.len()
    }
}
