//! Delay manager: withholds each arriving feed item for the current delay
//! window, then reveals it.
//!
//! - **Delay isolation**: an item's reveal time is fixed at arrival;
//!   `set_delay` only affects later arrivals.
//! - **Bounded queue**: at most `capacity` items are pending. A hidden
//!   arrival at capacity force-reveals the pending item with the earliest
//!   reveal time (earliest arrival on ties). A failed hide evicts nothing.
//! - **Reveal exactly once**: every hidden item is revealed through exactly
//!   one of timer expiry, `stop`, or eviction.
//! - **Leak-free stop**: `stop` cancels every timer and reveals every
//!   pending item before returning.
//!
//! No error escapes the public API. Sink and notifier failures are logged
//! and absorbed per item.

use std::collections::{BTreeMap, HashMap};

use crate::notifier::FeedNotifier;
use crate::observers::{ObserverId, QueueObservers};
use crate::scheduler::{TimerScheduler, VirtualScheduler};
use crate::sink::PresentationSink;
use crate::status::{DelayStats, DelayStatus, QueueLevel};
use crate::types::{
    ArrivalOutcome, FeedItem, ItemIdentity, MAX_QUEUE_SIZE, RevealCause, StartOutcome,
};

// ─── Config ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelayManagerConfig {
    /// Maximum number of simultaneously pending items (at least 1).
    pub capacity: usize,
}

impl Default for DelayManagerConfig {
    fn default() -> Self {
        Self {
            capacity: MAX_QUEUE_SIZE,
        }
    }
}

// ─── PendingItem ────────────────────────────────────────────────────

/// One withheld item.
#[derive(Debug, Clone)]
pub struct PendingItem<H, T> {
    pub identity: ItemIdentity,
    pub handle: H,
    pub arrived_at_ms: u64,
    pub reveal_at_ms: u64,
    /// The single live timer that will reveal this item.
    pub timer: T,
    /// Arrival order, used as the eviction tie-break.
    seq: u64,
}

impl<H, T> PendingItem<H, T> {
    fn order_key(&self) -> (u64, u64) {
        (self.reveal_at_ms, self.seq)
    }
}

// ─── DelayManager ───────────────────────────────────────────────────

pub struct DelayManager<P, S, N>
where
    P: PresentationSink,
    S: TimerScheduler,
{
    sink: P,
    scheduler: S,
    notifier: N,
    config: DelayManagerConfig,
    current_delay_ms: u64,
    active: bool,
    pending: HashMap<ItemIdentity, PendingItem<P::Handle, S::Token>>,
    /// (reveal_at_ms, seq) → identity. Eviction and stop order.
    reveal_order: BTreeMap<(u64, u64), ItemIdentity>,
    next_seq: u64,
    next_generated_id: u64,
    observers: QueueObservers,
    stats: DelayStats,
}

impl<P, S, N> DelayManager<P, S, N>
where
    P: PresentationSink,
    S: TimerScheduler,
    N: FeedNotifier,
{
    /// Create an inactive manager with the default capacity.
    pub fn new(sink: P, scheduler: S, notifier: N) -> Self {
        Self::with_config(sink, scheduler, notifier, DelayManagerConfig::default())
    }

    pub fn with_config(sink: P, scheduler: S, notifier: N, config: DelayManagerConfig) -> Self {
        let config = DelayManagerConfig {
            capacity: config.capacity.max(1),
        };
        Self {
            sink,
            scheduler,
            notifier,
            config,
            current_delay_ms: 0,
            active: false,
            pending: HashMap::new(),
            reveal_order: BTreeMap::new(),
            next_seq: 0,
            next_generated_id: 0,
            observers: QueueObservers::new(),
            stats: DelayStats::default(),
        }
    }

    // ── Lifecycle ───────────────────────────────────────────────────

    /// Activate with `initial_delay_ms` and subscribe to the feed.
    ///
    /// A second `start` while active, or a missing feed container, is
    /// logged and leaves the manager as it was.
    pub fn start(&mut self, initial_delay_ms: u64) -> StartOutcome {
        if self.active {
            tracing::warn!("delay manager already active, ignoring start");
            return StartOutcome::AlreadyActive;
        }

        if let Err(e) = self.notifier.subscribe() {
            tracing::warn!("live feed unavailable, delay stays off: {e}");
            return StartOutcome::FeedUnavailable;
        }

        self.current_delay_ms = initial_delay_ms;
        self.active = true;
        tracing::info!("delay manager started with {initial_delay_ms} ms delay");
        StartOutcome::Started
    }

    /// Change the delay for items arriving from now on.
    pub fn set_delay(&mut self, new_delay_ms: u64) {
        if new_delay_ms != self.current_delay_ms {
            tracing::info!(
                "delay changed {} ms -> {new_delay_ms} ms ({} pending keep their reveal time)",
                self.current_delay_ms,
                self.pending.len()
            );
        }
        self.current_delay_ms = new_delay_ms;
    }

    /// Unsubscribe, cancel every timer, and reveal every pending item now.
    ///
    /// Returns the number of items revealed. Observers always receive 0.
    pub fn stop(&mut self) -> usize {
        if self.active {
            self.notifier.unsubscribe();
        }

        let order = std::mem::take(&mut self.reveal_order);
        let mut revealed = 0;
        for identity in order.into_values() {
            let Some(item) = self.pending.remove(&identity) else {
                continue;
            };
            self.scheduler.cancel(item.timer);
            if self.reveal_item(&item, RevealCause::Stopped) {
                self.stats.revealed_on_stop += 1;
                revealed += 1;
            }
        }
        debug_assert!(self.pending.is_empty());
        self.pending.clear();

        if self.active {
            tracing::info!("delay manager stopped, revealed {revealed} pending items");
        }
        self.active = false;
        self.observers.notify(0);
        revealed
    }

    // ── Arrivals and timers ─────────────────────────────────────────

    /// Intercept one newly appended feed item at `now_ms`.
    pub fn handle_arrival(&mut self, item: FeedItem<P::Handle>, now_ms: u64) -> ArrivalOutcome {
        if !self.active {
            tracing::debug!("arrival while inactive, leaving item visible");
            return ArrivalOutcome::Inactive;
        }

        // 1. Pass-through mode
        if self.current_delay_ms == 0 {
            self.stats.passed_through += 1;
            return ArrivalOutcome::PassThrough;
        }

        // 2. Identity and duplicate check
        let identity = self.identity_for(&item);
        if self.pending.contains_key(&identity) {
            tracing::debug!("duplicate arrival for pending item {identity}, ignoring");
            self.stats.duplicates_ignored += 1;
            return ArrivalOutcome::Duplicate(identity);
        }

        // 3. Hide
        if let Err(e) = self.sink.hide(&item.handle) {
            tracing::warn!("failed to hide item {identity}, leaving it visible: {e}");
            self.stats.hide_failures += 1;
            return ArrivalOutcome::HideFailed(identity);
        }

        // 4. Make room, only once the new item is actually withheld
        let evicted = if self.pending.len() >= self.config.capacity {
            self.evict_oldest()
        } else {
            None
        };

        // 5. Schedule reveal
        let delay_ms = self.current_delay_ms;
        let reveal_at_ms = now_ms.saturating_add(delay_ms);
        let timer = self.scheduler.schedule(identity.clone(), now_ms, delay_ms);

        // 6. Track and notify
        let seq = self.next_seq;
        self.next_seq += 1;
        let pending = PendingItem {
            identity: identity.clone(),
            handle: item.handle,
            arrived_at_ms: now_ms,
            reveal_at_ms,
            timer,
            seq,
        };
        self.reveal_order.insert(pending.order_key(), identity.clone());
        self.pending.insert(identity.clone(), pending);
        self.stats.hidden += 1;
        self.observers.notify(self.pending.len());

        ArrivalOutcome::Hidden {
            identity,
            reveal_at_ms,
            evicted,
        }
    }

    /// Reveal the item whose timer `token` fired.
    ///
    /// Returns `false` for stale timers: the item is no longer pending, or
    /// is pending under a different timer.
    pub fn on_timer_fired(&mut self, token: S::Token, identity: &ItemIdentity) -> bool {
        let live = self
            .pending
            .get(identity)
            .is_some_and(|item| item.timer == token);
        if !live {
            tracing::debug!("stale timer for {identity}, ignoring");
            return false;
        }

        let Some(item) = self.pending.remove(identity) else {
            return false;
        };
        self.reveal_order.remove(&item.order_key());
        if self.reveal_item(&item, RevealCause::Expired) {
            self.stats.revealed_on_expiry += 1;
        }
        self.observers.notify(self.pending.len());
        true
    }

    // ── Observers ───────────────────────────────────────────────────

    /// Register a callback invoked with the new pending count on every
    /// change (insert, expiry, eviction) and with 0 on `stop`.
    pub fn on_queue_size_change(
        &mut self,
        callback: impl FnMut(usize) + Send + 'static,
    ) -> ObserverId {
        self.observers.register(callback)
    }

    pub fn remove_queue_size_observer(&mut self, id: ObserverId) -> bool {
        self.observers.remove(id)
    }

    // ── Reads ───────────────────────────────────────────────────────

    pub fn queue_size(&self) -> usize {
        self.pending.len()
    }

    pub fn current_delay(&self) -> u64 {
        self.current_delay_ms
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    pub fn pending(&self, identity: &ItemIdentity) -> Option<&PendingItem<P::Handle, S::Token>> {
        self.pending.get(identity)
    }

    /// Pending identities, earliest reveal first.
    pub fn pending_identities(&self) -> Vec<ItemIdentity> {
        self.reveal_order.values().cloned().collect()
    }

    pub fn status(&self) -> DelayStatus {
        DelayStatus {
            active: self.active,
            delay_ms: self.current_delay_ms,
            queue_size: self.pending.len(),
            capacity: self.config.capacity,
            level: QueueLevel::classify(self.pending.len(), self.config.capacity),
            next_reveal_at_ms: self.reveal_order.first_key_value().map(|((at, _), _)| *at),
        }
    }

    pub fn stats(&self) -> &DelayStats {
        &self.stats
    }

    pub fn sink(&self) -> &P {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut P {
        &mut self.sink
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    pub fn notifier_mut(&mut self) -> &mut N {
        &mut self.notifier
    }

    // ── Internal ────────────────────────────────────────────────────

    fn identity_for(&mut self, item: &FeedItem<P::Handle>) -> ItemIdentity {
        match item.native_id() {
            Some(id) => ItemIdentity::native(id),
            None => {
                let n = self.next_generated_id;
                self.next_generated_id += 1;
                ItemIdentity::Generated(n)
            }
        }
    }

    /// Force-reveal the pending item with the earliest reveal time.
    fn evict_oldest(&mut self) -> Option<ItemIdentity> {
        let (_, identity) = self.reveal_order.pop_first()?;
        let item = self.pending.remove(&identity)?;
        self.scheduler.cancel(item.timer);
        tracing::debug!(
            "queue at capacity ({}), force-revealing {identity} early",
            self.config.capacity
        );
        if self.reveal_item(&item, RevealCause::Evicted) {
            self.stats.evicted += 1;
        }
        self.observers.notify(self.pending.len());
        Some(identity)
    }

    /// Returns `false` if the sink failed; the item is dropped either way.
    fn reveal_item(&mut self, item: &PendingItem<P::Handle, S::Token>, cause: RevealCause) -> bool {
        match self.sink.reveal(&item.handle, cause) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    "failed to reveal item {} ({}), dropping it from the queue: {e}",
                    item.identity,
                    cause.as_str()
                );
                self.stats.reveal_failures += 1;
                false
            }
        }
    }
}

impl<P, N> DelayManager<P, VirtualScheduler, N>
where
    P: PresentationSink,
    N: FeedNotifier,
{
    /// Advance the virtual clock and fire every due timer.
    /// Returns the number of items revealed by expiry.
    pub fn advance_to(&mut self, now_ms: u64) -> usize {
        let due = self.scheduler.advance_to(now_ms);
        due.into_iter()
            .filter(|(token, identity)| self.on_timer_fired(*token, identity))
            .count()
    }
}

impl<P, S, N> std::fmt::Debug for DelayManager<P, S, N>
where
    P: PresentationSink,
    S: TimerScheduler,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelayManager")
            .field("active", &self.active)
            .field("current_delay_ms", &self.current_delay_ms)
            .field("pending", &self.pending.len())
            .field("capacity", &self.config.capacity)
            .field("observers", &self.observers)
            .finish()
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
