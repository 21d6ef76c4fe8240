//! Item-arrival notifier seam.
//!
//! The manager subscribes on `start` and unsubscribes on `stop`. Arrivals
//! themselves are pushed into `DelayManager::handle_arrival` by whoever
//! owns the subscription's event stream.

use crate::error::NotifierError;

pub trait FeedNotifier {
    /// Attach to the live feed container.
    ///
    /// `NotifierError::ContainerNotFound` means the feed is absent; the
    /// manager treats every error as "stay inactive".
    fn subscribe(&mut self) -> Result<(), NotifierError>;

    /// Detach. Must be safe to call when not subscribed.
    fn unsubscribe(&mut self);
}

/// Notifier for embedders that push arrivals directly.
///
/// The feed is either always present or always absent; it only tracks
/// whether it is currently subscribed.
#[derive(Debug, Clone, Default)]
pub struct StaticNotifier {
    available: bool,
    subscribed: bool,
    subscribe_calls: u32,
}

impl StaticNotifier {
    pub fn available() -> Self {
        Self {
            available: true,
            ..Self::default()
        }
    }

    pub fn absent() -> Self {
        Self::default()
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscribed
    }

    pub fn subscribe_calls(&self) -> u32 {
        self.subscribe_calls
    }
}

impl FeedNotifier for StaticNotifier {
    fn subscribe(&mut self) -> Result<(), NotifierError> {
        self.subscribe_calls += 1;
        if !self.available {
            return Err(NotifierError::ContainerNotFound("live feed".to_string()));
        }
        self.subscribed = true;
        Ok(())
    }

    fn unsubscribe(&mut self) {
        self.subscribed = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_feed_refuses_subscription() {
        let mut n = StaticNotifier::absent();
        assert!(matches!(
            n.subscribe(),
            Err(NotifierError::ContainerNotFound(_))
        ));
        assert!(!n.is_subscribed());
        assert_eq!(n.subscribe_calls(), 1);
    }

    #[test]
    fn subscribe_unsubscribe_cycle() {
        let mut n = StaticNotifier::available();
        n.subscribe().expect("subscribe");
        assert!(n.is_subscribed());
        n.unsubscribe();
        assert!(!n.is_subscribed());
        n.unsubscribe();
        assert!(!n.is_subscribed());
    }
}
