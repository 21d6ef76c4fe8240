//! Queue-size observers.
//!
//! Any number of callbacks may be registered; each gets the new pending
//! count whenever it changes. Registration returns an id for removal.

use std::fmt;

/// Handle of a registered observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

type Callback = Box<dyn FnMut(usize) + Send>;

#[derive(Default)]
pub struct QueueObservers {
    next_id: u64,
    callbacks: Vec<(ObserverId, Callback)>,
}

impl QueueObservers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, callback: impl FnMut(usize) + Send + 'static) -> ObserverId {
        let id = ObserverId(self.next_id);
        self.next_id += 1;
        self.callbacks.push((id, Box::new(callback)));
        id
    }

    /// Returns `false` if `id` was not registered.
    pub fn remove(&mut self, id: ObserverId) -> bool {
        let before = self.callbacks.len();
        self.callbacks.retain(|(existing, _)| *existing != id);
        self.callbacks.len() != before
    }

    /// Invoke every observer, in registration order.
    pub fn notify(&mut self, size: usize) {
        for (_, callback) in &mut self.callbacks {
            callback(size);
        }
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }
}

impl fmt::Debug for QueueObservers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueObservers")
            .field("registered", &self.callbacks.len())
            .finish()
    }
}
