//! livedelay-core: live-feed delay manager.
//! Withholds each newly arrived feed item for a configurable window and
//! reveals it afterwards, with a bounded pending queue and leak-free stop.
//!
//! Pure state machine: no async, no IO. Timers, presentation, and the
//! arrival feed are injected through the traits in [`scheduler`], [`sink`],
//! and [`notifier`].

pub mod choices;
pub mod error;
pub mod manager;
pub mod notifier;
pub mod observers;
pub mod preference;
pub mod scheduler;
pub mod sink;
pub mod status;
pub mod types;

pub use choices::{DELAY_CHOICES_MS, DelayChoice, snap_to_choice};
pub use error::{NotifierError, PreferenceError, SinkError};
pub use manager::{DelayManager, DelayManagerConfig, PendingItem};
pub use notifier::{FeedNotifier, StaticNotifier};
pub use observers::{ObserverId, QueueObservers};
pub use preference::{
    InMemoryPreferenceStore, PREFERRED_DELAY_KEY, PreferenceStore, load_preferred_delay,
    save_preferred_delay,
};
pub use scheduler::{TimerScheduler, TimerToken, VirtualScheduler};
pub use sink::{PresentationSink, RecordingSink, SinkEvent};
pub use status::{DelayStats, DelayStatus, QueueLevel};
pub use types::{ArrivalOutcome, FeedItem, ItemIdentity, MAX_QUEUE_SIZE, RevealCause, StartOutcome};
