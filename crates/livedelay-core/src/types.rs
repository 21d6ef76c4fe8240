//! Shared types: item identity, feed items, outcomes of manager operations.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Default upper bound on simultaneously withheld items.
pub const MAX_QUEUE_SIZE: usize = 100;

// ─── Identity ───────────────────────────────────────────────────────

/// Stable key of a withheld item.
///
/// Derived from the item's own identifier when it has one. Items without
/// an identifier get a key generated by the manager, which never collides
/// with another pending item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ItemIdentity {
    Native(String),
    Generated(u64),
}

impl ItemIdentity {
    pub fn native(id: impl Into<String>) -> Self {
        Self::Native(id.into())
    }
}

impl fmt::Display for ItemIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Native(id) => f.write_str(id),
            Self::Generated(n) => write!(f, "generated-{n}"),
        }
    }
}

// ─── Feed items ─────────────────────────────────────────────────────

/// A newly appended feed item as delivered by the arrival notifier.
///
/// `handle` is opaque to the manager; only the presentation sink
/// interprets it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedItem<H> {
    pub id: Option<String>,
    pub handle: H,
}

impl<H> FeedItem<H> {
    pub fn new(id: impl Into<String>, handle: H) -> Self {
        Self {
            id: Some(id.into()),
            handle,
        }
    }

    /// An item that carries no identifier of its own.
    pub fn anonymous(handle: H) -> Self {
        Self { id: None, handle }
    }

    /// The item's own identifier, ignoring blank ones.
    pub fn native_id(&self) -> Option<&str> {
        self.id.as_deref().map(str::trim).filter(|id| !id.is_empty())
    }
}

// ─── Reveal cause ───────────────────────────────────────────────────

/// Why a withheld item was revealed. Every item is revealed exactly once,
/// through exactly one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevealCause {
    /// Its delay window elapsed.
    Expired,
    /// The manager was stopped while it was pending.
    Stopped,
    /// It was the oldest pending item when the queue overflowed.
    Evicted,
}

impl RevealCause {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Expired => "expired",
            Self::Stopped => "stopped",
            Self::Evicted => "evicted",
        }
    }
}

// ─── Outcomes ───────────────────────────────────────────────────────

/// Result of `DelayManager::start`. Never an error: every non-started
/// case leaves the feed fully visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartOutcome {
    Started,
    /// `start` while already active; nothing changed.
    AlreadyActive,
    /// The feed container could not be located; the manager stays inactive.
    FeedUnavailable,
}

/// Result of handing one arrival to the manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArrivalOutcome {
    /// Manager is not active; the item is left alone.
    Inactive,
    /// Delay is zero; the item is shown immediately.
    PassThrough,
    /// An item with the same identity is already pending.
    Duplicate(ItemIdentity),
    /// Hiding failed; the item stays visible and is not queued.
    HideFailed(ItemIdentity),
    /// The item is now withheld until `reveal_at_ms`.
    Hidden {
        identity: ItemIdentity,
        reveal_at_ms: u64,
        /// Oldest pending item force-revealed to make room, if any.
        evicted: Option<ItemIdentity>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_id_ignores_blank() {
        assert_eq!(FeedItem::new("p1", ()).native_id(), Some("p1"));
        assert_eq!(FeedItem::new("  ", ()).native_id(), None);
        assert_eq!(FeedItem::anonymous(()).native_id(), None);
    }

    #[test]
    fn identity_display() {
        assert_eq!(ItemIdentity::native("post-42").to_string(), "post-42");
        assert_eq!(ItemIdentity::Generated(7).to_string(), "generated-7");
    }

    #[test]
    fn identity_serde_shape() {
        let json = serde_json::to_value(ItemIdentity::native("p1")).expect("serialize");
        assert_eq!(json, serde_json::json!({"kind": "native", "value": "p1"}));
    }

    #[test]
    fn reveal_cause_strings() {
        assert_eq!(RevealCause::Expired.as_str(), "expired");
        assert_eq!(RevealCause::Stopped.as_str(), "stopped");
        assert_eq!(RevealCause::Evicted.as_str(), "evicted");
        assert_eq!(
            serde_json::to_value(RevealCause::Evicted).expect("serialize"),
            serde_json::json!("evicted")
        );
    }
}
