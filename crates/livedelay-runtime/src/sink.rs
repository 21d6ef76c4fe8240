//! JSON-lines presentation sink.
//!
//! Each hide/reveal/show becomes one JSON object on the output stream. The
//! payload of a hidden item is kept aside and re-emitted verbatim on
//! reveal, so the consumer can restore it exactly.

use std::collections::HashMap;
use std::io::Write;

use chrono::{DateTime, Utc};
use serde::Serialize;

use livedelay_core::{PresentationSink, RevealCause, SinkError};

use crate::feed::{PostHandle, PostKey};

/// A revealed item among the newest this many feed items is scrolled into
/// view.
pub const NEAR_BOTTOM_ITEMS: u64 = 3;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PresentationEvent {
    /// Shown immediately, never withheld.
    Show {
        id: Option<String>,
        position: u64,
        payload: serde_json::Value,
    },
    /// Collapsed: no content is exposed while pending.
    Hide { id: Option<String>, position: u64 },
    Reveal {
        id: Option<String>,
        position: u64,
        cause: RevealCause,
        /// Scroll the item into view.
        follow: bool,
        payload: serde_json::Value,
    },
}

#[derive(Serialize)]
struct EventLine<'a> {
    at: DateTime<Utc>,
    #[serde(flatten)]
    event: &'a PresentationEvent,
}

/// Saved presentation of a hidden item.
#[derive(Debug, Clone)]
struct Saved {
    position: u64,
    payload: serde_json::Value,
}

pub struct JsonLinesSink<W: Write> {
    out: W,
    hidden: HashMap<PostKey, Saved>,
    /// Position of the newest item seen on the feed.
    newest_position: Option<u64>,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            hidden: HashMap::new(),
            newest_position: None,
        }
    }

    /// Record that an item at `position` was appended to the feed, whether
    /// or not it gets withheld.
    pub fn note_arrival(&mut self, position: u64) {
        self.newest_position = Some(self.newest_position.map_or(position, |p| p.max(position)));
    }

    /// Emit an item that is not withheld.
    pub fn show(&mut self, handle: &PostHandle) -> Result<(), SinkError> {
        self.emit(&PresentationEvent::Show {
            id: handle.id.clone(),
            position: handle.position,
            payload: handle.payload.clone(),
        })
    }

    #[cfg(test)]
    pub fn hidden_count(&self) -> usize {
        self.hidden.len()
    }

    #[cfg(test)]
    pub fn get_ref(&self) -> &W {
        &self.out
    }

    fn near_bottom(&self, position: u64) -> bool {
        self.newest_position
            .is_none_or(|newest| newest.saturating_sub(position) < NEAR_BOTTOM_ITEMS)
    }

    fn emit(&mut self, event: &PresentationEvent) -> Result<(), SinkError> {
        let line = EventLine {
            at: Utc::now(),
            event,
        };
        serde_json::to_writer(&mut self.out, &line).map_err(std::io::Error::from)?;
        self.out.write_all(b"\n")?;
        self.out.flush()?;
        Ok(())
    }
}

impl<W: Write> PresentationSink for JsonLinesSink<W> {
    type Handle = PostHandle;

    fn hide(&mut self, handle: &PostHandle) -> Result<(), SinkError> {
        let key = handle.key();
        if self.hidden.contains_key(&key) {
            return Err(SinkError::AlreadyHidden(key.to_string()));
        }
        self.emit(&PresentationEvent::Hide {
            id: handle.id.clone(),
            position: handle.position,
        })?;
        self.hidden.insert(
            key,
            Saved {
                position: handle.position,
                payload: handle.payload.clone(),
            },
        );
        Ok(())
    }

    fn reveal(&mut self, handle: &PostHandle, cause: RevealCause) -> Result<(), SinkError> {
        let key = handle.key();
        let saved = self
            .hidden
            .remove(&key)
            .ok_or_else(|| SinkError::NotHidden(key.to_string()))?;
        // Forced reveals (stop, eviction) never move the viewport.
        let follow = cause == RevealCause::Expired && self.near_bottom(saved.position);
        self.emit(&PresentationEvent::Reveal {
            id: handle.id.clone(),
            position: saved.position,
            cause,
            follow,
            payload: saved.payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(key: &str, position: u64) -> PostHandle {
        PostHandle {
            id: Some(key.to_string()),
            position,
            payload: serde_json::json!({"id": key, "body": format!("text of {key}")}),
        }
    }

    fn lines(sink: &JsonLinesSink<Vec<u8>>) -> Vec<serde_json::Value> {
        String::from_utf8(sink.get_ref().clone())
            .expect("utf8")
            .lines()
            .map(|l| serde_json::from_str(l).expect("json line"))
            .collect()
    }

    #[test]
    fn hide_emits_no_payload() {
        let mut sink = JsonLinesSink::new(Vec::new());
        sink.hide(&handle("p1", 0)).expect("hide");
        let out = lines(&sink);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0]["event"], "hide");
        assert_eq!(out[0]["id"], "p1");
        assert!(out[0].get("payload").is_none());
        assert!(out[0]["at"].is_string());
    }

    #[test]
    fn reveal_restores_saved_payload() {
        let mut sink = JsonLinesSink::new(Vec::new());
        let h = handle("p1", 0);
        sink.hide(&h).expect("hide");
        sink.reveal(&h, RevealCause::Expired).expect("reveal");

        let out = lines(&sink);
        assert_eq!(out[1]["event"], "reveal");
        assert_eq!(out[1]["cause"], "expired");
        assert_eq!(out[1]["payload"], h.payload);
        assert_eq!(sink.hidden_count(), 0);
    }

    #[test]
    fn reveal_without_hide_fails() {
        let mut sink = JsonLinesSink::new(Vec::new());
        let err = sink
            .reveal(&handle("ghost", 0), RevealCause::Stopped)
            .expect_err("not hidden");
        assert!(matches!(err, SinkError::NotHidden(_)));
        assert!(lines(&sink).is_empty());
    }

    #[test]
    fn follow_only_near_bottom() {
        let mut sink = JsonLinesSink::new(Vec::new());
        let old = handle("old", 0);
        let recent = handle("recent", 8);
        sink.note_arrival(0);
        sink.hide(&old).expect("hide");
        sink.note_arrival(8);
        sink.hide(&recent).expect("hide");
        sink.note_arrival(10);

        sink.reveal(&old, RevealCause::Expired).expect("reveal");
        sink.reveal(&recent, RevealCause::Expired).expect("reveal");
        let out = lines(&sink);
        assert_eq!(out[2]["follow"], false);
        assert_eq!(out[3]["follow"], true);
    }

    #[test]
    fn forced_reveal_never_follows() {
        let mut sink = JsonLinesSink::new(Vec::new());
        let h = handle("p1", 0);
        sink.note_arrival(0);
        sink.hide(&h).expect("hide");
        sink.reveal(&h, RevealCause::Evicted).expect("reveal");
        assert_eq!(lines(&sink)[1]["follow"], false);
    }

    #[test]
    fn anonymous_item_does_not_clash_with_lookalike_id() {
        let mut sink = JsonLinesSink::new(Vec::new());
        let anon = PostHandle {
            id: None,
            position: 3,
            payload: serde_json::json!({"body": "anonymous"}),
        };
        let named = handle("line-3", 4);
        let named_display = handle("line 3", 5);
        sink.hide(&anon).expect("hide anonymous");
        sink.hide(&named).expect("hide named");
        sink.hide(&named_display).expect("hide display lookalike");
        assert_eq!(sink.hidden_count(), 3);

        sink.reveal(&anon, RevealCause::Expired).expect("reveal");
        let out = lines(&sink);
        assert!(out[0]["id"].is_null());
        assert_eq!(out[0]["position"], 3);
        assert_eq!(out[3]["payload"]["body"], "anonymous");
        assert!(sink.reveal(&anon, RevealCause::Stopped).is_err());
        sink.reveal(&named, RevealCause::Stopped).expect("named still hidden");
    }

    #[test]
    fn show_emits_payload() {
        let mut sink = JsonLinesSink::new(Vec::new());
        sink.show(&handle("p1", 0)).expect("show");
        let out = lines(&sink);
        assert_eq!(out[0]["event"], "show");
        assert_eq!(out[0]["payload"]["body"], "text of p1");
    }
}
