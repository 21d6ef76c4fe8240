//! Presentation sink seam: hides and reveals feed items.

use std::collections::HashSet;

use crate::error::SinkError;
use crate::types::RevealCause;

/// Side effects applied to withheld items.
///
/// `hide` must collapse the item (no layout space, not interactive, not
/// announced) while saving whatever is needed to restore it exactly.
/// `reveal` restores that saved presentation; the sink decides whether to
/// animate it and whether to scroll it into view.
pub trait PresentationSink {
    type Handle: Clone + std::fmt::Debug;

    fn hide(&mut self, handle: &Self::Handle) -> Result<(), SinkError>;

    fn reveal(&mut self, handle: &Self::Handle, cause: RevealCause) -> Result<(), SinkError>;
}

// ─── RecordingSink ──────────────────────────────────────────────────

/// One side effect observed by [`RecordingSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
    Hidden(String),
    Revealed(String, RevealCause),
}

/// In-memory sink keyed by string handles. Records every side effect in
/// order; individual handles can be made to fail.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    events: Vec<SinkEvent>,
    hidden: HashSet<String>,
    fail_hide: HashSet<String>,
    fail_reveal: HashSet<String>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every future `hide` of `handle` fail as if it had been detached.
    pub fn fail_hide_for(&mut self, handle: impl Into<String>) {
        self.fail_hide.insert(handle.into());
    }

    /// Make every future `reveal` of `handle` fail as if it had been detached.
    pub fn fail_reveal_for(&mut self, handle: impl Into<String>) {
        self.fail_reveal.insert(handle.into());
    }

    pub fn events(&self) -> &[SinkEvent] {
        &self.events
    }

    pub fn is_hidden(&self, handle: &str) -> bool {
        self.hidden.contains(handle)
    }

    pub fn hidden_count(&self) -> usize {
        self.hidden.len()
    }

    /// Handles revealed so far, in reveal order.
    pub fn revealed(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|e| match e {
                SinkEvent::Revealed(h, _) => Some(h.as_str()),
                SinkEvent::Hidden(_) => None,
            })
            .collect()
    }

    pub fn reveal_cause(&self, handle: &str) -> Option<RevealCause> {
        self.events.iter().rev().find_map(|e| match e {
            SinkEvent::Revealed(h, cause) if h == handle => Some(*cause),
            _ => None,
        })
    }

    pub fn hide_count(&self, handle: &str) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, SinkEvent::Hidden(h) if h == handle))
            .count()
    }
}

impl PresentationSink for RecordingSink {
    type Handle = String;

    fn hide(&mut self, handle: &String) -> Result<(), SinkError> {
        if self.fail_hide.contains(handle) {
            return Err(SinkError::Detached(handle.clone()));
        }
        if !self.hidden.insert(handle.clone()) {
            return Err(SinkError::AlreadyHidden(handle.clone()));
        }
        self.events.push(SinkEvent::Hidden(handle.clone()));
        Ok(())
    }

    fn reveal(&mut self, handle: &String, cause: RevealCause) -> Result<(), SinkError> {
        if !self.hidden.remove(handle) {
            return Err(SinkError::NotHidden(handle.clone()));
        }
        if self.fail_reveal.contains(handle) {
            return Err(SinkError::Detached(handle.clone()));
        }
        self.events.push(SinkEvent::Revealed(handle.clone(), cause));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hide_then_reveal_records_both() {
        let mut sink = RecordingSink::new();
        sink.hide(&"p1".to_string()).expect("hide");
        assert!(sink.is_hidden("p1"));
        sink.reveal(&"p1".to_string(), RevealCause::Expired)
            .expect("reveal");
        assert!(!sink.is_hidden("p1"));
        assert_eq!(
            sink.events(),
            &[
                SinkEvent::Hidden("p1".into()),
                SinkEvent::Revealed("p1".into(), RevealCause::Expired),
            ]
        );
    }

    #[test]
    fn reveal_unknown_handle_fails() {
        let mut sink = RecordingSink::new();
        let err = sink
            .reveal(&"ghost".to_string(), RevealCause::Stopped)
            .expect_err("not hidden");
        assert!(matches!(err, SinkError::NotHidden(_)));
    }

    #[test]
    fn double_hide_fails() {
        let mut sink = RecordingSink::new();
        sink.hide(&"p1".to_string()).expect("hide");
        assert!(matches!(
            sink.hide(&"p1".to_string()),
            Err(SinkError::AlreadyHidden(_))
        ));
        assert_eq!(sink.hide_count("p1"), 1);
    }

    #[test]
    fn injected_failures() {
        let mut sink = RecordingSink::new();
        sink.fail_hide_for("a");
        sink.fail_reveal_for("b");
        assert!(sink.hide(&"a".to_string()).is_err());
        assert!(!sink.is_hidden("a"));

        sink.hide(&"b".to_string()).expect("hide");
        assert!(sink.reveal(&"b".to_string(), RevealCause::Expired).is_err());
        assert!(!sink.is_hidden("b"), "failed reveal still releases the handle");
        assert!(sink.revealed().is_empty());
    }
}
