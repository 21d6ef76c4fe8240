//! Persisted delay preference.
//!
//! The preference is a single numeric value in an external key-value
//! store. A missing, unreadable, or unoffered value falls back to a valid
//! choice; loading never fails.

use std::collections::HashMap;

use crate::choices::{DelayChoice, snap_to_choice};
use crate::error::PreferenceError;

/// Key of the preferred delay, in milliseconds.
pub const PREFERRED_DELAY_KEY: &str = "preferred_delay_ms";

/// Minimal numeric key-value store.
pub trait PreferenceStore {
    fn get_u64(&self, key: &str) -> Result<Option<u64>, PreferenceError>;

    fn set_u64(&mut self, key: &str, value: u64) -> Result<(), PreferenceError>;
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryPreferenceStore {
    values: HashMap<String, u64>,
}

impl InMemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for InMemoryPreferenceStore {
    fn get_u64(&self, key: &str) -> Result<Option<u64>, PreferenceError> {
        Ok(self.values.get(key).copied())
    }

    fn set_u64(&mut self, key: &str, value: u64) -> Result<(), PreferenceError> {
        self.values.insert(key.to_string(), value);
        Ok(())
    }
}

/// Load the preferred delay. Defaults to no delay.
pub fn load_preferred_delay<S: PreferenceStore + ?Sized>(store: &S) -> DelayChoice {
    match store.get_u64(PREFERRED_DELAY_KEY) {
        Ok(Some(ms)) => DelayChoice::from_ms(ms).unwrap_or_else(|| {
            let snapped = snap_to_choice(ms);
            tracing::debug!(
                "stored delay {ms} ms is not an offered choice, using {} ms",
                snapped.ms()
            );
            snapped
        }),
        Ok(None) => DelayChoice::NONE,
        Err(e) => {
            tracing::warn!("failed to read delay preference, using no delay: {e}");
            DelayChoice::NONE
        }
    }
}

/// Persist the preferred delay. Only offered choices are accepted.
pub fn save_preferred_delay<S: PreferenceStore + ?Sized>(
    store: &mut S,
    delay_ms: u64,
) -> Result<DelayChoice, PreferenceError> {
    let choice = DelayChoice::from_ms(delay_ms).ok_or(PreferenceError::NotAChoice(delay_ms))?;
    store.set_u64(PREFERRED_DELAY_KEY, choice.ms())?;
    Ok(choice)
}
