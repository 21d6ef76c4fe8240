//! The discrete delay options offered to the user.

use serde::{Deserialize, Serialize};

/// Offered delays in milliseconds: no delay, then 15s steps up to 2 minutes.
pub const DELAY_CHOICES_MS: [u64; 9] = [
    0, 15_000, 30_000, 45_000, 60_000, 75_000, 90_000, 105_000, 120_000,
];

/// One of [`DELAY_CHOICES_MS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "ChoiceRepr", try_from = "ChoiceRepr")]
pub struct DelayChoice {
    ms: u64,
}

impl DelayChoice {
    pub const NONE: DelayChoice = DelayChoice { ms: 0 };

    /// Exact lookup; `None` for values outside the offered set.
    pub fn from_ms(ms: u64) -> Option<Self> {
        DELAY_CHOICES_MS.contains(&ms).then_some(Self { ms })
    }

    pub fn all() -> impl Iterator<Item = DelayChoice> {
        DELAY_CHOICES_MS.iter().map(|&ms| DelayChoice { ms })
    }

    pub fn ms(&self) -> u64 {
        self.ms
    }

    pub fn is_pass_through(&self) -> bool {
        self.ms == 0
    }

    /// Option label: `"no delay"` or whole seconds such as `"15s"`.
    pub fn label(&self) -> String {
        if self.ms == 0 {
            "no delay".to_string()
        } else {
            format!("{}s", self.ms / 1000)
        }
    }
}

impl Default for DelayChoice {
    fn default() -> Self {
        Self::NONE
    }
}

/// Nearest offered choice; ties resolve to the shorter delay.
pub fn snap_to_choice(ms: u64) -> DelayChoice {
    let mut best = DelayChoice::NONE;
    let mut best_distance = u64::MAX;
    for choice in DelayChoice::all() {
        let distance = choice.ms.abs_diff(ms);
        if distance < best_distance {
            best = choice;
            best_distance = distance;
        }
    }
    best
}

// ─── Serde shape ────────────────────────────────────────────────────

#[derive(Serialize, Deserialize)]
struct ChoiceRepr {
    ms: u64,
    #[serde(default)]
    label: String,
}

impl From<DelayChoice> for ChoiceRepr {
    fn from(choice: DelayChoice) -> Self {
        Self {
            ms: choice.ms,
            label: choice.label(),
        }
    }
}

impl TryFrom<ChoiceRepr> for DelayChoice {
    type Error = String;

    fn try_from(repr: ChoiceRepr) -> Result<Self, Self::Error> {
        DelayChoice::from_ms(repr.ms).ok_or_else(|| format!("{} ms is not an offered delay", repr.ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offered_set_is_fixed() {
        let all: Vec<u64> = DelayChoice::all().map(|c| c.ms()).collect();
        assert_eq!(all, DELAY_CHOICES_MS.to_vec());
        assert_eq!(all.len(), 9);
    }

    #[test]
    fn exact_lookup() {
        assert_eq!(DelayChoice::from_ms(45_000).map(|c| c.ms()), Some(45_000));
        assert!(DelayChoice::from_ms(44_999).is_none());
        assert!(DelayChoice::from_ms(0).is_some_and(|c| c.is_pass_through()));
    }

    #[test]
    fn labels() {
        assert_eq!(DelayChoice::NONE.label(), "no delay");
        assert_eq!(snap_to_choice(105_000).label(), "105s");
    }

    #[test]
    fn snapping() {
        assert_eq!(snap_to_choice(0).ms(), 0);
        assert_eq!(snap_to_choice(7_000).ms(), 0);
        assert_eq!(snap_to_choice(8_000).ms(), 15_000);
        // 7_500 is equidistant from 0 and 15_000
        assert_eq!(snap_to_choice(7_500).ms(), 0);
        assert_eq!(snap_to_choice(10_000_000).ms(), 120_000);
    }

    #[test]
    fn serde_round_trip_rejects_unoffered() {
        let json = serde_json::to_value(DelayChoice::from_ms(30_000).unwrap()).unwrap();
        assert_eq!(json, serde_json::json!({"ms": 30000, "label": "30s"}));

        let bad: Result<DelayChoice, _> = serde_json::from_value(serde_json::json!({"ms": 31000}));
        assert!(bad.is_err());
    }
}
