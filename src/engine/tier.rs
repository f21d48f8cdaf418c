//! The 7-point qualitative risk scale.
//!
//! A `Tier` is one indicator's current band on the Excellent..Extreme scale.
//! Its integer value is also its numeric contribution to the composite score
//! before weighting.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Canonical labels for tiers 1..=7, in order.
const TIER_LABELS: [&str; 7] = [
    "excellent",
    "good",
    "fair",
    "concerning",
    "dangerous",
    "severe",
    "extreme",
];

/// Composite score sub-ranges for level naming: (label, min, max).
/// Half-open on the upper bound except the final range, which includes 7.0.
const LEVEL_RANGES: [(&str, f64, f64); 7] = [
    ("excellent", 1.0, 1.7),
    ("good", 1.7, 2.4),
    ("fair", 2.4, 3.1),
    ("concerning", 3.1, 4.2),
    ("dangerous", 4.2, 5.5),
    ("severe", 5.5, 6.5),
    ("extreme", 6.5, 7.0),
];

/// One of 7 ordered qualitative risk bands assigned to an indicator value.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
pub struct Tier(u8);

impl Tier {
    /// Lowest-risk tier (Excellent).
    pub const MIN: Tier = Tier(1);
    /// Highest-risk tier (Extreme).
    pub const MAX: Tier = Tier(7);

    /// Construct from an integer in 1..=7.
    pub fn new(value: u8) -> Option<Self> {
        (1..=7).contains(&value).then_some(Tier(value))
    }

    /// Map a composite score in [1.0, 7.0] to its alert tier.
    ///
    /// Uses the same sub-ranges as [`level_name`], so the alert state machine
    /// and the human-readable level always agree.
    pub fn from_composite(score: f64) -> Tier {
        let clamped = score.clamp(1.0, 7.0);
        for (i, &(_, min, max)) in LEVEL_RANGES.iter().enumerate() {
            if clamped >= min && clamped < max {
                return Tier(i as u8 + 1);
            }
        }
        Tier::MAX
    }

    /// Integer value in 1..=7.
    pub fn value(&self) -> u8 {
        self.0
    }

    /// Contribution to the composite score before weighting.
    pub fn as_f64(&self) -> f64 {
        f64::from(self.0)
    }

    /// Canonical label (excellent..extreme).
    pub fn label(&self) -> &'static str {
        TIER_LABELS[(self.0 - 1) as usize]
    }

    /// Tiers at or above Concerning warrant attention in exit-signal checks.
    pub fn is_concerning(&self) -> bool {
        self.0 >= 4
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.0, self.label())
    }
}

impl TryFrom<u8> for Tier {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Tier::new(value).ok_or_else(|| format!("tier {value} out of range 1..=7"))
    }
}

impl From<Tier> for u8 {
    fn from(tier: Tier) -> u8 {
        tier.0
    }
}

/// Level name for a composite score in [1.0, 7.0].
pub fn level_name(score: f64) -> &'static str {
    Tier::from_composite(score).label()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_range() {
        assert!(Tier::new(0).is_none());
        assert!(Tier::new(8).is_none());
        assert_eq!(Tier::new(1), Some(Tier::MIN));
        assert_eq!(Tier::new(7), Some(Tier::MAX));
    }

    #[test]
    fn test_labels_ordered() {
        assert_eq!(Tier::MIN.label(), "excellent");
        assert_eq!(Tier::new(4).unwrap().label(), "concerning");
        assert_eq!(Tier::MAX.label(), "extreme");
    }

    #[test]
    fn test_from_composite_ranges() {
        assert_eq!(Tier::from_composite(1.0).value(), 1);
        assert_eq!(Tier::from_composite(1.69).value(), 1);
        assert_eq!(Tier::from_composite(1.7).value(), 2);
        assert_eq!(Tier::from_composite(3.0).value(), 3);
        assert_eq!(Tier::from_composite(3.6).value(), 4);
        assert_eq!(Tier::from_composite(5.0).value(), 5);
        assert_eq!(Tier::from_composite(7.0).value(), 7);
    }

    #[test]
    fn test_from_composite_clamps() {
        assert_eq!(Tier::from_composite(0.0).value(), 1);
        assert_eq!(Tier::from_composite(9.5).value(), 7);
        assert_eq!(Tier::from_composite(f64::NAN).value(), 7); // clamp(NaN) -> NaN falls through to MAX
    }

    #[test]
    fn test_serde_roundtrip() {
        let json = serde_json::to_string(&Tier::new(5).unwrap()).unwrap();
        assert_eq!(json, "5");
        let tier: Tier = serde_json::from_str("3").unwrap();
        assert_eq!(tier.value(), 3);
        assert!(serde_json::from_str::<Tier>("9").is_err());
    }

    #[test]
    fn test_level_name() {
        assert_eq!(level_name(3.6), "concerning");
        assert_eq!(level_name(5.6), "severe");
    }
}
