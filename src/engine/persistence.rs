//! Consecutive-cycle persistence filtering.
//!
//! A candidate tier is "confirmed" only after holding for K consecutive
//! evaluation cycles. Until then the filter keeps reporting the previous
//! confirmed value, which is what suppresses single-sample noise. The streak
//! counter tracks the candidate tier itself, not agreement with the confirmed
//! value, so an outlier cycle resets an in-progress streak but a return to
//! the same candidate simply starts a fresh one.

use serde::{Deserialize, Serialize};

use super::tier::Tier;

/// Result of observing one cycle's candidate tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterDecision {
    /// The candidate observed this cycle.
    pub candidate: Tier,
    /// Consecutive cycles (including this one) the candidate has held.
    pub streak: usize,
    /// The effective, noise-filtered value: the last candidate that held for
    /// the full confirmation window.
    pub confirmed: Tier,
    /// True on the exact cycle a new candidate reached confirmation.
    pub newly_confirmed: bool,
}

/// Serializable filter state, for checkpointing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSnapshot {
    pub candidate: Option<Tier>,
    pub streak: usize,
    pub confirmed: Tier,
}

/// Requires a candidate tier to recur for K consecutive cycles before
/// treating it as confirmed.
#[derive(Debug, Clone)]
pub struct PersistenceFilter {
    /// Confirmation window K (cycles).
    required: usize,
    candidate: Option<Tier>,
    streak: usize,
    confirmed: Tier,
}

impl PersistenceFilter {
    /// `required` is clamped to at least 1; `baseline` is the confirmed value
    /// reported before anything else confirms.
    pub fn new(required: usize, baseline: Tier) -> Self {
        Self {
            required: required.max(1),
            candidate: None,
            streak: 0,
            confirmed: baseline,
        }
    }

    /// Feed this cycle's candidate tier and get the filtered view.
    pub fn observe(&mut self, candidate: Tier) -> FilterDecision {
        if self.candidate == Some(candidate) {
            self.streak += 1;
        } else {
            self.candidate = Some(candidate);
            self.streak = 1;
        }

        let mut newly_confirmed = false;
        if self.streak >= self.required && self.confirmed != candidate {
            self.confirmed = candidate;
            newly_confirmed = true;
        }

        FilterDecision {
            candidate,
            streak: self.streak,
            confirmed: self.confirmed,
            newly_confirmed,
        }
    }

    /// The current noise-filtered value.
    pub fn confirmed(&self) -> Tier {
        self.confirmed
    }

    pub fn snapshot(&self) -> FilterSnapshot {
        FilterSnapshot {
            candidate: self.candidate,
            streak: self.streak,
            confirmed: self.confirmed,
        }
    }

    pub fn restore(required: usize, snapshot: FilterSnapshot) -> Self {
        Self {
            required: required.max(1),
            candidate: snapshot.candidate,
            streak: snapshot.streak,
            confirmed: snapshot.confirmed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tier(v: u8) -> Tier {
        Tier::new(v).unwrap()
    }

    #[test]
    fn test_reports_baseline_before_confirmation() {
        let mut filter = PersistenceFilter::new(2, tier(1));
        let decision = filter.observe(tier(4));
        assert_eq!(decision.confirmed, tier(1));
        assert_eq!(decision.streak, 1);
        assert!(!decision.newly_confirmed);
    }

    #[test]
    fn test_confirms_after_required_cycles() {
        let mut filter = PersistenceFilter::new(2, tier(1));
        filter.observe(tier(4));
        let decision = filter.observe(tier(4));
        assert_eq!(decision.confirmed, tier(4));
        assert!(decision.newly_confirmed);
        // Holding further is not a new confirmation.
        let decision = filter.observe(tier(4));
        assert!(!decision.newly_confirmed);
        assert_eq!(decision.streak, 3);
    }

    #[test]
    fn test_single_spike_never_confirms() {
        let mut filter = PersistenceFilter::new(2, tier(2));
        filter.observe(tier(2));
        filter.observe(tier(2));
        let spike = filter.observe(tier(6));
        assert_eq!(spike.confirmed, tier(2));
        let reverted = filter.observe(tier(2));
        assert_eq!(reverted.confirmed, tier(2));
        // The spike reset the streak: the reverted candidate starts at 1.
        assert_eq!(reverted.streak, 1);
    }

    #[test]
    fn test_candidate_change_resets_streak() {
        let mut filter = PersistenceFilter::new(3, tier(1));
        filter.observe(tier(3));
        filter.observe(tier(3));
        filter.observe(tier(4)); // interrupts at streak 2
        let decision = filter.observe(tier(3));
        assert_eq!(decision.streak, 1);
        assert_eq!(decision.confirmed, tier(1));
    }

    #[test]
    fn test_window_of_one_confirms_immediately() {
        let mut filter = PersistenceFilter::new(1, tier(1));
        let decision = filter.observe(tier(5));
        assert_eq!(decision.confirmed, tier(5));
        assert!(decision.newly_confirmed);
    }

    #[test]
    fn test_snapshot_restore_roundtrip() {
        let mut filter = PersistenceFilter::new(2, tier(1));
        filter.observe(tier(3));
        let snapshot = filter.snapshot();

        let mut restored = PersistenceFilter::restore(2, snapshot);
        // One more observation of the same candidate completes the window.
        let decision = restored.observe(tier(3));
        assert!(decision.newly_confirmed);
        assert_eq!(decision.streak, 2);
    }
}
