//! Hysteresis alert state machine.
//!
//! Holds the confirmed threat tier as explicit state and emits transition
//! events rather than raw scores. Escalation needs the persistence filter's
//! confirmation window K; de-escalation needs the lower candidate to hold for
//! the separate, larger window K'. Raising the alarm is easier than standing
//! it down, which prevents flapping around a boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::aggregator::{CompositeScore, IndicatorScore};
use super::persistence::FilterDecision;
use super::tier::Tier;

/// The alert state carried across cycles. Only this machine's transition
/// rule may change the tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmedState {
    /// Current confirmed threat tier.
    pub tier: Tier,
    /// Evaluation cycles the tier has held (including the transition cycle).
    pub cycles_held: u64,
    /// When the tier was last changed; `None` until the first transition.
    pub last_transition: Option<DateTime<Utc>>,
}

impl ConfirmedState {
    pub fn baseline(tier: Tier) -> Self {
        Self {
            tier,
            cycles_held: 0,
            last_transition: None,
        }
    }
}

/// Direction of a confirmed transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransitionKind {
    Escalation,
    Deescalation,
}

/// Emitted once per confirmed transition, for the external notifier.
#[derive(Debug, Clone, Serialize)]
pub struct TransitionEvent {
    pub from: Tier,
    pub to: Tier,
    pub kind: TransitionKind,
    pub timestamp: DateTime<Utc>,
    /// Composite score that drove the transition.
    pub composite: f64,
    /// Per-indicator breakdown at transition time, for explainability.
    pub breakdown: Vec<IndicatorScore>,
}

/// Tiered alert state machine with asymmetric confirmation windows.
///
/// No terminal state; the machine runs indefinitely. Applying the same
/// confirmed tier repeatedly is a no-op.
#[derive(Debug, Clone)]
pub struct AlertStateMachine {
    state: ConfirmedState,
    /// Escalation window K. Matches the persistence filter's confirmation
    /// window, so a filter-confirmed higher tier escalates immediately.
    escalation_cycles: usize,
    /// De-escalation window K' >= K.
    deescalation_cycles: usize,
}

impl AlertStateMachine {
    pub fn new(baseline: Tier, escalation_cycles: usize, deescalation_cycles: usize) -> Self {
        Self {
            state: ConfirmedState::baseline(baseline),
            escalation_cycles: escalation_cycles.max(1),
            deescalation_cycles: deescalation_cycles.max(escalation_cycles.max(1)),
        }
    }

    /// Resume from checkpointed state.
    pub fn restore(
        state: ConfirmedState,
        escalation_cycles: usize,
        deescalation_cycles: usize,
    ) -> Self {
        let mut machine = Self::new(state.tier, escalation_cycles, deescalation_cycles);
        machine.state = state;
        machine
    }

    pub fn state(&self) -> &ConfirmedState {
        &self.state
    }

    /// Apply one cycle's filter decision. Returns the transition event if a
    /// tier change was confirmed this cycle.
    ///
    /// Once returned, a transition is authoritative; it is never retracted.
    pub fn apply(
        &mut self,
        decision: &FilterDecision,
        timestamp: DateTime<Utc>,
        composite: &CompositeScore,
    ) -> Option<TransitionEvent> {
        let current = self.state.tier;

        let transition = if decision.candidate > current
            && decision.streak >= self.escalation_cycles
        {
            Some(TransitionKind::Escalation)
        } else if decision.candidate < current && decision.streak >= self.deescalation_cycles {
            Some(TransitionKind::Deescalation)
        } else {
            None
        };

        match transition {
            Some(kind) => {
                let event = TransitionEvent {
                    from: current,
                    to: decision.candidate,
                    kind,
                    timestamp,
                    composite: composite.score,
                    breakdown: composite.breakdown.clone(),
                };
                self.state.tier = decision.candidate;
                self.state.cycles_held = 1;
                self.state.last_transition = Some(timestamp);
                info!(
                    from = event.from.value(),
                    to = event.to.value(),
                    kind = ?event.kind,
                    composite = %format!("{:.2}", event.composite),
                    "alert transition confirmed"
                );
                Some(event)
            }
            None => {
                self.state.cycles_held += 1;
                None
            }
        }
    }
}
