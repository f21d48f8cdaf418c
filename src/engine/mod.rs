//! Composite threat scoring engine.
//!
//! One synchronous evaluation per cycle, driven by an external scheduler:
//! raw readings flow through classification and trend estimation, get
//! aggregated into a weighted composite score, pass the persistence filter,
//! and feed the hysteresis alert state machine. The pattern matcher runs off
//! the same cycle's tier vector and attaches historical context. The engine
//! never fetches data, never schedules, and never formats notifications;
//! those are external collaborators.
//!
//! Cross-cycle state is explicit and owned here: per-indicator histories,
//! last-known tiers, filter counters, and the confirmed alert state. Cycles
//! are independent and strictly ordered; a cycle can be discarded any time
//! before the state machine is applied.

mod aggregator;
mod alert;
mod checkpoint;
mod classifier;
mod config;
mod patterns;
mod persistence;
mod signals;
mod tier;
mod trend;

#[cfg(test)]
mod tests;

pub use aggregator::{AggregationEntry, CompositeScore, IndicatorScore, WeightedAggregator};
pub use alert::{AlertStateMachine, ConfirmedState, TransitionEvent, TransitionKind};
pub use checkpoint::{EngineCheckpoint, CHECKPOINT_VERSION};
pub use classifier::{classify_with, Classification, Classifier};
pub use config::{
    Band, CrisisReference, EngineConfig, ExitSignalConfig, GoodDirection, IndicatorDefinition,
    KeySignal, MissingPolicy, PersistenceConfig, TrendReference, WEIGHT_EPSILON,
};
pub use patterns::{CrisisMatch, PatternMatcher};
pub use persistence::{FilterDecision, FilterSnapshot, PersistenceFilter};
pub use signals::evaluate_exit_signals;
pub use tier::{level_name, Tier};
pub use trend::{
    HistoryPoint, IndicatorHistory, TrendDirection, TrendEstimator, TrendResult,
};

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::ConfigError;

/// One cycle's raw readings, as resolved by the external data source.
///
/// An id mapped to `None` is an explicit "unavailable"; an id absent from the
/// map is treated the same way. Ids with no indicator definition are rejected
/// per reading without failing the cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleReadings {
    pub timestamp: DateTime<Utc>,
    pub values: BTreeMap<String, Option<f64>>,
}

/// Everything one evaluation cycle produced.
#[derive(Debug, Clone, Serialize)]
pub struct CycleOutcome {
    pub timestamp: DateTime<Utc>,
    /// Weighted composite with per-indicator breakdown.
    pub composite: CompositeScore,
    /// This cycle's unfiltered candidate alert tier.
    pub candidate: Tier,
    /// Authoritative alert state after this cycle.
    pub confirmed: ConfirmedState,
    /// Present only on the cycle a transition was confirmed.
    pub transition: Option<TransitionEvent>,
    /// Nearest historical crisis, when any dimensions were comparable.
    pub nearest_crisis: Option<CrisisMatch>,
    /// Advisory exit signals for this cycle.
    pub exit_signals: Vec<String>,
    /// Reading ids rejected because they have no indicator definition.
    pub rejected: Vec<String>,
}

/// The engine context: configuration plus all cross-cycle state.
///
/// Single-threaded by design; one `evaluate_cycle` call at a time mutates the
/// histories and alert state. Hosts wanting parallelism may parallelize
/// per-indicator work upstream, but must hand the engine resolved readings
/// and serialize cycles.
#[derive(Debug)]
pub struct ThreatEngine {
    config: Arc<EngineConfig>,
    classifier: Classifier,
    aggregator: WeightedAggregator,
    trends: TrendEstimator,
    filter: PersistenceFilter,
    alerts: AlertStateMachine,
    matcher: PatternMatcher,
    /// Most recent fresh classification per indicator (carry-last source).
    last_tiers: BTreeMap<String, Tier>,
}

impl ThreatEngine {
    /// Validate the configuration and build a cold-started engine.
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let config = Arc::new(config);
        let p = &config.persistence;
        let matcher = PatternMatcher::from_config(&config);
        info!(
            indicators = config.indicators.len(),
            crises = matcher.reference_count(),
            escalation_cycles = p.escalation_cycles,
            deescalation_cycles = p.deescalation_cycles,
            baseline = p.baseline_tier.value(),
            "threat engine initialized"
        );
        Ok(Self {
            classifier: Classifier::new(Arc::clone(&config)),
            aggregator: WeightedAggregator::new(),
            trends: TrendEstimator::new(config.history_capacity),
            filter: PersistenceFilter::new(p.escalation_cycles, p.baseline_tier),
            alerts: AlertStateMachine::new(
                p.baseline_tier,
                p.escalation_cycles,
                p.deescalation_cycles,
            ),
            matcher,
            last_tiers: BTreeMap::new(),
            config,
        })
    }

    /// Build an engine resuming from a checkpoint.
    pub fn from_checkpoint(
        config: EngineConfig,
        checkpoint: EngineCheckpoint,
    ) -> Result<Self, ConfigError> {
        let mut engine = Self::new(config)?;
        let p = &engine.config.persistence;
        engine.trends =
            TrendEstimator::from_histories(engine.config.history_capacity, checkpoint.histories);
        engine.filter = PersistenceFilter::restore(p.escalation_cycles, checkpoint.filter);
        engine.alerts = AlertStateMachine::restore(
            checkpoint.confirmed,
            p.escalation_cycles,
            p.deescalation_cycles,
        );
        engine.last_tiers = checkpoint.last_tiers;
        info!(
            tier = engine.alerts.state().tier.value(),
            "threat engine resumed from checkpoint"
        );
        Ok(engine)
    }

    /// Snapshot all cross-cycle state.
    pub fn checkpoint(&self) -> EngineCheckpoint {
        EngineCheckpoint {
            version: CHECKPOINT_VERSION,
            saved_at: Utc::now(),
            confirmed: self.alerts.state().clone(),
            histories: self.trends.histories().clone(),
            last_tiers: self.last_tiers.clone(),
            filter: self.filter.snapshot(),
        }
    }

    /// Current confirmed alert state.
    pub fn confirmed(&self) -> &ConfirmedState {
        self.alerts.state()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run one full evaluation cycle.
    ///
    /// Deterministic given engine state and readings. Per-reading failures
    /// degrade that indicator's contribution only; the cycle always completes
    /// and `ConfirmedState` is mutated exclusively through the state machine.
    pub fn evaluate_cycle(&mut self, readings: &CycleReadings) -> CycleOutcome {
        let mut rejected = Vec::new();
        for id in readings.values.keys() {
            if self.config.indicator(id).is_none() {
                warn!(indicator = %id, "rejecting reading for unknown indicator");
                rejected.push(id.clone());
            }
        }

        // Classification + trend per configured indicator. Iterating the
        // config keeps evaluation order stable regardless of reading order.
        let mut entries = Vec::with_capacity(self.config.indicators.len());
        let mut excluded = Vec::new();
        // Collected to avoid borrowing self.last_tiers mutably mid-loop.
        let mut fresh_tiers: Vec<(String, Tier)> = Vec::new();

        for def in &self.config.indicators {
            // NaN and infinities resolve like missing values; they must not
            // reach the band lookup or pollute the trend history.
            let value = match readings.values.get(&def.id).copied().flatten() {
                Some(v) if !v.is_finite() => {
                    warn!(indicator = %def.id, "non-finite reading treated as unavailable");
                    None
                }
                other => other,
            };
            let last_known = self.last_tiers.get(&def.id).copied();

            let trend = match value {
                Some(v) => self.trends.update_and_estimate(
                    &def.id,
                    HistoryPoint {
                        timestamp: readings.timestamp,
                        value: v,
                    },
                    def.good_direction,
                    def.trend_reference,
                ),
                None => self
                    .trends
                    .estimate(&def.id, def.good_direction, def.trend_reference),
            };

            // The definition is known to exist; classify_reading cannot fail
            // here, but a policy bug should degrade, not abort the cycle.
            let classification = match self.classifier.classify_reading(
                &def.id,
                value,
                last_known,
            ) {
                Ok(c) => c,
                Err(err) => {
                    warn!(indicator = %def.id, %err, "classification failed; excluding");
                    Classification::Excluded
                }
            };

            match classification {
                Classification::Fresh(tier) => {
                    fresh_tiers.push((def.id.clone(), tier));
                    entries.push(AggregationEntry {
                        indicator: def.id.clone(),
                        label: def.label.clone(),
                        value,
                        tier,
                        carried: false,
                        weight: def.weight,
                        trend,
                    });
                }
                Classification::Carried(tier) => {
                    entries.push(AggregationEntry {
                        indicator: def.id.clone(),
                        label: def.label.clone(),
                        value: None,
                        tier,
                        carried: true,
                        weight: def.weight,
                        trend,
                    });
                }
                Classification::Excluded => {
                    debug!(indicator = %def.id, "excluded from this cycle");
                    excluded.push(def.id.clone());
                }
            }
        }
        for (id, tier) in fresh_tiers {
            self.last_tiers.insert(id, tier);
        }

        let composite = self.aggregator.aggregate(entries, excluded);
        let candidate = Tier::from_composite(composite.score);

        let decision = self.filter.observe(candidate);
        let transition = self
            .alerts
            .apply(&decision, readings.timestamp, &composite);

        let current_tiers: BTreeMap<String, Tier> = composite
            .breakdown
            .iter()
            .map(|s| (s.indicator.clone(), s.tier))
            .collect();
        let nearest_crisis = self.matcher.nearest_match(&current_tiers);

        let exit_signals = evaluate_exit_signals(&self.config.signals, &composite);

        debug!(
            score = %format!("{:.2}", composite.score),
            level = composite.level,
            candidate = candidate.value(),
            confirmed = self.alerts.state().tier.value(),
            streak = decision.streak,
            excluded = composite.excluded.len(),
            "cycle evaluated"
        );

        CycleOutcome {
            timestamp: readings.timestamp,
            composite,
            candidate,
            confirmed: self.alerts.state().clone(),
            transition,
            nearest_crisis,
            exit_signals,
            rejected,
        }
    }
}
