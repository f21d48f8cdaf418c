//! Trend estimation from bounded per-indicator reading histories.
//!
//! Each indicator owns a ring buffer of its most recent readings. The
//! estimator appends the newest reading, then buckets the percent change
//! against a reference point (n-back or window average) into a 7-way
//! direction. Direction sign follows the indicator's good direction: a rising
//! VIX deteriorates, a rising yield spread improves.

use std::collections::{BTreeMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::config::{GoodDirection, TrendReference};

/// Magnitude thresholds (percent) for direction bucketing, symmetric for
/// improvement and deterioration.
const STABLE_PCT: f64 = 0.5;
const SLOW_PCT: f64 = 2.0;
const NORMAL_PCT: f64 = 5.0;

/// One timestamped numeric reading. Immutable once created.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistoryPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// Bounded ordered sequence of past readings for one indicator.
///
/// Fixed capacity; the oldest reading is evicted on overflow. Owned
/// exclusively by the trend estimator and append-only from the outside.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorHistory {
    capacity: usize,
    readings: VecDeque<HistoryPoint>,
}

impl IndicatorHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(2),
            readings: VecDeque::with_capacity(capacity.max(2)),
        }
    }

    /// Append a reading, evicting the oldest if at capacity.
    pub fn push(&mut self, point: HistoryPoint) {
        if self.readings.len() == self.capacity {
            self.readings.pop_front();
        }
        self.readings.push_back(point);
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    /// Newest reading, if any.
    pub fn latest(&self) -> Option<&HistoryPoint> {
        self.readings.back()
    }

    /// Value `n` readings before the newest, clamped to the oldest.
    fn value_n_back(&self, n: usize) -> Option<f64> {
        if self.readings.is_empty() {
            return None;
        }
        let idx = self.readings.len().saturating_sub(1).saturating_sub(n);
        self.readings.get(idx).map(|p| p.value)
    }

    /// Mean of all buffered values.
    fn window_average(&self) -> Option<f64> {
        if self.readings.is_empty() {
            return None;
        }
        let sum: f64 = self.readings.iter().map(|p| p.value).sum();
        Some(sum / self.readings.len() as f64)
    }
}

/// Direction of an indicator's recent movement, risk-oriented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrendDirection {
    RapidlyImproving,
    Improving,
    SlowlyImproving,
    Stable,
    SlowlyDeteriorating,
    Deteriorating,
    RapidlyDeteriorating,
}

impl TrendDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrendDirection::RapidlyImproving => "rapidly improving",
            TrendDirection::Improving => "improving",
            TrendDirection::SlowlyImproving => "slowly improving",
            TrendDirection::Stable => "stable",
            TrendDirection::SlowlyDeteriorating => "slowly deteriorating",
            TrendDirection::Deteriorating => "deteriorating",
            TrendDirection::RapidlyDeteriorating => "rapidly deteriorating",
        }
    }

    pub fn is_deteriorating(&self) -> bool {
        matches!(
            self,
            TrendDirection::SlowlyDeteriorating
                | TrendDirection::Deteriorating
                | TrendDirection::RapidlyDeteriorating
        )
    }
}

/// Derived trend for one indicator, recomputed every cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendResult {
    pub direction: TrendDirection,
    /// Raw percent change of the newest value against the reference point
    /// (sign is the value's movement, not the risk direction).
    pub change_pct: f64,
}

impl TrendResult {
    /// Default before enough readings accumulate.
    pub fn stable() -> Self {
        Self {
            direction: TrendDirection::Stable,
            change_pct: 0.0,
        }
    }
}

/// Owns all indicator histories and computes per-cycle trends.
#[derive(Debug)]
pub struct TrendEstimator {
    capacity: usize,
    histories: BTreeMap<String, IndicatorHistory>,
}

impl TrendEstimator {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            histories: BTreeMap::new(),
        }
    }

    /// Append a reading to the indicator's history, then estimate its trend.
    ///
    /// Deterministic given history state; the append is the only mutation.
    pub fn update_and_estimate(
        &mut self,
        indicator_id: &str,
        point: HistoryPoint,
        good_direction: GoodDirection,
        reference: TrendReference,
    ) -> TrendResult {
        let history = self
            .histories
            .entry(indicator_id.to_string())
            .or_insert_with(|| IndicatorHistory::new(self.capacity));
        history.push(point);
        estimate(history, good_direction, reference)
    }

    /// Estimate from the existing history without appending (used when the
    /// cycle has no fresh reading for this indicator).
    pub fn estimate(
        &self,
        indicator_id: &str,
        good_direction: GoodDirection,
        reference: TrendReference,
    ) -> TrendResult {
        match self.histories.get(indicator_id) {
            Some(history) => estimate(history, good_direction, reference),
            None => TrendResult::stable(),
        }
    }

    /// Snapshot of all histories, for checkpointing.
    pub fn histories(&self) -> &BTreeMap<String, IndicatorHistory> {
        &self.histories
    }

    /// Restore from a checkpoint snapshot.
    pub fn from_histories(capacity: usize, histories: BTreeMap<String, IndicatorHistory>) -> Self {
        Self {
            capacity,
            histories,
        }
    }
}

fn estimate(
    history: &IndicatorHistory,
    good_direction: GoodDirection,
    reference: TrendReference,
) -> TrendResult {
    // Requires at least 2 readings; otherwise stable at zero rate.
    if history.len() < 2 {
        return TrendResult::stable();
    }

    let newest = match history.latest() {
        Some(p) => p.value,
        None => return TrendResult::stable(),
    };
    let reference_value = match reference {
        TrendReference::NBack(n) => history.value_n_back(n.max(1)),
        TrendReference::WindowAverage => history.window_average(),
    };
    let reference_value = match reference_value {
        Some(v) if v.abs() > f64::EPSILON => v,
        // A zero reference makes percent change undefined; report stable.
        _ => return TrendResult::stable(),
    };

    let change_pct = (newest - reference_value) / reference_value.abs() * 100.0;

    // Improvement if the value moved in the indicator's good direction.
    let improving = match good_direction {
        GoodDirection::Ascending => change_pct > 0.0,
        GoodDirection::Descending => change_pct < 0.0,
    };

    let magnitude = change_pct.abs();
    let direction = if magnitude < STABLE_PCT {
        TrendDirection::Stable
    } else if magnitude < SLOW_PCT {
        if improving {
            TrendDirection::SlowlyImproving
        } else {
            TrendDirection::SlowlyDeteriorating
        }
    } else if magnitude <= NORMAL_PCT {
        if improving {
            TrendDirection::Improving
        } else {
            TrendDirection::Deteriorating
        }
    } else if improving {
        TrendDirection::RapidlyImproving
    } else {
        TrendDirection::RapidlyDeteriorating
    };

    TrendResult {
        direction,
        change_pct,
    }
}
