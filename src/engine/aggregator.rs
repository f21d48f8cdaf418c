//! Weighted aggregation of classified indicators into one composite score.
//!
//! `score = Σ effective_weight_i × tier_i` over the indicators included this
//! cycle. Excluded indicators' weight is redistributed proportionally by
//! renormalizing against the included weight sum, preserving the
//! sum-to-1.0 invariant for the cycle. Pure given its inputs.

use serde::Serialize;

use super::tier::{level_name, Tier};
use super::trend::TrendResult;

/// Per-indicator contribution to a cycle's composite, kept for
/// explainability downstream.
#[derive(Debug, Clone, Serialize)]
pub struct IndicatorScore {
    pub indicator: String,
    pub label: String,
    /// Raw value, absent when the tier was carried forward.
    pub value: Option<f64>,
    pub tier: Tier,
    /// True when the tier came from the carry-last policy.
    pub carried: bool,
    /// Configured weight.
    pub weight: f64,
    /// Weight actually applied this cycle after redistribution.
    pub effective_weight: f64,
    pub trend: TrendResult,
}

/// One cycle's composite threat score with its full breakdown.
#[derive(Debug, Clone, Serialize)]
pub struct CompositeScore {
    /// Weighted score in [1.0, 7.0].
    pub score: f64,
    /// Level label for the score (excellent..extreme).
    pub level: &'static str,
    /// Included indicators, ordered by id.
    pub breakdown: Vec<IndicatorScore>,
    /// Indicators excluded this cycle (missing value under the exclude
    /// policy, or carry-last with no prior classification).
    pub excluded: Vec<String>,
}

impl CompositeScore {
    /// Neutral midpoint result for a cycle where nothing could be scored.
    fn empty(excluded: Vec<String>) -> Self {
        Self {
            score: 4.0,
            level: level_name(4.0),
            breakdown: Vec::new(),
            excluded,
        }
    }

    /// Tier of an included indicator, if present.
    pub fn tier_of(&self, indicator_id: &str) -> Option<Tier> {
        self.breakdown
            .iter()
            .find(|s| s.indicator == indicator_id)
            .map(|s| s.tier)
    }

    /// Number of included indicators at or above the given tier.
    pub fn count_at_or_above(&self, tier: Tier) -> usize {
        self.breakdown.iter().filter(|s| s.tier >= tier).count()
    }
}

/// Input entry for aggregation: one included indicator's cycle results.
#[derive(Debug, Clone)]
pub struct AggregationEntry {
    pub indicator: String,
    pub label: String,
    pub value: Option<f64>,
    pub tier: Tier,
    pub carried: bool,
    pub weight: f64,
    pub trend: TrendResult,
}

/// Combines classified indicators into a composite score.
#[derive(Debug, Default, Clone)]
pub struct WeightedAggregator;

impl WeightedAggregator {
    pub fn new() -> Self {
        Self
    }

    /// Aggregate the cycle's included entries.
    ///
    /// Entries are sorted by indicator id before summation, so the composite
    /// is independent of input order (floating-point summation is
    /// order-sensitive otherwise).
    pub fn aggregate(
        &self,
        mut entries: Vec<AggregationEntry>,
        excluded: Vec<String>,
    ) -> CompositeScore {
        if entries.is_empty() {
            return CompositeScore::empty(excluded);
        }

        entries.sort_by(|a, b| a.indicator.cmp(&b.indicator));

        let included_weight: f64 = entries.iter().map(|e| e.weight).sum();
        debug_assert!(included_weight > 0.0);

        let mut score = 0.0;
        let mut breakdown = Vec::with_capacity(entries.len());
        for entry in entries {
            let effective_weight = entry.weight / included_weight;
            score += effective_weight * entry.tier.as_f64();
            breakdown.push(IndicatorScore {
                indicator: entry.indicator,
                label: entry.label,
                value: entry.value,
                tier: entry.tier,
                carried: entry.carried,
                weight: entry.weight,
                effective_weight,
                trend: entry.trend,
            });
        }

        let score = score.clamp(1.0, 7.0);
        CompositeScore {
            score,
            level: level_name(score),
            breakdown,
            excluded,
        }
    }
}
