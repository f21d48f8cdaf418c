//! Historical crisis pattern matching.
//!
//! Compares the current indicator tier vector against a small fixed set of
//! reference crisis episodes and reports the nearest match. Reference raw
//! values are classified through the same band tables as live readings at
//! construction time, so both sides of the comparison live in tier space.
//! Read-only; no state beyond the precomputed reference vectors.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::warn;

use super::classifier::classify_with;
use super::config::EngineConfig;
use super::tier::Tier;

/// Result of a nearest-match query.
#[derive(Debug, Clone, Serialize)]
pub struct CrisisMatch {
    pub name: String,
    pub year: i32,
    /// RMS tier distance over the compared dimensions. 0.0 is an exact match;
    /// each unit is one average tier of separation.
    pub distance: f64,
    /// Number of indicator dimensions actually compared.
    pub dimensions: usize,
}

#[derive(Debug, Clone)]
struct ReferenceVector {
    name: String,
    year: i32,
    tiers: BTreeMap<String, Tier>,
}

/// Matches current conditions against fixed historical references.
#[derive(Debug, Clone)]
pub struct PatternMatcher {
    references: Vec<ReferenceVector>,
}

impl PatternMatcher {
    /// Precompute reference tier vectors from the configured crisis episodes.
    ///
    /// Crisis values naming an indicator with no definition are skipped with
    /// a warning; they cannot be classified into tier space.
    pub fn from_config(config: &EngineConfig) -> Self {
        let references = config
            .crises
            .iter()
            .map(|crisis| {
                let mut tiers = BTreeMap::new();
                for (id, raw) in &crisis.values {
                    match config.indicator(id) {
                        Some(def) => {
                            tiers.insert(id.clone(), classify_with(def, *raw));
                        }
                        None => warn!(
                            crisis = %crisis.name,
                            indicator = %id,
                            "crisis reference names an undefined indicator; skipping dimension"
                        ),
                    }
                }
                ReferenceVector {
                    name: crisis.name.clone(),
                    year: crisis.year,
                    tiers,
                }
            })
            .collect();
        Self { references }
    }

    /// Nearest reference to the current tier vector, by RMS distance over
    /// shared dimensions.
    ///
    /// Normalizing by the compared dimension count keeps references with
    /// fewer known dimensions from being unfairly favored. References sharing
    /// no dimensions with the current vector are skipped. Ties resolve to the
    /// earliest configured reference, so results are deterministic.
    pub fn nearest_match(&self, current: &BTreeMap<String, Tier>) -> Option<CrisisMatch> {
        self.all_matches(current).into_iter().next()
    }

    /// All comparable references, ordered nearest first.
    pub fn all_matches(&self, current: &BTreeMap<String, Tier>) -> Vec<CrisisMatch> {
        let mut matches: Vec<CrisisMatch> = self
            .references
            .iter()
            .filter_map(|reference| {
                let mut sum_sq = 0.0;
                let mut dims = 0usize;
                for (id, ref_tier) in &reference.tiers {
                    if let Some(current_tier) = current.get(id) {
                        let delta = current_tier.as_f64() - ref_tier.as_f64();
                        sum_sq += delta * delta;
                        dims += 1;
                    }
                }
                (dims > 0).then(|| CrisisMatch {
                    name: reference.name.clone(),
                    year: reference.year,
                    distance: (sum_sq / dims as f64).sqrt(),
                    dimensions: dims,
                })
            })
            .collect();
        matches.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        matches
    }

    pub fn reference_count(&self) -> usize {
        self.references.len()
    }
}
