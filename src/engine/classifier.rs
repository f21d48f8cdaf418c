//! Band-table classification of raw indicator values.
//!
//! Pure lookup against the indicator's configured band table. Missing values
//! never reach the band lookup: they are resolved to a carried tier or an
//! explicit exclusion according to the indicator's missing-value policy.

use std::sync::Arc;

use tracing::{debug, warn};

use super::config::{EngineConfig, IndicatorDefinition, MissingPolicy};
use super::tier::Tier;
use crate::errors::EngineError;

/// Result of resolving one reading through classification and the
/// missing-value policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// A numeric value fell into a band.
    Fresh(Tier),
    /// The value was unavailable; the last known tier was carried forward.
    Carried(Tier),
    /// The value was unavailable and the indicator is excluded this cycle.
    /// Its weight is redistributed across the remaining indicators.
    Excluded,
}

impl Classification {
    /// The tier contributing to this cycle's aggregation, if any.
    pub fn tier(&self) -> Option<Tier> {
        match self {
            Classification::Fresh(t) | Classification::Carried(t) => Some(*t),
            Classification::Excluded => None,
        }
    }

    pub fn is_carried(&self) -> bool {
        matches!(self, Classification::Carried(_))
    }
}

/// Maps raw indicator values to tiers via configured band tables.
#[derive(Debug, Clone)]
pub struct Classifier {
    config: Arc<EngineConfig>,
}

impl Classifier {
    /// Band tables are assumed already validated (`EngineConfig::validate`
    /// runs once at startup).
    pub fn new(config: Arc<EngineConfig>) -> Self {
        Self { config }
    }

    /// Classify a numeric value for the given indicator.
    ///
    /// Ties at a shared band boundary resolve to the stricter (higher-risk)
    /// tier. Values outside the covered domain clamp to the nearest edge
    /// band's tier. NaN and infinite values are rejected; they have no
    /// position on the band scale.
    pub fn classify(&self, indicator_id: &str, value: f64) -> Result<Tier, EngineError> {
        let def = self
            .config
            .indicator(indicator_id)
            .ok_or_else(|| EngineError::UnknownIndicator(indicator_id.to_string()))?;
        if !value.is_finite() {
            return Err(EngineError::NonFiniteValue(indicator_id.to_string()));
        }
        Ok(classify_with(def, value))
    }

    /// Resolve a possibly-missing reading into a tier or an exclusion.
    ///
    /// `last_known` is the most recent fresh classification for this
    /// indicator, used by the carry-last policy. Carry-last with no prior
    /// classification degrades to exclusion. A NaN or infinite value is
    /// resolved exactly like a missing one; it never reaches the band lookup.
    pub fn classify_reading(
        &self,
        indicator_id: &str,
        value: Option<f64>,
        last_known: Option<Tier>,
    ) -> Result<Classification, EngineError> {
        let def = self
            .config
            .indicator(indicator_id)
            .ok_or_else(|| EngineError::UnknownIndicator(indicator_id.to_string()))?;

        let value = match value {
            Some(v) if !v.is_finite() => {
                warn!(indicator = indicator_id, "non-finite reading treated as unavailable");
                None
            }
            other => other,
        };

        match value {
            Some(v) => Ok(Classification::Fresh(classify_with(def, v))),
            None => match def.missing_policy {
                MissingPolicy::CarryLast => match last_known {
                    Some(tier) => {
                        debug!(indicator = indicator_id, tier = tier.value(), "carrying last known tier");
                        Ok(Classification::Carried(tier))
                    }
                    None => Ok(Classification::Excluded),
                },
                MissingPolicy::Exclude => Ok(Classification::Excluded),
            },
        }
    }
}

/// Pure band lookup against an already-resolved definition.
///
/// Also used at startup to derive crisis reference tier vectors, so historical
/// episodes are scored through exactly the same tables as live readings.
/// `value` must be finite; `Classifier` and the cycle pipeline resolve
/// non-finite readings through the missing-value policy before this lookup.
pub fn classify_with(def: &IndicatorDefinition, value: f64) -> Tier {
    // Inclusive bounds on both ends: a boundary value is contained by both
    // adjacent bands, and the stricter tier wins.
    let strictest = def
        .bands
        .iter()
        .filter(|b| b.contains(value))
        .map(|b| b.tier)
        .max();

    if let Some(tier) = strictest {
        return tier;
    }

    // Out-of-domain: clamp to the nearest edge band.
    let mut lowest = &def.bands[0];
    let mut highest = &def.bands[0];
    for band in &def.bands {
        if band.lower < lowest.lower {
            lowest = band;
        }
        if band.upper > highest.upper {
            highest = band;
        }
    }
    if value < lowest.lower {
        lowest.tier
    } else {
        highest.tier
    }
}
