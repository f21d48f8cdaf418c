//! Engine configuration: indicator definitions, band tables, weights,
//! persistence windows, crisis references.
//!
//! Loaded once at startup and immutable for the run. Validation happens at
//! load time; a config that fails validation never reaches the engine.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::tier::Tier;
use crate::errors::ConfigError;

/// Tolerance for the weights-sum-to-1.0 invariant.
pub const WEIGHT_EPSILON: f64 = 1e-6;

/// Tolerance for band contiguity checks.
const BAND_EPSILON: f64 = 1e-9;

/// How a missing raw value is resolved before classification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MissingPolicy {
    /// Drop the indicator for this cycle; its weight is redistributed
    /// proportionally across the remaining indicators.
    #[default]
    Exclude,
    /// Substitute the most recent known classification.
    CarryLast,
}

/// Which direction counts as improvement for this indicator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GoodDirection {
    /// Rising values are improvement (e.g. equity weekly change, yield spread).
    Ascending,
    /// Falling values are improvement (e.g. VIX, credit spreads). The common
    /// case for stress metrics.
    #[default]
    Descending,
}

/// Reference point for trend rate-of-change computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrendReference {
    /// Compare the newest reading against the one `n` cycles back
    /// (clamped to the oldest reading if the history is shorter).
    NBack(usize),
    /// Compare the newest reading against the window average.
    WindowAverage,
}

impl Default for TrendReference {
    fn default() -> Self {
        TrendReference::WindowAverage
    }
}

/// One interval of a band table: `lower..=upper -> tier`.
///
/// Bounds are inclusive on both ends; a value sitting exactly on a shared
/// boundary belongs to the stricter (higher-risk) of the two adjacent tiers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Band {
    pub lower: f64,
    pub upper: f64,
    pub tier: Tier,
}

impl Band {
    pub fn new(lower: f64, upper: f64, tier: u8) -> Self {
        debug_assert!(
            (1..=7).contains(&tier),
            "band tier {tier} out of range 1..=7"
        );
        Self {
            lower,
            upper,
            // Callers in this crate only construct bands with literal 1..=7;
            // a release-mode out-of-range literal saturates to the strictest
            // tier rather than panicking mid-run.
            tier: Tier::new(tier).unwrap_or(Tier::MAX),
        }
    }

    /// Whether `value` falls inside this band (inclusive bounds).
    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower && value <= self.upper
    }
}

/// Definition of one monitored indicator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorDefinition {
    /// Unique string key (e.g. "vix", "yield_spread_10y3m").
    pub id: String,
    /// Human-readable label for breakdowns and logs.
    pub label: String,
    /// Aggregation weight. All active weights must sum to 1.0.
    pub weight: f64,
    /// Ordered band table covering the indicator's value domain.
    pub bands: Vec<Band>,
    /// Missing-value policy.
    #[serde(default)]
    pub missing_policy: MissingPolicy,
    /// Improvement direction for trend sign.
    #[serde(default)]
    pub good_direction: GoodDirection,
    /// Trend reference point.
    #[serde(default)]
    pub trend_reference: TrendReference,
}

impl IndicatorDefinition {
    /// Validate the band table: sorted by lower bound, contiguous, no
    /// inverted bounds, each tier used at most once.
    fn validate_bands(&self) -> Result<(), ConfigError> {
        let malformed = |reason: String| ConfigError::MalformedBandTable {
            indicator: self.id.clone(),
            reason,
        };

        if self.bands.is_empty() {
            return Err(malformed("band table is empty".into()));
        }

        let mut sorted = self.bands.clone();
        sorted.sort_by(|a, b| a.lower.total_cmp(&b.lower));

        let mut seen_tiers = [false; 7];
        for band in &sorted {
            if !band.lower.is_finite() || !band.upper.is_finite() {
                return Err(malformed("non-finite band bound".into()));
            }
            if band.lower >= band.upper {
                return Err(malformed(format!(
                    "inverted bounds {}..{}",
                    band.lower, band.upper
                )));
            }
            let idx = (band.tier.value() - 1) as usize;
            if seen_tiers[idx] {
                return Err(malformed(format!("tier {} appears twice", band.tier.value())));
            }
            seen_tiers[idx] = true;
        }

        for pair in sorted.windows(2) {
            let gap = pair[1].lower - pair[0].upper;
            if gap.abs() > BAND_EPSILON {
                return Err(malformed(format!(
                    "gap or overlap between {} and {}",
                    pair[0].upper, pair[1].lower
                )));
            }
        }

        Ok(())
    }
}

/// Persistence-filter and hysteresis windows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Consecutive cycles a higher candidate tier must hold before an
    /// escalation is confirmed (K).
    pub escalation_cycles: usize,
    /// Consecutive cycles a lower candidate tier must hold before a
    /// de-escalation is confirmed (K'). Must be >= escalation_cycles;
    /// larger by default so alarms are easier to raise than to stand down.
    pub deescalation_cycles: usize,
    /// Alert tier on cold start (no checkpoint).
    pub baseline_tier: Tier,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            escalation_cycles: 2,
            deescalation_cycles: 3,
            baseline_tier: Tier::MIN,
        }
    }
}

/// A named historical crisis episode, given as raw indicator values.
///
/// Reference tier vectors are derived through the same band tables as live
/// readings, so the comparison space matches classification exactly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrisisReference {
    pub name: String,
    pub year: i32,
    /// Raw value per indicator id. Indicators absent here are simply not
    /// compared against this reference.
    pub values: BTreeMap<String, f64>,
}

/// Thresholds for advisory exit signals attached to each cycle outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExitSignalConfig {
    /// Composite score at or above this is reported as critical.
    pub composite_critical: f64,
    /// Composite score at or above this (but below critical) is elevated.
    pub composite_elevated: f64,
    /// Tier at or above which an indicator counts as concerning.
    pub concerning_tier: Tier,
    /// Number of concerning indicators that triggers a broad-stress signal.
    pub concerning_count: usize,
    /// Named per-indicator signals.
    #[serde(default)]
    pub key_signals: Vec<KeySignal>,
}

impl Default for ExitSignalConfig {
    fn default() -> Self {
        Self {
            composite_critical: 5.5,
            composite_elevated: 4.8,
            concerning_tier: Tier::new(4).unwrap_or(Tier::MAX),
            concerning_count: 4,
            key_signals: Vec::new(),
        }
    }
}

/// A single named exit-signal rule: fire when `indicator` is at or above
/// `min_tier`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeySignal {
    pub indicator: String,
    pub min_tier: Tier,
    pub message: String,
}

/// Complete engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Active indicator definitions.
    pub indicators: Vec<IndicatorDefinition>,
    /// Persistence and hysteresis windows.
    #[serde(default)]
    pub persistence: PersistenceConfig,
    /// Ring-buffer capacity for per-indicator histories.
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
    /// Historical crisis references for pattern matching.
    #[serde(default)]
    pub crises: Vec<CrisisReference>,
    /// Exit-signal thresholds.
    #[serde(default)]
    pub signals: ExitSignalConfig,
}

fn default_history_capacity() -> usize {
    10
}

impl EngineConfig {
    /// Load from a TOML file and validate.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: EngineConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate all startup invariants. Fatal on failure.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen: HashMap<&str, ()> = HashMap::new();
        for def in &self.indicators {
            if seen.insert(def.id.as_str(), ()).is_some() {
                return Err(ConfigError::DuplicateIndicator {
                    indicator: def.id.clone(),
                });
            }
            if def.weight <= 0.0 || !def.weight.is_finite() {
                return Err(ConfigError::NonPositiveWeight {
                    indicator: def.id.clone(),
                    weight: def.weight,
                });
            }
            def.validate_bands()?;
        }

        let sum: f64 = self.indicators.iter().map(|d| d.weight).sum();
        if (sum - 1.0).abs() > WEIGHT_EPSILON {
            return Err(ConfigError::WeightSumInvalid { sum });
        }

        let p = &self.persistence;
        if p.escalation_cycles == 0 || p.deescalation_cycles < p.escalation_cycles {
            return Err(ConfigError::InvalidPersistenceWindow {
                escalation: p.escalation_cycles,
                deescalation: p.deescalation_cycles,
            });
        }

        if self.history_capacity < 2 {
            return Err(ConfigError::HistoryCapacityTooSmall(self.history_capacity));
        }

        Ok(())
    }

    /// Look up an indicator definition by id.
    pub fn indicator(&self, id: &str) -> Option<&IndicatorDefinition> {
        self.indicators.iter().find(|d| d.id == id)
    }

    /// Built-in configuration mirroring the research-backed default set:
    /// ten macro indicators weighted toward the NY Fed 10Y-3M spread and
    /// high-yield credit stress, with four historical crisis references plus
    /// the 1987 crash.
    pub fn builtin() -> Self {
        let indicators = vec![
            IndicatorDefinition {
                id: "vix".into(),
                label: "Market Fear Index (VIX)".into(),
                weight: 0.12,
                bands: vec![
                    Band::new(0.0, 12.0, 1),
                    Band::new(12.0, 18.0, 2),
                    Band::new(18.0, 25.0, 3),
                    Band::new(25.0, 35.0, 4),
                    Band::new(35.0, 50.0, 5),
                    Band::new(50.0, 75.0, 6),
                    Band::new(75.0, 100.0, 7),
                ],
                missing_policy: MissingPolicy::Exclude,
                good_direction: GoodDirection::Descending,
                trend_reference: TrendReference::WindowAverage,
            },
            IndicatorDefinition {
                id: "yield_spread_10y3m".into(),
                label: "NY Fed Recession Indicator (10Y-3M)".into(),
                weight: 0.20,
                bands: vec![
                    Band::new(-4.0, -2.5, 7),
                    Band::new(-2.5, -1.5, 6),
                    Band::new(-1.5, -0.8, 5),
                    Band::new(-0.8, -0.2, 4),
                    Band::new(-0.2, 0.5, 3),
                    Band::new(0.5, 1.5, 2),
                    Band::new(1.5, 4.0, 1),
                ],
                missing_policy: MissingPolicy::Exclude,
                good_direction: GoodDirection::Ascending,
                trend_reference: TrendReference::WindowAverage,
            },
            IndicatorDefinition {
                id: "yield_spread_10y2y".into(),
                label: "Traditional Yield Curve (10Y-2Y)".into(),
                weight: 0.15,
                bands: vec![
                    Band::new(-3.0, -2.0, 7),
                    Band::new(-2.0, -1.2, 6),
                    Band::new(-1.2, -0.7, 5),
                    Band::new(-0.7, -0.2, 4),
                    Band::new(-0.2, 0.3, 3),
                    Band::new(0.3, 1.0, 2),
                    Band::new(1.0, 3.0, 1),
                ],
                missing_policy: MissingPolicy::Exclude,
                good_direction: GoodDirection::Ascending,
                trend_reference: TrendReference::WindowAverage,
            },
            IndicatorDefinition {
                id: "treasury_10yr".into(),
                label: "10-Year Treasury Yield".into(),
                weight: 0.08,
                bands: vec![
                    Band::new(1.0, 2.5, 1),
                    Band::new(2.5, 3.5, 2),
                    Band::new(3.5, 5.0, 3),
                    Band::new(5.0, 6.5, 4),
                    Band::new(6.5, 8.5, 5),
                    Band::new(8.5, 12.0, 6),
                    Band::new(12.0, 20.0, 7),
                ],
                missing_policy: MissingPolicy::Exclude,
                good_direction: GoodDirection::Descending,
                trend_reference: TrendReference::WindowAverage,
            },
            IndicatorDefinition {
                id: "credit_spread_hy".into(),
                label: "High-Yield Credit Stress".into(),
                weight: 0.15,
                bands: vec![
                    Band::new(2.0, 4.0, 1),
                    Band::new(4.0, 6.0, 2),
                    Band::new(6.0, 8.0, 3),
                    Band::new(8.0, 10.0, 4),
                    Band::new(10.0, 15.0, 5),
                    Band::new(15.0, 20.0, 6),
                    Band::new(20.0, 30.0, 7),
                ],
                // Credit spread feeds are the flakiest source; hold the last
                // known classification rather than dropping the weight.
                missing_policy: MissingPolicy::CarryLast,
                good_direction: GoodDirection::Descending,
                trend_reference: TrendReference::WindowAverage,
            },
            IndicatorDefinition {
                id: "credit_spread_ig".into(),
                label: "Investment Grade Credit".into(),
                weight: 0.08,
                bands: vec![
                    Band::new(0.5, 1.5, 1),
                    Band::new(1.5, 2.5, 2),
                    Band::new(2.5, 3.5, 3),
                    Band::new(3.5, 4.5, 4),
                    Band::new(4.5, 6.0, 5),
                    Band::new(6.0, 8.0, 6),
                    Band::new(8.0, 15.0, 7),
                ],
                missing_policy: MissingPolicy::CarryLast,
                good_direction: GoodDirection::Descending,
                trend_reference: TrendReference::WindowAverage,
            },
            IndicatorDefinition {
                id: "sp500_weekly_change".into(),
                label: "Equity Market Momentum (S&P 500 weekly %)".into(),
                weight: 0.10,
                bands: vec![
                    Band::new(-50.0, -20.0, 7),
                    Band::new(-20.0, -10.0, 6),
                    Band::new(-10.0, -5.0, 5),
                    Band::new(-5.0, -2.0, 4),
                    Band::new(-2.0, 0.5, 3),
                    Band::new(0.5, 3.0, 2),
                    Band::new(3.0, 20.0, 1),
                ],
                missing_policy: MissingPolicy::Exclude,
                good_direction: GoodDirection::Ascending,
                trend_reference: TrendReference::NBack(1),
            },
            IndicatorDefinition {
                id: "sector_divergence".into(),
                label: "Sector Rotation Divergence".into(),
                weight: 0.05,
                bands: vec![
                    Band::new(0.0, 0.2, 1),
                    Band::new(0.2, 0.4, 2),
                    Band::new(0.4, 0.7, 3),
                    Band::new(0.7, 1.0, 4),
                    Band::new(1.0, 1.5, 5),
                    Band::new(1.5, 2.0, 6),
                    Band::new(2.0, 5.0, 7),
                ],
                missing_policy: MissingPolicy::Exclude,
                good_direction: GoodDirection::Descending,
                trend_reference: TrendReference::WindowAverage,
            },
            IndicatorDefinition {
                id: "dollar_index".into(),
                label: "US Dollar Strength (DXY)".into(),
                weight: 0.04,
                // Non-monotonic by design: both a weak and a very strong
                // dollar stress the system, with strength the worse rail.
                bands: vec![
                    Band::new(85.0, 90.0, 2),
                    Band::new(90.0, 100.0, 1),
                    Band::new(100.0, 105.0, 3),
                    Band::new(105.0, 110.0, 4),
                    Band::new(110.0, 115.0, 5),
                    Band::new(115.0, 125.0, 6),
                    Band::new(125.0, 140.0, 7),
                ],
                missing_policy: MissingPolicy::Exclude,
                good_direction: GoodDirection::Descending,
                trend_reference: TrendReference::WindowAverage,
            },
            IndicatorDefinition {
                id: "oil_price".into(),
                label: "Oil Price (Demand Proxy)".into(),
                weight: 0.03,
                bands: vec![
                    Band::new(0.0, 15.0, 7),
                    Band::new(15.0, 25.0, 6),
                    Band::new(25.0, 35.0, 5),
                    Band::new(35.0, 45.0, 4),
                    Band::new(45.0, 55.0, 3),
                    Band::new(55.0, 65.0, 2),
                    Band::new(65.0, 85.0, 1),
                ],
                missing_policy: MissingPolicy::Exclude,
                good_direction: GoodDirection::Ascending,
                trend_reference: TrendReference::WindowAverage,
            },
        ];

        let crises = vec![
            crisis(
                "Great Depression",
                1929,
                &[
                    ("vix", 85.0),
                    ("treasury_10yr", 3.5),
                    ("yield_spread_10y2y", -2.5),
                    ("yield_spread_10y3m", -2.5),
                    ("sp500_weekly_change", -25.0),
                    ("dollar_index", 110.0),
                    ("oil_price", 15.0),
                    ("credit_spread_ig", 12.0),
                    ("credit_spread_hy", 25.0),
                ],
            ),
            crisis(
                "Black Monday",
                1987,
                &[
                    ("vix", 90.0),
                    ("treasury_10yr", 9.0),
                    ("yield_spread_10y2y", 0.7),
                    ("yield_spread_10y3m", 0.9),
                    ("sp500_weekly_change", -20.0),
                    ("dollar_index", 98.0),
                    ("oil_price", 19.0),
                    ("credit_spread_ig", 3.0),
                    ("credit_spread_hy", 6.5),
                ],
            ),
            crisis(
                "Dot-Com Bubble",
                2000,
                &[
                    ("vix", 45.0),
                    ("treasury_10yr", 6.5),
                    ("yield_spread_10y2y", -0.2),
                    ("yield_spread_10y3m", -0.3),
                    ("sp500_weekly_change", -10.0),
                    ("dollar_index", 95.0),
                    ("oil_price", 75.0),
                    ("credit_spread_ig", 4.5),
                    ("credit_spread_hy", 8.5),
                ],
            ),
            crisis(
                "Financial Crisis",
                2008,
                &[
                    ("vix", 65.0),
                    ("treasury_10yr", 3.8),
                    ("yield_spread_10y2y", -1.2),
                    ("yield_spread_10y3m", -1.4),
                    ("sp500_weekly_change", -18.0),
                    ("dollar_index", 88.0),
                    ("oil_price", 45.0),
                    ("credit_spread_ig", 8.5),
                    ("credit_spread_hy", 15.0),
                ],
            ),
            crisis(
                "COVID Crash",
                2020,
                &[
                    ("vix", 82.0),
                    ("treasury_10yr", 0.7),
                    ("yield_spread_10y2y", 0.6),
                    ("yield_spread_10y3m", 0.6),
                    ("sp500_weekly_change", -15.0),
                    ("dollar_index", 103.0),
                    ("oil_price", 25.0),
                    ("credit_spread_ig", 4.2),
                    ("credit_spread_hy", 9.8),
                ],
            ),
        ];

        let signals = ExitSignalConfig {
            key_signals: vec![
                KeySignal {
                    indicator: "yield_spread_10y3m".into(),
                    min_tier: Tier::new(4).unwrap_or(Tier::MAX),
                    message: "NY Fed recession indicator triggered (10Y-3M inverted)".into(),
                },
                KeySignal {
                    indicator: "credit_spread_hy".into(),
                    min_tier: Tier::new(5).unwrap_or(Tier::MAX),
                    message: "High-yield credit markets showing severe stress".into(),
                },
                KeySignal {
                    indicator: "vix".into(),
                    min_tier: Tier::new(5).unwrap_or(Tier::MAX),
                    message: "Market volatility reaching crisis levels".into(),
                },
            ],
            ..ExitSignalConfig::default()
        };

        Self {
            indicators,
            persistence: PersistenceConfig::default(),
            history_capacity: default_history_capacity(),
            crises,
            signals,
        }
    }
}

fn crisis(name: &str, year: i32, values: &[(&str, f64)]) -> CrisisReference {
    CrisisReference {
        name: name.into(),
        year,
        values: values
            .iter()
            .map(|(id, v)| (id.to_string(), *v))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_validates() {
        EngineConfig::builtin().validate().expect("builtin config is valid");
    }

    #[test]
    fn test_builtin_weights_sum_to_one() {
        let sum: f64 = EngineConfig::builtin()
            .indicators
            .iter()
            .map(|d| d.weight)
            .sum();
        assert!((sum - 1.0).abs() < WEIGHT_EPSILON);
    }

    #[test]
    fn test_weight_sum_invalid_rejected() {
        let mut config = EngineConfig::builtin();
        config.indicators[0].weight += 0.1;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::WeightSumInvalid { .. })
        ));
    }

    #[test]
    fn test_duplicate_indicator_rejected() {
        let mut config = EngineConfig::builtin();
        let dup = config.indicators[0].clone();
        config.indicators.push(dup);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DuplicateIndicator { .. })
        ));
    }

    #[test]
    fn test_band_gap_rejected() {
        let mut config = EngineConfig::builtin();
        config.indicators[0].bands[1].lower += 1.0; // open a gap after the first band
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MalformedBandTable { .. })
        ));
    }

    #[test]
    fn test_band_duplicate_tier_rejected() {
        let mut config = EngineConfig::builtin();
        let tier = config.indicators[0].bands[0].tier;
        config.indicators[0].bands[1].tier = tier;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MalformedBandTable { .. })
        ));
    }

    #[test]
    fn test_deescalation_shorter_than_escalation_rejected() {
        let mut config = EngineConfig::builtin();
        config.persistence.escalation_cycles = 3;
        config.persistence.deescalation_cycles = 2;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidPersistenceWindow { .. })
        ));
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = EngineConfig::builtin();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let restored: EngineConfig = toml::from_str(&toml_str).expect("deserialize");
        restored.validate().expect("roundtripped config still valid");
        assert_eq!(restored.indicators.len(), config.indicators.len());
        assert_eq!(restored.crises.len(), 5);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_band_with_out_of_range_tier_panics_in_debug() {
        let _ = Band::new(0.0, 1.0, 9);
    }

    #[test]
    fn test_non_monotonic_dollar_bands_accepted() {
        // The DXY table assigns tier 1 to the middle of the domain; coverage
        // and uniqueness checks must still pass.
        let config = EngineConfig::builtin();
        let dxy = config.indicator("dollar_index").expect("defined");
        dxy.validate_bands().expect("contiguous non-monotonic table");
    }
}
