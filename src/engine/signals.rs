//! Advisory exit signals derived from a cycle's composite breakdown.
//!
//! Pure function over the cycle outcome; the engine attaches the signal list
//! to each cycle but takes no action on it. Acting on signals (portfolio
//! moves, notifications) is the caller's concern.

use super::aggregator::CompositeScore;
use super::config::ExitSignalConfig;

/// Evaluate the configured exit-signal rules against one cycle's composite.
pub fn evaluate_exit_signals(config: &ExitSignalConfig, composite: &CompositeScore) -> Vec<String> {
    let mut signals = Vec::new();

    if composite.score >= config.composite_critical {
        signals.push(format!(
            "Composite threat score critical: {:.2}/7.00",
            composite.score
        ));
    } else if composite.score >= config.composite_elevated {
        signals.push(format!(
            "Composite threat score elevated: {:.2}/7.00",
            composite.score
        ));
    }

    for key in &config.key_signals {
        if let Some(tier) = composite.tier_of(&key.indicator) {
            if tier >= key.min_tier {
                signals.push(key.message.clone());
            }
        }
    }

    let concerning = composite.count_at_or_above(config.concerning_tier);
    if concerning >= config.concerning_count {
        signals.push(format!(
            "Multiple indicators confirming stress ({concerning} metrics concerning)"
        ));
    }

    signals
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::aggregator::{AggregationEntry, WeightedAggregator};
    use crate::engine::config::{ExitSignalConfig, KeySignal};
    use crate::engine::tier::Tier;
    use crate::engine::trend::TrendResult;

    fn composite_of(tiers: &[(&str, u8)]) -> CompositeScore {
        let n = tiers.len() as f64;
        let entries = tiers
            .iter()
            .map(|(id, t)| AggregationEntry {
                indicator: id.to_string(),
                label: id.to_string(),
                value: Some(0.0),
                tier: Tier::new(*t).unwrap(),
                carried: false,
                weight: 1.0 / n,
                trend: TrendResult::stable(),
            })
            .collect();
        WeightedAggregator::new().aggregate(entries, Vec::new())
    }

    fn config_with_vix_key() -> ExitSignalConfig {
        ExitSignalConfig {
            key_signals: vec![KeySignal {
                indicator: "vix".into(),
                min_tier: Tier::new(5).unwrap(),
                message: "Market volatility reaching crisis levels".into(),
            }],
            ..ExitSignalConfig::default()
        }
    }

    #[test]
    fn test_calm_cycle_has_no_signals() {
        let composite = composite_of(&[("vix", 2), ("hy", 1), ("spread", 2)]);
        let signals = evaluate_exit_signals(&config_with_vix_key(), &composite);
        assert!(signals.is_empty());
    }

    #[test]
    fn test_critical_composite_signal() {
        let composite = composite_of(&[("vix", 6), ("hy", 6), ("spread", 6)]);
        let signals = evaluate_exit_signals(&config_with_vix_key(), &composite);
        assert!(signals.iter().any(|s| s.contains("critical: 6.00")));
    }

    #[test]
    fn test_elevated_but_not_critical() {
        let composite = composite_of(&[("vix", 5), ("hy", 5), ("spread", 5)]);
        let signals = evaluate_exit_signals(&config_with_vix_key(), &composite);
        assert!(signals.iter().any(|s| s.contains("elevated: 5.00")));
        assert!(!signals.iter().any(|s| s.contains("critical")));
    }

    #[test]
    fn test_key_indicator_signal() {
        let composite = composite_of(&[("vix", 5), ("hy", 1), ("spread", 1)]);
        let signals = evaluate_exit_signals(&config_with_vix_key(), &composite);
        assert!(signals
            .iter()
            .any(|s| s.contains("volatility reaching crisis")));
    }

    #[test]
    fn test_broad_stress_signal_counts_concerning() {
        let composite = composite_of(&[("a", 4), ("b", 4), ("c", 5), ("d", 6), ("e", 1)]);
        let signals = evaluate_exit_signals(&ExitSignalConfig::default(), &composite);
        assert!(signals.iter().any(|s| s.contains("4 metrics concerning")));
    }
}
