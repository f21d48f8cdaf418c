//! End-to-end tests driving readings through classification, trend,
//! aggregation, persistence filtering, the alert state machine, and pattern
//! matching together:
//! - staged escalation under the persistence window
//! - de-escalation hysteresis
//! - carry-last pinning across consecutive missing readings
//! - replay determinism
//! - checkpoint/restore continuity
//! - cycle resilience to unknown-indicator readings

use chrono::{DateTime, TimeZone, Utc};

use crate::engine::{
    Band, CrisisReference, CycleReadings, EngineConfig, GoodDirection, IndicatorDefinition,
    MissingPolicy, PersistenceConfig, ThreatEngine, Tier, TransitionKind, TrendReference,
};

fn ts(cycle: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + cycle * 86_400, 0).unwrap()
}

fn fear_bands() -> Vec<Band> {
    vec![
        Band::new(0.0, 12.0, 1),
        Band::new(12.0, 18.0, 2),
        Band::new(18.0, 25.0, 3),
        Band::new(25.0, 35.0, 4),
        Band::new(35.0, 50.0, 5),
        Band::new(50.0, 80.0, 6),
        Band::new(80.0, 200.0, 7),
    ]
}

fn indicator(id: &str, weight: f64, policy: MissingPolicy) -> IndicatorDefinition {
    IndicatorDefinition {
        id: id.to_string(),
        label: id.to_string(),
        weight,
        bands: fear_bands(),
        missing_policy: policy,
        good_direction: GoodDirection::Descending,
        trend_reference: TrendReference::NBack(1),
    }
}

/// Single "fear_index" indicator at weight 1.0 with K=2, K'=3.
fn fear_index_config() -> EngineConfig {
    EngineConfig {
        indicators: vec![indicator("fear_index", 1.0, MissingPolicy::Exclude)],
        persistence: PersistenceConfig {
            escalation_cycles: 2,
            deescalation_cycles: 3,
            baseline_tier: Tier::MIN,
        },
        history_capacity: 10,
        crises: Vec::new(),
        signals: Default::default(),
    }
}

fn readings(cycle: i64, values: &[(&str, Option<f64>)]) -> CycleReadings {
    CycleReadings {
        timestamp: ts(cycle),
        values: values
            .iter()
            .map(|(id, v)| (id.to_string(), *v))
            .collect(),
    }
}

fn feed(engine: &mut ThreatEngine, cycle: i64, value: f64) -> crate::engine::CycleOutcome {
    engine.evaluate_cycle(&readings(cycle, &[("fear_index", Some(value))]))
}

#[test]
fn test_fear_index_staged_escalation() {
    // Values [20, 21, 42, 44, 43] with K=2: tier 3 confirms after cycle 2,
    // tier 5 only after cycle 4 (two consecutive readings >= 35), not at 3.
    let mut engine = ThreatEngine::new(fear_index_config()).unwrap();

    let c1 = feed(&mut engine, 1, 20.0);
    assert_eq!(c1.candidate.value(), 3);
    assert!(c1.transition.is_none());
    assert_eq!(c1.confirmed.tier, Tier::MIN);

    let c2 = feed(&mut engine, 2, 21.0);
    let escalation = c2.transition.expect("tier 3 confirms after cycle 2");
    assert_eq!(escalation.kind, TransitionKind::Escalation);
    assert_eq!(escalation.to.value(), 3);
    assert_eq!(c2.confirmed.tier.value(), 3);

    let c3 = feed(&mut engine, 3, 42.0);
    assert_eq!(c3.candidate.value(), 5);
    assert!(c3.transition.is_none(), "one spike must not confirm");
    assert_eq!(c3.confirmed.tier.value(), 3);

    let c4 = feed(&mut engine, 4, 44.0);
    let escalation = c4.transition.expect("tier 5 confirms after cycle 4");
    assert_eq!(escalation.from.value(), 3);
    assert_eq!(escalation.to.value(), 5);

    let c5 = feed(&mut engine, 5, 43.0);
    assert!(c5.transition.is_none());
    assert_eq!(c5.confirmed.tier.value(), 5);
}

#[test]
fn test_single_spike_reverts_without_confirming() {
    let mut engine = ThreatEngine::new(fear_index_config()).unwrap();
    for cycle in 1..=3 {
        feed(&mut engine, cycle, 10.0);
    }
    assert_eq!(engine.confirmed().tier, Tier::MIN);

    let spike = feed(&mut engine, 4, 60.0);
    assert!(spike.transition.is_none());
    let reverted = feed(&mut engine, 5, 10.0);
    assert!(reverted.transition.is_none());
    assert_eq!(reverted.confirmed.tier, Tier::MIN);
}

#[test]
fn test_deescalation_hysteresis_end_to_end() {
    let mut engine = ThreatEngine::new(fear_index_config()).unwrap();

    // Escalate to tier 5.
    feed(&mut engine, 1, 40.0);
    let up = feed(&mut engine, 2, 41.0);
    assert_eq!(up.confirmed.tier.value(), 5);

    // Two calm cycles satisfy K=2 but not K'=3; the alarm stays up.
    feed(&mut engine, 3, 10.0);
    let held = feed(&mut engine, 4, 10.0);
    assert!(held.transition.is_none());
    assert_eq!(held.confirmed.tier.value(), 5);

    // The third calm cycle stands it down.
    let down = feed(&mut engine, 5, 10.0);
    let event = down.transition.expect("de-escalation after K' cycles");
    assert_eq!(event.kind, TransitionKind::Deescalation);
    assert_eq!(event.to, Tier::MIN);
}

#[test]
fn test_carry_last_pins_classification() {
    // Two indicators; "credit" carries its last tier while unavailable.
    let config = EngineConfig {
        indicators: vec![
            indicator("fear_index", 0.5, MissingPolicy::Exclude),
            indicator("credit", 0.5, MissingPolicy::CarryLast),
        ],
        persistence: PersistenceConfig::default(),
        history_capacity: 10,
        crises: Vec::new(),
        signals: Default::default(),
    };
    let mut engine = ThreatEngine::new(config).unwrap();

    let first = engine.evaluate_cycle(&readings(
        1,
        &[("fear_index", Some(20.0)), ("credit", Some(40.0))],
    ));
    assert_eq!(first.composite.tier_of("credit").map(|t| t.value()), Some(5));

    // Three consecutive unavailable cycles: classification stays pinned and
    // never counts as a change for persistence purposes.
    for cycle in 2..=4 {
        let outcome = engine.evaluate_cycle(&readings(
            cycle,
            &[("fear_index", Some(20.0)), ("credit", None)],
        ));
        let credit = outcome
            .composite
            .breakdown
            .iter()
            .find(|s| s.indicator == "credit")
            .expect("credit included via carry-last");
        assert!(credit.carried);
        assert_eq!(credit.tier.value(), 5);
        assert!(credit.value.is_none());
        assert_eq!(outcome.candidate, first.candidate);
    }
}

#[test]
fn test_excluded_indicator_redistributes_weight() {
    let config = EngineConfig {
        indicators: vec![
            indicator("fear_index", 0.6, MissingPolicy::Exclude),
            indicator("credit", 0.4, MissingPolicy::Exclude),
        ],
        persistence: PersistenceConfig::default(),
        history_capacity: 10,
        crises: Vec::new(),
        signals: Default::default(),
    };
    let mut engine = ThreatEngine::new(config).unwrap();

    let outcome = engine.evaluate_cycle(&readings(
        1,
        &[("fear_index", Some(20.0)), ("credit", None)],
    ));
    assert_eq!(outcome.composite.excluded, vec!["credit".to_string()]);
    // fear_index tier 3 at full redistributed weight.
    assert!((outcome.composite.score - 3.0).abs() < 1e-12);
}

#[test]
fn test_replay_determinism() {
    let sequence: Vec<f64> = vec![20.0, 21.0, 42.0, 44.0, 43.0, 10.0, 10.0, 10.0, 55.0, 56.0];

    let run = || {
        let mut engine = ThreatEngine::new(fear_index_config()).unwrap();
        let mut transitions = Vec::new();
        for (i, value) in sequence.iter().enumerate() {
            let outcome = feed(&mut engine, i as i64 + 1, *value);
            if let Some(event) = outcome.transition {
                transitions.push((event.from.value(), event.to.value(), event.timestamp));
            }
        }
        transitions
    };

    assert_eq!(run(), run());
}

#[test]
fn test_checkpoint_restore_continues_streak() {
    let mut engine = ThreatEngine::new(fear_index_config()).unwrap();
    feed(&mut engine, 1, 20.0);
    feed(&mut engine, 2, 21.0); // confirmed tier 3
    feed(&mut engine, 3, 42.0); // tier-5 streak at 1

    let checkpoint = engine.checkpoint();
    let mut resumed = ThreatEngine::from_checkpoint(fear_index_config(), checkpoint).unwrap();
    assert_eq!(resumed.confirmed().tier.value(), 3);

    // One more tier-5 reading completes the K=2 window across the restart.
    let outcome = feed(&mut resumed, 4, 44.0);
    let event = outcome.transition.expect("streak survives checkpoint");
    assert_eq!(event.to.value(), 5);
}

#[test]
fn test_unknown_indicator_rejected_cycle_proceeds() {
    let mut engine = ThreatEngine::new(fear_index_config()).unwrap();
    let outcome = engine.evaluate_cycle(&readings(
        1,
        &[("fear_index", Some(20.0)), ("mystery_metric", Some(9.0))],
    ));
    assert_eq!(outcome.rejected, vec!["mystery_metric".to_string()]);
    assert_eq!(outcome.candidate.value(), 3);
    assert_eq!(outcome.composite.breakdown.len(), 1);
}

#[test]
fn test_builtin_config_crisis_cycle() {
    let mut engine = ThreatEngine::new(EngineConfig::builtin()).unwrap();
    // 2008-flavored readings: inverted curves, stressed credit, crashing
    // equities, elevated VIX.
    let outcome = engine.evaluate_cycle(&readings(
        1,
        &[
            ("vix", Some(65.0)),
            ("yield_spread_10y3m", Some(-1.4)),
            ("yield_spread_10y2y", Some(-1.1)),
            ("treasury_10yr", Some(3.8)),
            ("credit_spread_hy", Some(16.0)),
            ("credit_spread_ig", Some(8.6)),
            ("sp500_weekly_change", Some(-18.0)),
            ("sector_divergence", Some(1.2)),
            ("dollar_index", Some(88.0)),
            ("oil_price", Some(45.0)),
        ],
    ));

    assert!(outcome.composite.score > 4.2, "crisis readings score dangerous+");
    let nearest = outcome.nearest_crisis.expect("references configured");
    assert_eq!(nearest.year, 2008);
    assert!(!outcome.exit_signals.is_empty());
    // First cycle: candidate is high but nothing is confirmed yet (K=2).
    assert!(outcome.transition.is_none());
    assert_eq!(outcome.confirmed.tier, Tier::MIN);
}

#[test]
fn test_non_finite_reading_treated_as_unavailable() {
    let mut engine = ThreatEngine::new(fear_index_config()).unwrap();
    feed(&mut engine, 1, 20.0);

    // A NaN feed must resolve like a missing value: excluded here, never
    // landed on an edge band as tier 7 (or tier 1 for a descending table).
    let outcome = engine.evaluate_cycle(&readings(2, &[("fear_index", Some(f64::NAN))]));
    assert_eq!(outcome.composite.excluded, vec!["fear_index".to_string()]);
    assert!(outcome.composite.breakdown.is_empty());

    // The history was not polluted: the next real reading compares against
    // 20.0, not NaN.
    let recovered = feed(&mut engine, 3, 21.0);
    let trend = recovered.composite.breakdown[0].trend;
    assert!((trend.change_pct - 5.0).abs() < 1e-9);
}

#[test]
fn test_cycle_with_no_readings_is_neutral_and_harmless() {
    let mut engine = ThreatEngine::new(fear_index_config()).unwrap();
    let outcome = engine.evaluate_cycle(&readings(1, &[]));
    assert!(outcome.composite.breakdown.is_empty());
    assert!((outcome.composite.score - 4.0).abs() < 1e-12);
    assert_eq!(outcome.confirmed.tier, Tier::MIN);
    // The matcher has no references in this config; outcome carries none.
    assert!(outcome.nearest_crisis.is_none());
}
