#![deny(unreachable_pub)]

//! Composite threat scoring engine for macro/market crisis monitoring.
//!
//! Ingests already-resolved market indicator readings once per cycle and
//! produces an explainable composite threat level with trend context,
//! persistence-filtered alert transitions, and nearest historical-crisis
//! matching. Data fetching, scheduling, and notification rendering are
//! external collaborators.

mod errors;

pub mod engine;

pub use engine::{
    evaluate_exit_signals, level_name, AggregationEntry, AlertStateMachine, Band, Classification,
    Classifier, CompositeScore, ConfirmedState, CrisisMatch, CrisisReference, CycleOutcome,
    CycleReadings, EngineCheckpoint, EngineConfig, ExitSignalConfig, FilterDecision,
    FilterSnapshot, GoodDirection, HistoryPoint, IndicatorDefinition, IndicatorHistory,
    IndicatorScore, KeySignal, MissingPolicy, PatternMatcher, PersistenceConfig,
    PersistenceFilter, ThreatEngine, Tier, TransitionEvent, TransitionKind, TrendDirection,
    TrendEstimator, TrendReference, TrendResult, WeightedAggregator, CHECKPOINT_VERSION,
    WEIGHT_EPSILON,
};

pub use errors::{CheckpointError, ConfigError, EngineError};
