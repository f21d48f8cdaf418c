use thiserror::Error;

/// Configuration-time validation failures.
///
/// All variants are fatal: a config that fails validation must abort startup
/// rather than run with silently-corrected values.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Active indicator weights must sum to 1.0 (within epsilon).
    #[error("indicator weights sum to {sum:.6}, expected 1.0")]
    WeightSumInvalid { sum: f64 },

    /// A single indicator weight is zero or negative.
    #[error("indicator '{indicator}' has non-positive weight {weight}")]
    NonPositiveWeight { indicator: String, weight: f64 },

    /// Two indicator definitions share the same id.
    #[error("duplicate indicator id '{indicator}'")]
    DuplicateIndicator { indicator: String },

    /// A band table has gaps, overlaps, inverted bounds, or repeated tiers.
    #[error("malformed band table for '{indicator}': {reason}")]
    MalformedBandTable { indicator: String, reason: String },

    /// Persistence windows must satisfy 1 <= K <= K'.
    #[error("invalid persistence windows: escalation {escalation}, de-escalation {deescalation}")]
    InvalidPersistenceWindow { escalation: usize, deescalation: usize },

    /// Trend estimation needs at least two readings of history.
    #[error("history capacity {0} is too small (minimum 2)")]
    HistoryCapacityTooSmall(usize),

    /// TOML parse failure when loading a config file.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// I/O failure when reading a config file.
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
}

/// Per-cycle evaluation errors. Non-fatal: the cycle proceeds with the
/// remaining indicators.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// A reading references an indicator with no definition.
    #[error("unknown indicator '{0}'")]
    UnknownIndicator(String),

    /// A reading carried a NaN or infinite value. Resolved as missing by the
    /// cycle pipeline; fatal only for direct classification calls.
    #[error("non-finite value for indicator '{0}'")]
    NonFiniteValue(String),
}

/// Checkpoint save/restore failures.
#[derive(Error, Debug)]
pub enum CheckpointError {
    #[error("checkpoint I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("checkpoint serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Schema version does not match this build.
    #[error("checkpoint version {found} is not supported (expected {expected})")]
    VersionMismatch { found: u32, expected: u32 },
}
