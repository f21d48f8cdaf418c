//! Checkpointing of cross-cycle state for continuity across restarts.
//!
//! Only the state carried between cycles is persisted: the confirmed
//! alert state, per-indicator histories, last-known tiers for carry-last, and
//! the persistence-filter counters. Everything else is derived fresh each
//! cycle. Without a checkpoint the engine starts cold at the configured
//! baseline tier with empty histories.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::alert::ConfirmedState;
use super::persistence::FilterSnapshot;
use super::tier::Tier;
use super::trend::IndicatorHistory;
use crate::errors::CheckpointError;

/// Schema version; bump on incompatible layout changes.
pub const CHECKPOINT_VERSION: u32 = 1;

/// Complete serializable engine state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineCheckpoint {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    pub confirmed: ConfirmedState,
    pub histories: BTreeMap<String, IndicatorHistory>,
    /// Most recent fresh classification per indicator, for carry-last.
    pub last_tiers: BTreeMap<String, Tier>,
    pub filter: FilterSnapshot,
}

impl EngineCheckpoint {
    /// Write as pretty JSON. The write is not atomic; callers that need
    /// crash-safety should write to a temp path and rename.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), CheckpointError> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        info!(path = %path.display(), tier = self.confirmed.tier.value(), "checkpoint saved");
        Ok(())
    }

    /// Load and version-check a checkpoint file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CheckpointError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)?;
        let checkpoint: EngineCheckpoint = serde_json::from_str(&json)?;
        if checkpoint.version != CHECKPOINT_VERSION {
            return Err(CheckpointError::VersionMismatch {
                found: checkpoint.version,
                expected: CHECKPOINT_VERSION,
            });
        }
        debug!(
            path = %path.display(),
            saved_at = %checkpoint.saved_at,
            histories = checkpoint.histories.len(),
            "checkpoint loaded"
        );
        Ok(checkpoint)
    }
}
