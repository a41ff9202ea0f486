//! Engine tuning knobs shared by storage bootstrap and content services.
//!
//! Hosts usually embed [`EngineConfig`] inside their own configuration file;
//! every key is optional and falls back to [`EngineConfig::default`].

use serde::{Deserialize, Serialize};

const DEFAULT_MAX_CONFLICT_RETRIES: u32 = 5;
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Runtime settings for one content engine instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Extra attempts a mutation makes after losing an optimistic
    /// concurrency race before surfacing a conflict.
    pub max_conflict_retries: u32,
    /// How long a connection waits on a locked database before the
    /// operation fails as a storage error.
    pub busy_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_conflict_retries: DEFAULT_MAX_CONFLICT_RETRIES,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }
}

impl EngineConfig {
    /// Parses a JSON object; missing keys keep their defaults.
    pub fn from_json_str(raw: &str) -> Result<Self, String> {
        serde_json::from_str(raw).map_err(|err| format!("invalid engine config: {err}"))
    }

    /// Total number of commit attempts one mutation may make.
    pub fn max_commit_attempts(&self) -> u32 {
        self.max_conflict_retries.saturating_add(1)
    }
}
