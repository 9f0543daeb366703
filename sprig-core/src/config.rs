//! Runtime configuration.
//!
//! Every field has a default, so an empty JSON object is a valid
//! configuration and hosts only spell out what they change.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Tunables shared by a tracker and everything registered with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Upper bound on drain/run rounds in a single `Tracker::flush`.
    pub max_flush_rounds: usize,

    /// Cache size used by reconciler templates that do not set one.
    pub default_cached_count: usize,

    /// Number of identity-key entries after which dead entries are pruned.
    pub identity_prune_threshold: usize,

    /// Whether diagnostics are buffered for `Tracker::take_diagnostics`.
    /// Diagnostics are always logged.
    pub record_diagnostics: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_flush_rounds: 100,
            default_cached_count: 0,
            identity_prune_threshold: 256,
            record_diagnostics: true,
        }
    }
}

impl RuntimeConfig {
    /// Parse a configuration from JSON.
    pub fn from_json(source: &str) -> Result<Self> {
        Ok(serde_json::from_str(source)?)
    }

    /// Serialize the configuration to pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
