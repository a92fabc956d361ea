//! # Migration Configuration
//!
//! Policy knobs for an upgrade run. The defaults reproduce the strict
//! behavior: any unexpected derived field or underivable trigger block aborts
//! the run.

use crate::domain::{PhaseGuard, TriggerFallback};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The TOML document could not be parsed.
    #[error("Invalid migration config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Upgrade run configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationConfig {
    /// Treatment of records that already carry the derived field.
    pub phase_guard: PhaseGuard,

    /// Trigger hash for events whose state change has no block reference.
    pub trigger_fallback: TriggerFallback,

    /// Log a progress line every N records of a phase (0 disables).
    pub log_progress_every: usize,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            phase_guard: PhaseGuard::Strict,
            trigger_fallback: TriggerFallback::Reject,
            log_progress_every: 10_000,
        }
    }
}

impl MigrationConfig {
    /// Create a config for testing (progress logging off).
    pub fn for_testing() -> Self {
        Self {
            log_progress_every: 0,
            ..Self::default()
        }
    }

    /// Parse a TOML document; missing keys take their defaults.
    pub fn from_toml_str(document: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(document)?)
    }
}
