//! Engine configuration.

use serde::{Deserialize, Serialize};

use crate::{PoolbookError, Result, constants};

/// Tunables of the pooled order engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Route any remainder of a sweep to the AMM collaborator.
    pub amm_fallback: bool,
    /// Upper bound on price levels one sweep may visit.
    pub max_levels_per_sweep: usize,
    /// Smallest accepted deposit, in token base units.
    pub min_deposit: u128,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            amm_fallback: true,
            max_levels_per_sweep: constants::DEFAULT_MAX_LEVELS_PER_SWEEP,
            min_deposit: constants::DEFAULT_MIN_DEPOSIT,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON config document.
    ///
    /// Missing fields fall back to their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(json)
            .map_err(|e| PoolbookError::Configuration(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject configurations the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.max_levels_per_sweep == 0 {
            return Err(PoolbookError::Configuration(
                "max_levels_per_sweep must be > 0".into(),
            ));
        }
        if self.min_deposit == 0 {
            return Err(PoolbookError::Configuration(
                "min_deposit must be > 0".into(),
            ));
        }
        Ok(())
    }
}
