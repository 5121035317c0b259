//! Core runtime configuration.
//!
//! Policy tables (risk weights and the aid-scheme catalogue) are resolved
//! once at process startup and passed into the service as read-only data.
//! Nothing re-reads environment variables or files during request
//! handling, and no component may mutate these tables at runtime.

use std::path::Path;

use crate::error::{CareError, CareResult};
use crate::risk::RiskPolicy;
use crate::schemes::SchemeCatalogue;

/// Configuration resolved at startup.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    risk_policy: RiskPolicy,
    catalogue: SchemeCatalogue,
    reassess_inactive: bool,
}

impl CoreConfig {
    /// Create a new `CoreConfig`, validating the risk policy.
    pub fn new(
        risk_policy: RiskPolicy,
        catalogue: SchemeCatalogue,
        reassess_inactive: bool,
    ) -> CareResult<Self> {
        risk_policy.validate()?;
        Ok(Self {
            risk_policy,
            catalogue,
            reassess_inactive,
        })
    }

    pub fn risk_policy(&self) -> &RiskPolicy {
        &self.risk_policy
    }

    pub fn catalogue(&self) -> &SchemeCatalogue {
        &self.catalogue
    }

    /// Whether explicit re-assessment may run against deactivated records.
    pub fn reassess_inactive(&self) -> bool {
        self.reassess_inactive
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            risk_policy: RiskPolicy::default(),
            catalogue: SchemeCatalogue::default(),
            reassess_inactive: false,
        }
    }
}

/// Reads a risk-policy override file. Fields absent from the document keep
/// their compiled-in defaults.
pub fn load_risk_policy_file(path: &Path) -> CareResult<RiskPolicy> {
    let contents = std::fs::read_to_string(path).map_err(CareError::FileRead)?;
    RiskPolicy::from_yaml_str(&contents)
}
