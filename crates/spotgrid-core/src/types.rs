//! Shared types used across SpotGrid crates.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// Capacity pool a node belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Pool {
    /// Regular capacity, never reclaimed by the provider.
    OnDemand,
    /// Preemptible capacity, cheaper but subject to eviction.
    Spot,
}

impl Pool {
    pub const ALL: [Pool; 2] = [Pool::OnDemand, Pool::Spot];

    /// Whether nodes in this pool can be evicted involuntarily.
    pub fn is_preemptible(self) -> bool {
        matches!(self, Pool::Spot)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Pool::OnDemand => "on-demand",
            Pool::Spot => "spot",
        }
    }
}

impl fmt::Display for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declarative description of a model-serving deployment.
///
/// This is what the control API (or the `[[deployments]]` table of
/// `fleet.toml`) hands to the control plane. Runtime fields such as the
/// desired replica count live on the cluster-state record, not here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeploymentSpec {
    pub name: String,
    /// Requests per second a single replica is expected to absorb.
    /// Zero or negative disables load-based scaling.
    pub target_rps_per_replica: f64,
    #[serde(default)]
    pub min_replicas: u32,
    #[serde(default = "default_max_replicas")]
    pub max_replicas: u32,
    #[serde(default = "default_prefer_spot")]
    pub prefer_spot: bool,
    /// Maximum share of running replicas allowed on spot capacity.
    /// `None` takes the fleet-wide default.
    #[serde(default)]
    pub spot_fraction_cap: Option<f64>,
    /// Initial load signal.
    #[serde(default)]
    pub observed_rps: f64,
}

fn default_max_replicas() -> u32 {
    1000
}

fn default_prefer_spot() -> bool {
    true
}

impl DeploymentSpec {
    /// Minimal spec with the same defaults the TOML loader applies.
    pub fn new(name: impl Into<String>, target_rps_per_replica: f64) -> Self {
        Self {
            name: name.into(),
            target_rps_per_replica,
            min_replicas: 0,
            max_replicas: default_max_replicas(),
            prefer_spot: default_prefer_spot(),
            spot_fraction_cap: None,
            observed_rps: 0.0,
        }
    }

    /// Reject specs that could never satisfy the replica bounds or cap range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let field = |name: &str| format!("deployments.{}.{name}", self.name);

        if self.name.trim().is_empty() {
            return Err(ConfigError::invalid("deployments.name", "must not be empty"));
        }
        if self.min_replicas > self.max_replicas {
            return Err(ConfigError::invalid(
                field("min_replicas"),
                format!(
                    "min_replicas ({}) exceeds max_replicas ({})",
                    self.min_replicas, self.max_replicas
                ),
            ));
        }
        if self.target_rps_per_replica.is_nan() {
            return Err(ConfigError::invalid(field("target_rps_per_replica"), "must be a number"));
        }
        if let Some(cap) = self.spot_fraction_cap {
            check_fraction(&field("spot_fraction_cap"), cap)?;
        }
        if !self.observed_rps.is_finite() || self.observed_rps < 0.0 {
            return Err(ConfigError::invalid(
                field("observed_rps"),
                "must be a non-negative number",
            ));
        }
        Ok(())
    }
}

pub(crate) fn check_fraction(field: &str, value: f64) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ConfigError::invalid(field, format!("{value} is outside [0, 1]")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_serializes_kebab_case() {
        assert_eq!(toml::Value::try_from(Pool::OnDemand).unwrap().as_str(), Some("on-demand"));
        assert_eq!(Pool::Spot.to_string(), "spot");
        assert!(Pool::Spot.is_preemptible());
        assert!(!Pool::OnDemand.is_preemptible());
    }

    #[test]
    fn spec_rejects_inverted_bounds() {
        let mut spec = DeploymentSpec::new("llama", 100.0);
        spec.min_replicas = 5;
        spec.max_replicas = 2;
        assert!(spec.validate().is_err());
    }

    #[test]
    fn spec_rejects_cap_out_of_range() {
        let mut spec = DeploymentSpec::new("llama", 100.0);
        spec.spot_fraction_cap = Some(1.5);
        assert!(spec.validate().is_err());
        spec.spot_fraction_cap = Some(-0.1);
        assert!(spec.validate().is_err());
        spec.spot_fraction_cap = Some(1.0);
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn spec_rejects_empty_name() {
        let spec = DeploymentSpec::new("  ", 100.0);
        assert!(spec.validate().is_err());
    }

    #[test]
    fn non_positive_target_is_allowed() {
        // Zero target means "no scaling signal", not a configuration error.
        let spec = DeploymentSpec::new("batch", 0.0);
        assert!(spec.validate().is_ok());
    }
}
