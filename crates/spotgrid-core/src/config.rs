//! fleet.toml configuration parser.
//!
//! Every option has a default, so an empty file is a valid configuration.
//! Values are validated once after parsing; out-of-range values are
//! rejected rather than clamped.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{DeploymentSpec, Pool, check_fraction};

/// Longest accepted duration option: 30 days.
pub const MAX_DURATION_SECONDS: u64 = 30 * 24 * 3600;

/// Result type alias for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to render config: {0}")]
    Render(#[from] toml::ser::Error),

    #[error("invalid value for `{field}`: {reason}")]
    Invalid { field: String, reason: String },
}

impl ConfigError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FleetConfig {
    pub autoscaler: AutoscalerConfig,
    pub pools: PoolConfig,
    pub eviction: EvictionConfig,
    /// Deployments registered at startup.
    pub deployments: Vec<DeploymentSpec>,
}

/// Reconcile-loop tuning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AutoscalerConfig {
    /// Driver cadence. Not consulted by the core itself.
    pub loop_tick_seconds: f64,
    /// Multiplier applied to the raw RPS-derived replica estimate.
    pub scale_up_sensitivity: f64,
    /// Minimum time between two scale-down actions of one deployment.
    pub scale_down_cooldown_seconds: u64,
    /// Maximum pods created or removed per deployment per reconcile.
    pub max_scale_step: u32,
    /// Requeue preempted pods and run a second scheduling pass.
    pub reschedule_on_preemption: bool,
}

impl Default for AutoscalerConfig {
    fn default() -> Self {
        Self {
            loop_tick_seconds: 5.0,
            scale_up_sensitivity: 1.0,
            scale_down_cooldown_seconds: 120,
            max_scale_step: 10,
            reschedule_on_preemption: true,
        }
    }
}

/// Node sizing and pool naming.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PoolConfig {
    pub on_demand_pool_name: String,
    pub spot_pool_name: String,
    /// GPUs on every provisioned node.
    pub gpu_per_node: u32,
    /// Grace period before an idle node may be reclaimed.
    pub node_startup_seconds: u64,
    /// Cap applied to deployments that do not set their own.
    pub default_spot_fraction_cap: f64,
    /// Simulated provider quota per pool. `None` means unlimited.
    pub max_nodes_per_pool: Option<u32>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            on_demand_pool_name: Pool::OnDemand.as_str().to_string(),
            spot_pool_name: Pool::Spot.as_str().to_string(),
            gpu_per_node: 4,
            node_startup_seconds: 60,
            default_spot_fraction_cap: 0.8,
            max_nodes_per_pool: None,
        }
    }
}

impl PoolConfig {
    /// Display name configured for a pool.
    pub fn name_of(&self, pool: Pool) -> &str {
        match pool {
            Pool::OnDemand => &self.on_demand_pool_name,
            Pool::Spot => &self.spot_pool_name,
        }
    }

    /// Pool whose configured name is `name`.
    pub fn pool_named(&self, name: &str) -> Option<Pool> {
        Pool::ALL.into_iter().find(|&pool| self.name_of(pool) == name)
    }
}

/// Spot reclamation model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EvictionConfig {
    /// Mean evictions per preemptible node per minute (λ).
    pub global_spot_eviction_rate_per_minute: f64,
    /// Seed for the eviction RNG. Unset draws from OS entropy.
    pub seed: Option<u64>,
}

impl Default for EvictionConfig {
    fn default() -> Self {
        Self {
            global_spot_eviction_rate_per_minute: 0.02,
            seed: None,
        }
    }
}

impl FleetConfig {
    /// Read, parse and validate a config file.
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let config: FleetConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check every option against its permitted range.
    pub fn validate(&self) -> ConfigResult<()> {
        let a = &self.autoscaler;
        if !a.loop_tick_seconds.is_finite()
            || a.loop_tick_seconds <= 0.0
            || a.loop_tick_seconds > MAX_DURATION_SECONDS as f64
        {
            return Err(ConfigError::invalid(
                "autoscaler.loop_tick_seconds",
                format!("must be a positive number of seconds up to {MAX_DURATION_SECONDS}"),
            ));
        }
        check_duration(
            "autoscaler.scale_down_cooldown_seconds",
            a.scale_down_cooldown_seconds,
        )?;
        if !a.scale_up_sensitivity.is_finite() || a.scale_up_sensitivity <= 0.0 {
            return Err(ConfigError::invalid(
                "autoscaler.scale_up_sensitivity",
                "must be a positive multiplier",
            ));
        }
        if a.max_scale_step == 0 {
            return Err(ConfigError::invalid("autoscaler.max_scale_step", "must be at least 1"));
        }

        let p = &self.pools;
        if p.gpu_per_node == 0 {
            return Err(ConfigError::invalid("pools.gpu_per_node", "must be at least 1"));
        }
        check_duration("pools.node_startup_seconds", p.node_startup_seconds)?;
        check_fraction("pools.default_spot_fraction_cap", p.default_spot_fraction_cap)?;
        if p.on_demand_pool_name.trim().is_empty() || p.spot_pool_name.trim().is_empty() {
            return Err(ConfigError::invalid("pools", "pool names must not be empty"));
        }
        if p.on_demand_pool_name == p.spot_pool_name {
            return Err(ConfigError::invalid(
                "pools.spot_pool_name",
                "must differ from on_demand_pool_name",
            ));
        }

        let rate = self.eviction.global_spot_eviction_rate_per_minute;
        if !rate.is_finite() || rate < 0.0 {
            return Err(ConfigError::invalid(
                "eviction.global_spot_eviction_rate_per_minute",
                "must be a non-negative rate",
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for spec in &self.deployments {
            spec.validate()?;
            if !seen.insert(spec.name.as_str()) {
                return Err(ConfigError::invalid(
                    format!("deployments.{}", spec.name),
                    "duplicate deployment name",
                ));
            }
        }
        Ok(())
    }
}

fn check_duration(field: &str, seconds: u64) -> ConfigResult<()> {
    if seconds > MAX_DURATION_SECONDS {
        return Err(ConfigError::invalid(
            field,
            format!("must be at most {MAX_DURATION_SECONDS} seconds"),
        ));
    }
    Ok(())
}
