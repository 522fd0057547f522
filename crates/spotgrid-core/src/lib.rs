pub mod config;
pub mod types;

pub use config::{
    AutoscalerConfig, ConfigError, ConfigResult, EvictionConfig, FleetConfig, MAX_DURATION_SECONDS,
    PoolConfig,
};
pub use types::*;
