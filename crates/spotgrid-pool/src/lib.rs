//! spotgrid-pool: capacity lifecycle for the GPU fleet.
//!
//! Translates unmet scheduling demand into new nodes, retires nodes that
//! stayed idle past their grace period, and models involuntary loss of
//! spot capacity.
//!
//! # Eviction model
//!
//! ```text
//! λ  = evictions per preemptible node per minute
//! Δt = seconds since the previous tick
//! p  = 1 - (1 - λ/60)^Δt        per node, independently
//! ```
//!
//! Randomness comes from an injected generator so simulations and tests
//! can be replayed from a seed.

pub mod error;
pub mod eviction;
pub mod manager;
pub mod provisioner;

pub use error::ProvisionError;
pub use eviction::eviction_probability;
pub use manager::{GpuPoolManager, PoolSettings, TickReport};
pub use provisioner::{NodeProvisioner, SimulatedProvisioner};
