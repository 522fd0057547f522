//! Capacity providers.
//!
//! A provider turns "N more nodes in pool P" into granted capacity. Real
//! cloud integrations are out of scope; `SimulatedProvisioner` grants
//! everything up to an optional per-pool quota.

use std::fmt;

use spotgrid_core::Pool;

use crate::error::ProvisionError;

/// Source of new nodes.
pub trait NodeProvisioner: Send + fmt::Debug {
    /// Request `count` nodes for `pool`, which currently holds `existing`.
    ///
    /// Returns how many nodes were granted; a partial grant is not an error.
    fn provision(&mut self, pool: Pool, count: u32, existing: u32) -> Result<u32, ProvisionError>;
}

/// Always-available capacity with an optional quota per pool.
#[derive(Debug, Clone, Default)]
pub struct SimulatedProvisioner {
    max_nodes_per_pool: Option<u32>,
}

impl SimulatedProvisioner {
    pub fn new(max_nodes_per_pool: Option<u32>) -> Self {
        Self { max_nodes_per_pool }
    }

    pub fn unlimited() -> Self {
        Self::default()
    }
}

impl NodeProvisioner for SimulatedProvisioner {
    fn provision(&mut self, pool: Pool, count: u32, existing: u32) -> Result<u32, ProvisionError> {
        let Some(limit) = self.max_nodes_per_pool else {
            return Ok(count);
        };
        let headroom = limit.saturating_sub(existing);
        if headroom == 0 && count > 0 {
            return Err(ProvisionError::QuotaExceeded { pool, limit });
        }
        Ok(count.min(headroom))
    }
}
