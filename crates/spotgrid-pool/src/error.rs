//! Provisioning error types.

use spotgrid_core::Pool;
use thiserror::Error;

/// Failure to obtain new capacity from the provider.
///
/// The pool manager never propagates these: a failed request leaves the
/// shortage in place and the next reconcile asks again.
#[derive(Debug, Error, PartialEq)]
pub enum ProvisionError {
    #[error("node quota exhausted for pool {pool} (limit {limit})")]
    QuotaExceeded { pool: Pool, limit: u32 },

    #[error("capacity unavailable in pool {pool}: {reason}")]
    Unavailable { pool: Pool, reason: String },
}
