//! Error types for the cluster state.

use thiserror::Error;

/// Result type alias for cluster state operations.
pub type StateResult<T> = Result<T, StateError>;

/// Errors surfaced by cluster state mutators.
///
/// Business cases (removing a missing node, binding onto a full node) are
/// no-ops, not errors. Only validation and explicit lookups fail.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invariant violated: {0}")]
    Invariant(String),
}
