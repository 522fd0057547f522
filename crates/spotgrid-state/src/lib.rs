//! spotgrid-state: the authoritative in-memory model of the GPU fleet.
//!
//! `ClusterState` owns every node, pod and deployment record. All mutation
//! goes through its methods, which keep the cross-entity invariants intact:
//!
//! - GPUs used on a node equal the `Running` pods bound to it.
//! - A pod carries a node reference iff it is `Running`.
//! - Removing a node preempts its pods before the node record disappears.
//!
//! Readers outside the control loop only ever see a `ClusterSnapshot`.
//!
//! # Time
//!
//! Timestamps are Unix epoch milliseconds read from an injected `Clock`,
//! so tests can drive cooldowns and node ages with a `ManualClock`.

pub mod clock;
pub mod cluster;
pub mod error;
pub mod snapshot;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use cluster::ClusterState;
pub use error::{StateError, StateResult};
pub use snapshot::{ClusterSnapshot, DeploymentView, NodeView, PodView, PoolSummary};
pub use types::*;
