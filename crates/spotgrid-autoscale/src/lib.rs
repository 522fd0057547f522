//! spotgrid-autoscale: the reconciliation loop of the GPU fleet.
//!
//! Each `reconcile()` moves observed state toward desired state in one pass:
//!
//! ```text
//! for each deployment:
//!     desired = clamp(ceil(observed_rps / target_rps * sensitivity), min, max)
//!     total   = running + pending
//!     total < desired → create min(desired - total, max_scale_step) pods
//!     total > desired → after cooldown, remove min(total - desired, step)
//!                       pods: pending, then running on spot, then on-demand
//! schedule pending pods (spot-fraction aware, best fit), provision shortage
//! requeue preempted pods, schedule again (also binds onto fresh capacity)
//! reclaim idle nodes
//! ```
//!
//! `ControlPlane` bundles the cluster state, pool manager and autoscaler
//! into the single aggregate the driver owns.

pub mod control;
pub mod scaler;
pub mod scheduler;

pub use control::ControlPlane;
pub use scaler::{AutoScaler, ReconcileReport, ScalerSettings, desired_replicas};
pub use scheduler::{ScheduleOutcome, placement_order, schedule_pending};
