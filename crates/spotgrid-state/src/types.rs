//! Domain records held by the cluster state.

use serde::{Deserialize, Serialize};

use spotgrid_core::{DeploymentSpec, Pool};

/// Unique identifier for a node.
pub type NodeId = String;

/// Unique identifier for a pod.
pub type PodId = String;

// ── Node ──────────────────────────────────────────────────────────

/// A unit of GPU capacity in one pool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub pool: Pool,
    pub total_gpus: u32,
    pub used_gpus: u32,
    /// True only for spot capacity.
    pub preemptible: bool,
    /// Epoch milliseconds.
    pub created_at: u64,
    /// Set while the node is being torn down.
    pub terminating: bool,
}

impl Node {
    pub fn free_gpus(&self) -> u32 {
        self.total_gpus.saturating_sub(self.used_gpus)
    }

    /// Whether the scheduler may place another pod here.
    pub fn can_accept(&self) -> bool {
        !self.terminating && self.free_gpus() > 0
    }

    pub fn age_millis(&self, now: u64) -> u64 {
        now.saturating_sub(self.created_at)
    }
}

// ── Pod ───────────────────────────────────────────────────────────

/// Lifecycle phase of a replica.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PodPhase {
    Pending,
    Running,
    Preempted,
    Terminating,
}

impl PodPhase {
    pub const ALL: [PodPhase; 4] = [
        PodPhase::Pending,
        PodPhase::Running,
        PodPhase::Preempted,
        PodPhase::Terminating,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PodPhase::Pending => "Pending",
            PodPhase::Running => "Running",
            PodPhase::Preempted => "Preempted",
            PodPhase::Terminating => "Terminating",
        }
    }
}

/// One schedulable replica of a deployment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Pod {
    pub id: PodId,
    pub deployment: String,
    /// Set only while the pod is `Running`.
    pub node_id: Option<NodeId>,
    pub phase: PodPhase,
    /// Epoch milliseconds.
    pub created_at: u64,
}

// ── Deployment ────────────────────────────────────────────────────

/// Runtime record of a deployment and its scaling state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Deployment {
    pub name: String,
    pub target_rps_per_replica: f64,
    pub min_replicas: u32,
    pub max_replicas: u32,
    pub prefer_spot: bool,
    pub spot_fraction_cap: f64,
    /// Last target computed by the autoscaler.
    pub desired_replicas: u32,
    /// Load signal kept current by the control API.
    pub observed_rps: f64,
    /// Epoch milliseconds of the last scale action. Gates scale-down.
    pub last_scale_time: u64,
}

impl Deployment {
    /// Build the runtime record, falling back to `default_cap` when the
    /// deployment leaves the spot cap unset.
    pub fn from_spec(spec: &DeploymentSpec, default_cap: f64, now: u64) -> Self {
        Self {
            name: spec.name.clone(),
            target_rps_per_replica: spec.target_rps_per_replica,
            min_replicas: spec.min_replicas,
            max_replicas: spec.max_replicas,
            prefer_spot: spec.prefer_spot,
            spot_fraction_cap: spec.spot_fraction_cap.unwrap_or(default_cap),
            desired_replicas: spec.min_replicas,
            observed_rps: spec.observed_rps,
            last_scale_time: now,
        }
    }
}

/// Replica counts for one deployment, by phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaCounts {
    pub running: u32,
    pub pending: u32,
    pub preempted: u32,
}

impl ReplicaCounts {
    /// Replicas that count toward the desired total.
    pub fn active(&self) -> u32 {
        self.running + self.pending
    }
}

/// Running replicas split by pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolSplit {
    pub on_demand: u32,
    pub spot: u32,
}

impl PoolSplit {
    pub fn add(&mut self, pool: Pool) {
        match pool {
            Pool::OnDemand => self.on_demand += 1,
            Pool::Spot => self.spot += 1,
        }
    }

    /// Share of running replicas on spot. Zero running replicas counts as
    /// one slot so the first placement follows `prefer_spot`.
    pub fn spot_fraction(&self) -> f64 {
        let total = (self.on_demand + self.spot).max(1);
        f64::from(self.spot) / f64::from(total)
    }
}
