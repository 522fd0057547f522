//! Read-only projection of the cluster for external collaborators.
//!
//! The dashboard/API and the metrics exporter consume this; they never
//! touch `ClusterState` directly.

use serde::{Deserialize, Serialize};

use spotgrid_core::Pool;

use crate::types::{NodeId, PodId, PodPhase};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeView {
    pub id: NodeId,
    pub pool: Pool,
    /// Configured name of `pool`.
    pub pool_name: String,
    pub total_gpus: u32,
    pub used_gpus: u32,
    pub preemptible: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PodView {
    pub id: PodId,
    pub deployment: String,
    pub node_id: Option<NodeId>,
    pub phase: PodPhase,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeploymentView {
    pub name: String,
    pub desired_replicas: u32,
    pub observed_rps: f64,
    pub running: u32,
    pub pending: u32,
    pub preempted: u32,
    pub spot_fraction_cap: f64,
}

/// Capacity totals for one pool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PoolSummary {
    pub pool: Pool,
    /// Configured name of `pool`.
    pub name: String,
    pub nodes: u32,
    pub total_gpus: u32,
    pub free_gpus: u32,
}

/// Point-in-time view of the whole cluster.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ClusterSnapshot {
    /// Epoch milliseconds when the snapshot was taken.
    pub taken_at: u64,
    pub nodes: Vec<NodeView>,
    pub pods: Vec<PodView>,
    pub deployments: Vec<DeploymentView>,
    pub pools: Vec<PoolSummary>,
}

impl ClusterSnapshot {
    pub fn pool(&self, pool: Pool) -> Option<&PoolSummary> {
        self.pools.iter().find(|p| p.pool == pool)
    }

    /// Nodes whose pool carries the configured name `name`.
    pub fn nodes_in_pool_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a NodeView> {
        self.nodes.iter().filter(move |n| n.pool_name == name)
    }

    pub fn pods_in_phase(&self, phase: PodPhase) -> usize {
        self.pods.iter().filter(|p| p.phase == phase).count()
    }

    pub fn deployment(&self, name: &str) -> Option<&DeploymentView> {
        self.deployments.iter().find(|d| d.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_serializes_with_wire_names() {
        let snap = ClusterSnapshot {
            taken_at: 1,
            nodes: vec![NodeView {
                id: "node-000001".to_string(),
                pool: Pool::OnDemand,
                pool_name: "od-a100".to_string(),
                total_gpus: 4,
                used_gpus: 1,
                preemptible: false,
            }],
            pods: vec![PodView {
                id: "pod-000001".to_string(),
                deployment: "llama".to_string(),
                node_id: None,
                phase: PodPhase::Preempted,
            }],
            deployments: Vec::new(),
            pools: Vec::new(),
        };

        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["nodes"][0]["pool"], "on-demand");
        assert_eq!(json["nodes"][0]["pool_name"], "od-a100");
        assert_eq!(json["pods"][0]["phase"], "Preempted");
        assert!(json["pods"][0]["node_id"].is_null());

        let back: ClusterSnapshot = serde_json::from_value(json).unwrap();
        assert_eq!(back, snap);
        assert_eq!(back.pods_in_phase(PodPhase::Preempted), 1);
    }
}
