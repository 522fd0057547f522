//! ClusterState: the single owned aggregate of nodes, pods and deployments.
//!
//! Records are kept in ordered maps so iteration (and therefore binding
//! order and seeded eviction) is deterministic. Identifiers are generated
//! from per-kind sequence numbers.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info};

use spotgrid_core::{DeploymentSpec, Pool, PoolConfig};

use crate::clock::{Clock, SystemClock};
use crate::error::{StateError, StateResult};
use crate::snapshot::{ClusterSnapshot, DeploymentView, NodeView, PodView, PoolSummary};
use crate::types::*;

/// In-memory model of the fleet. Owned by exactly one control loop.
#[derive(Debug)]
pub struct ClusterState {
    clock: Arc<dyn Clock>,
    nodes: BTreeMap<NodeId, Node>,
    pods: BTreeMap<PodId, Pod>,
    deployments: BTreeMap<String, Deployment>,
    /// Configured pool names, indexed like `Pool::ALL`.
    pool_names: [String; 2],
    next_node_seq: u64,
    next_pod_seq: u64,
}

impl Default for ClusterState {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl ClusterState {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            nodes: BTreeMap::new(),
            pods: BTreeMap::new(),
            deployments: BTreeMap::new(),
            pool_names: Pool::ALL.map(|pool| pool.as_str().to_string()),
            next_node_seq: 0,
            next_pod_seq: 0,
        }
    }

    /// Report pools under their configured names in snapshots.
    pub fn with_pool_names(mut self, pools: &PoolConfig) -> Self {
        self.pool_names = Pool::ALL.map(|pool| pools.name_of(pool).to_string());
        self
    }

    /// Configured name of `pool`.
    pub fn pool_name(&self, pool: Pool) -> &str {
        match pool {
            Pool::OnDemand => &self.pool_names[0],
            Pool::Spot => &self.pool_names[1],
        }
    }

    /// Current time in epoch milliseconds.
    pub fn now(&self) -> u64 {
        self.clock.now_millis()
    }

    // ── Nodes ──────────────────────────────────────────────────────

    /// Register a new node. Capacity is purely additive, so this never fails.
    pub fn add_node(&mut self, pool: Pool, total_gpus: u32, preemptible: bool) -> Node {
        self.next_node_seq += 1;
        let node = Node {
            id: format!("node-{:06}", self.next_node_seq),
            pool,
            total_gpus,
            used_gpus: 0,
            preemptible,
            created_at: self.now(),
            terminating: false,
        };
        debug!(node = %node.id, %pool, total_gpus, preemptible, "node added");
        self.nodes.insert(node.id.clone(), node.clone());
        node
    }

    /// Remove a node, preempting every pod bound to it first.
    ///
    /// Returns the number of pods preempted. Unknown ids are a no-op.
    pub fn remove_node(&mut self, node_id: &str) -> usize {
        let Some(node) = self.nodes.get_mut(node_id) else {
            return 0;
        };
        node.terminating = true;

        let mut preempted = 0;
        for pod in self.pods.values_mut() {
            if pod.node_id.as_deref() == Some(node_id)
                && matches!(pod.phase, PodPhase::Running | PodPhase::Pending)
            {
                pod.node_id = None;
                pod.phase = PodPhase::Preempted;
                preempted += 1;
            }
        }

        if let Some(node) = self.nodes.remove(node_id) {
            info!(node = %node.id, pool = %node.pool, preempted, "node removed");
        }
        preempted
    }

    pub fn node(&self, node_id: &str) -> Option<&Node> {
        self.nodes.get(node_id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn nodes_in_pool(&self, pool: Pool) -> impl Iterator<Item = &Node> {
        self.nodes.values().filter(move |n| n.pool == pool)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn free_gpus_by_pool(&self, pool: Pool) -> u32 {
        self.nodes_in_pool(pool).map(Node::free_gpus).sum()
    }

    pub fn total_gpus_by_pool(&self, pool: Pool) -> u32 {
        self.nodes_in_pool(pool).map(|n| n.total_gpus).sum()
    }

    // ── Pods ───────────────────────────────────────────────────────

    /// Create a `Pending` pod. The deployment name is not checked; pods
    /// whose deployment disappears are collected by the autoscaler.
    pub fn add_pod(&mut self, deployment: &str) -> Pod {
        self.next_pod_seq += 1;
        let pod = Pod {
            id: format!("pod-{:06}", self.next_pod_seq),
            deployment: deployment.to_string(),
            node_id: None,
            phase: PodPhase::Pending,
            created_at: self.now(),
        };
        self.pods.insert(pod.id.clone(), pod.clone());
        pod
    }

    /// Delete a pod if present, returning its GPU unit to the node it ran on.
    pub fn remove_pod(&mut self, pod_id: &str) -> Option<Pod> {
        let pod = self.pods.remove(pod_id)?;
        if pod.phase == PodPhase::Running
            && let Some(node) = pod.node_id.as_deref().and_then(|id| self.nodes.get_mut(id))
        {
            node.used_gpus = node.used_gpus.saturating_sub(1);
        }
        Some(pod)
    }

    /// Bind a pending pod to a node, consuming one GPU.
    ///
    /// Returns false (and changes nothing) when the pod is not pending or
    /// the node is missing, terminating or full.
    pub fn bind_pod(&mut self, pod_id: &str, node_id: &str) -> bool {
        let Some(pod) = self.pods.get_mut(pod_id) else {
            return false;
        };
        if pod.phase != PodPhase::Pending {
            return false;
        }
        let Some(node) = self.nodes.get_mut(node_id) else {
            return false;
        };
        if !node.can_accept() {
            return false;
        }

        node.used_gpus += 1;
        pod.node_id = Some(node.id.clone());
        pod.phase = PodPhase::Running;
        true
    }

    /// Return every preempted pod to `Pending`. Returns how many moved.
    pub fn requeue_preempted(&mut self) -> usize {
        let mut requeued = 0;
        for pod in self.pods.values_mut() {
            if pod.phase == PodPhase::Preempted {
                pod.phase = PodPhase::Pending;
                pod.node_id = None;
                requeued += 1;
            }
        }
        requeued
    }

    pub fn pod(&self, pod_id: &str) -> Option<&Pod> {
        self.pods.get(pod_id)
    }

    pub fn pods(&self) -> impl Iterator<Item = &Pod> {
        self.pods.values()
    }

    pub fn pod_count(&self) -> usize {
        self.pods.len()
    }

    pub fn pods_for_deployment<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Pod> {
        self.pods.values().filter(move |p| p.deployment == name)
    }

    pub fn running_pods_for_deployment<'a>(
        &'a self,
        name: &'a str,
    ) -> impl Iterator<Item = &'a Pod> {
        self.pods_for_deployment(name)
            .filter(|p| p.phase == PodPhase::Running)
    }

    pub fn pending_pods(&self) -> impl Iterator<Item = &Pod> {
        self.pods.values().filter(|p| p.phase == PodPhase::Pending)
    }

    /// Pool of the node a pod is bound to, if any.
    pub fn pod_pool(&self, pod: &Pod) -> Option<Pool> {
        pod.node_id
            .as_deref()
            .and_then(|id| self.nodes.get(id))
            .map(|n| n.pool)
    }

    /// Running pods whose node lies in `pool`.
    pub fn running_pods_in_pool(&self, pool: Pool) -> usize {
        self.pods
            .values()
            .filter(|p| p.phase == PodPhase::Running && self.pod_pool(p) == Some(pool))
            .count()
    }

    pub fn replica_counts(&self, name: &str) -> ReplicaCounts {
        let mut counts = ReplicaCounts::default();
        for pod in self.pods_for_deployment(name) {
            match pod.phase {
                PodPhase::Running => counts.running += 1,
                PodPhase::Pending => counts.pending += 1,
                PodPhase::Preempted => counts.preempted += 1,
                PodPhase::Terminating => {}
            }
        }
        counts
    }

    /// Running replicas of one deployment, split by the pool they run in.
    pub fn running_split(&self, name: &str) -> PoolSplit {
        let mut split = PoolSplit::default();
        for pod in self.running_pods_for_deployment(name) {
            if let Some(pool) = self.pod_pool(pod) {
                split.add(pool);
            }
        }
        split
    }

    /// Pods whose owning deployment no longer exists.
    pub fn orphan_pods(&self) -> Vec<PodId> {
        self.pods
            .values()
            .filter(|p| !self.deployments.contains_key(&p.deployment))
            .map(|p| p.id.clone())
            .collect()
    }

    // ── Deployments ────────────────────────────────────────────────

    /// Register (or replace) a deployment. Replacing keeps existing pods
    /// and the current desired count.
    pub fn add_deployment(&mut self, spec: &DeploymentSpec, default_cap: f64) -> StateResult<()> {
        spec.validate()
            .map_err(|e| StateError::InvalidArgument(e.to_string()))?;

        let now = self.now();
        let mut deployment = Deployment::from_spec(spec, default_cap, now);
        if let Some(existing) = self.deployments.get(&spec.name) {
            deployment.desired_replicas = existing
                .desired_replicas
                .clamp(deployment.min_replicas, deployment.max_replicas);
            deployment.last_scale_time = existing.last_scale_time;
        }
        info!(
            deployment = %deployment.name,
            min = deployment.min_replicas,
            max = deployment.max_replicas,
            prefer_spot = deployment.prefer_spot,
            spot_fraction_cap = deployment.spot_fraction_cap,
            "deployment registered"
        );
        self.deployments.insert(deployment.name.clone(), deployment);
        Ok(())
    }

    /// Remove a deployment and all of its pods. Returns the pods deleted.
    pub fn remove_deployment(&mut self, name: &str) -> usize {
        let pod_ids: Vec<PodId> = self.pods_for_deployment(name).map(|p| p.id.clone()).collect();
        for id in &pod_ids {
            self.remove_pod(id);
        }
        if self.deployments.remove(name).is_some() {
            info!(deployment = %name, pods_removed = pod_ids.len(), "deployment removed");
        }
        pod_ids.len()
    }

    /// Update the load signal of a deployment.
    pub fn set_observed_rps(&mut self, name: &str, rps: f64) -> StateResult<()> {
        if !rps.is_finite() || rps < 0.0 {
            return Err(StateError::InvalidArgument(format!(
                "observed rps must be a non-negative number, got {rps}"
            )));
        }
        let deployment = self
            .deployments
            .get_mut(name)
            .ok_or_else(|| StateError::NotFound(format!("deployment {name}")))?;
        deployment.observed_rps = rps;
        Ok(())
    }

    /// Record a newly computed target, clamped to the deployment's bounds.
    pub fn set_desired_replicas(&mut self, name: &str, desired: u32) {
        if let Some(d) = self.deployments.get_mut(name) {
            d.desired_replicas = desired.clamp(d.min_replicas, d.max_replicas);
        }
    }

    /// Stamp the deployment's last scale action with the current time.
    pub fn mark_scaled(&mut self, name: &str) {
        let now = self.now();
        if let Some(d) = self.deployments.get_mut(name) {
            d.last_scale_time = now;
        }
    }

    pub fn deployment(&self, name: &str) -> Option<&Deployment> {
        self.deployments.get(name)
    }

    pub fn deployments(&self) -> impl Iterator<Item = &Deployment> {
        self.deployments.values()
    }

    pub fn deployment_names(&self) -> Vec<String> {
        self.deployments.keys().cloned().collect()
    }

    // ── Projections ────────────────────────────────────────────────

    /// Read-only projection for the API and metrics exporter.
    pub fn snapshot(&self) -> ClusterSnapshot {
        let nodes = self
            .nodes
            .values()
            .map(|n| NodeView {
                id: n.id.clone(),
                pool: n.pool,
                pool_name: self.pool_name(n.pool).to_string(),
                total_gpus: n.total_gpus,
                used_gpus: n.used_gpus,
                preemptible: n.preemptible,
            })
            .collect();

        let pods = self
            .pods
            .values()
            .map(|p| PodView {
                id: p.id.clone(),
                deployment: p.deployment.clone(),
                node_id: p.node_id.clone(),
                phase: p.phase,
            })
            .collect();

        let deployments = self
            .deployments
            .values()
            .map(|d| {
                let counts = self.replica_counts(&d.name);
                DeploymentView {
                    name: d.name.clone(),
                    desired_replicas: d.desired_replicas,
                    observed_rps: d.observed_rps,
                    running: counts.running,
                    pending: counts.pending,
                    preempted: counts.preempted,
                    spot_fraction_cap: d.spot_fraction_cap,
                }
            })
            .collect();

        let pools = Pool::ALL
            .iter()
            .map(|&pool| PoolSummary {
                pool,
                name: self.pool_name(pool).to_string(),
                nodes: self.nodes_in_pool(pool).count() as u32,
                total_gpus: self.total_gpus_by_pool(pool),
                free_gpus: self.free_gpus_by_pool(pool),
            })
            .collect();

        ClusterSnapshot {
            taken_at: self.now(),
            nodes,
            pods,
            deployments,
            pools,
        }
    }

    /// Check the cross-entity invariants. Used by tests and debug builds.
    pub fn verify(&self) -> StateResult<()> {
        let mut bound: BTreeMap<&str, u32> = BTreeMap::new();
        for pod in self.pods.values() {
            match (pod.phase, pod.node_id.as_deref()) {
                (PodPhase::Running, Some(node_id)) => {
                    if !self.nodes.contains_key(node_id) {
                        return Err(StateError::Invariant(format!(
                            "pod {} references missing node {node_id}",
                            pod.id
                        )));
                    }
                    *bound.entry(node_id).or_default() += 1;
                }
                (PodPhase::Running, None) => {
                    return Err(StateError::Invariant(format!(
                        "running pod {} has no node",
                        pod.id
                    )));
                }
                (phase, Some(node_id)) => {
                    return Err(StateError::Invariant(format!(
                        "{} pod {} still references node {node_id}",
                        phase.as_str(),
                        pod.id
                    )));
                }
                (_, None) => {}
            }
        }

        for node in self.nodes.values() {
            let running = bound.get(node.id.as_str()).copied().unwrap_or(0);
            if node.used_gpus != running {
                return Err(StateError::Invariant(format!(
                    "node {} reports {} used GPUs but hosts {running} running pods",
                    node.id, node.used_gpus
                )));
            }
            if node.used_gpus > node.total_gpus {
                return Err(StateError::Invariant(format!(
                    "node {} over-committed: {}/{}",
                    node.id, node.used_gpus, node.total_gpus
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn test_state() -> (ClusterState, ManualClock) {
        let clock = ManualClock::new(1_000_000);
        (ClusterState::new(Arc::new(clock.clone())), clock)
    }

    fn spec(name: &str) -> DeploymentSpec {
        let mut spec = DeploymentSpec::new(name, 100.0);
        spec.max_replicas = 10;
        spec
    }

    #[test]
    fn add_node_generates_unique_ids() {
        let (mut state, _) = test_state();
        let a = state.add_node(Pool::Spot, 4, true);
        let b = state.add_node(Pool::OnDemand, 8, false);
        assert_ne!(a.id, b.id);
        assert_eq!(a.created_at, 1_000_000);
        assert_eq!(state.total_gpus_by_pool(Pool::Spot), 4);
        assert_eq!(state.total_gpus_by_pool(Pool::OnDemand), 8);
        assert_eq!(state.free_gpus_by_pool(Pool::OnDemand), 8);
    }

    #[test]
    fn bind_consumes_one_gpu() {
        let (mut state, _) = test_state();
        let node = state.add_node(Pool::OnDemand, 2, false);
        let pod = state.add_pod("llama");

        assert!(state.bind_pod(&pod.id, &node.id));
        let bound = state.pod(&pod.id).unwrap();
        assert_eq!(bound.phase, PodPhase::Running);
        assert_eq!(bound.node_id.as_deref(), Some(node.id.as_str()));
        assert_eq!(state.node(&node.id).unwrap().used_gpus, 1);

        // Already running: second bind is a no-op.
        assert!(!state.bind_pod(&pod.id, &node.id));
        assert_eq!(state.node(&node.id).unwrap().used_gpus, 1);
        state.verify().unwrap();
    }

    #[test]
    fn bind_onto_full_node_is_noop() {
        let (mut state, _) = test_state();
        let node = state.add_node(Pool::OnDemand, 1, false);
        let first = state.add_pod("llama");
        let second = state.add_pod("llama");

        assert!(state.bind_pod(&first.id, &node.id));
        assert!(!state.bind_pod(&second.id, &node.id));
        assert_eq!(state.pod(&second.id).unwrap().phase, PodPhase::Pending);
        assert!(!state.bind_pod(&second.id, "node-missing"));
        state.verify().unwrap();
    }

    #[test]
    fn remove_node_preempts_bound_pods() {
        let (mut state, _) = test_state();
        let node = state.add_node(Pool::Spot, 4, true);
        let other = state.add_node(Pool::OnDemand, 4, false);
        let pods: Vec<Pod> = (0..3).map(|_| state.add_pod("d")).collect();
        for pod in &pods {
            assert!(state.bind_pod(&pod.id, &node.id));
        }
        let survivor = state.add_pod("d");
        assert!(state.bind_pod(&survivor.id, &other.id));

        assert_eq!(state.remove_node(&node.id), 3);
        assert!(state.node(&node.id).is_none());
        for pod in &pods {
            let pod = state.pod(&pod.id).unwrap();
            assert_eq!(pod.phase, PodPhase::Preempted);
            assert!(pod.node_id.is_none());
        }
        assert_eq!(state.pod(&survivor.id).unwrap().phase, PodPhase::Running);
        assert_eq!(state.replica_counts("d").preempted, 3);
        state.verify().unwrap();
    }

    #[test]
    fn remove_missing_node_is_noop() {
        let (mut state, _) = test_state();
        assert_eq!(state.remove_node("node-999999"), 0);
        assert!(state.remove_pod("pod-999999").is_none());
    }

    #[test]
    fn remove_running_pod_releases_gpu() {
        let (mut state, _) = test_state();
        let node = state.add_node(Pool::OnDemand, 2, false);
        let pod = state.add_pod("d");
        state.bind_pod(&pod.id, &node.id);

        let removed = state.remove_pod(&pod.id).unwrap();
        assert_eq!(removed.phase, PodPhase::Running);
        assert_eq!(state.node(&node.id).unwrap().used_gpus, 0);
        state.verify().unwrap();
    }

    #[test]
    fn requeue_preempted_clears_node() {
        let (mut state, _) = test_state();
        let node = state.add_node(Pool::Spot, 2, true);
        let pod = state.add_pod("d");
        state.bind_pod(&pod.id, &node.id);
        state.remove_node(&node.id);

        assert_eq!(state.requeue_preempted(), 1);
        let pod = state.pod(&pod.id).unwrap();
        assert_eq!(pod.phase, PodPhase::Pending);
        assert!(pod.node_id.is_none());
        assert_eq!(state.pending_pods().count(), 1);
    }

    #[test]
    fn running_split_and_pool_counts() {
        let (mut state, _) = test_state();
        let spot = state.add_node(Pool::Spot, 4, true);
        let od = state.add_node(Pool::OnDemand, 4, false);
        for node in [&spot.id, &spot.id, &od.id] {
            let pod = state.add_pod("d");
            state.bind_pod(&pod.id, node);
        }
        let other = state.add_pod("e");
        state.bind_pod(&other.id, &od.id);

        let split = state.running_split("d");
        assert_eq!(split, PoolSplit { on_demand: 1, spot: 2 });
        assert_eq!(state.running_pods_in_pool(Pool::OnDemand), 2);
        assert_eq!(state.running_pods_in_pool(Pool::Spot), 2);
        assert_eq!(state.running_pods_for_deployment("d").count(), 3);
        assert_eq!(state.free_gpus_by_pool(Pool::Spot), 2);
    }

    #[test]
    fn deployment_validation_signals_invalid_argument() {
        let (mut state, _) = test_state();
        let mut bad = spec("bad");
        bad.min_replicas = 11;
        let err = state.add_deployment(&bad, 0.8).unwrap_err();
        assert!(matches!(err, StateError::InvalidArgument(_)));
        assert!(state.deployment("bad").is_none());
    }

    #[test]
    fn remove_deployment_cascades_and_releases() {
        let (mut state, _) = test_state();
        state.add_deployment(&spec("d"), 0.8).unwrap();
        let node = state.add_node(Pool::OnDemand, 4, false);
        let running = state.add_pod("d");
        state.bind_pod(&running.id, &node.id);
        state.add_pod("d");

        assert_eq!(state.remove_deployment("d"), 2);
        assert!(state.deployment("d").is_none());
        assert_eq!(state.pod_count(), 0);
        assert_eq!(state.node(&node.id).unwrap().used_gpus, 0);
        state.verify().unwrap();
    }

    #[test]
    fn orphan_pods_are_reported() {
        let (mut state, _) = test_state();
        state.add_deployment(&spec("d"), 0.8).unwrap();
        state.add_pod("d");
        let orphan = state.add_pod("ghost");
        assert_eq!(state.orphan_pods(), vec![orphan.id]);
    }

    #[test]
    fn set_observed_rps_checks_name_and_value() {
        let (mut state, _) = test_state();
        state.add_deployment(&spec("d"), 0.8).unwrap();
        state.set_observed_rps("d", 250.0).unwrap();
        assert_eq!(state.deployment("d").unwrap().observed_rps, 250.0);

        assert!(matches!(state.set_observed_rps("x", 1.0), Err(StateError::NotFound(_))));
        assert!(matches!(
            state.set_observed_rps("d", -1.0),
            Err(StateError::InvalidArgument(_))
        ));
    }

    #[test]
    fn desired_replicas_are_clamped() {
        let (mut state, _) = test_state();
        let mut s = spec("d");
        s.min_replicas = 2;
        state.add_deployment(&s, 0.8).unwrap();
        state.set_desired_replicas("d", 50);
        assert_eq!(state.deployment("d").unwrap().desired_replicas, 10);
        state.set_desired_replicas("d", 0);
        assert_eq!(state.deployment("d").unwrap().desired_replicas, 2);
    }

    #[test]
    fn mark_scaled_uses_clock() {
        let (mut state, clock) = test_state();
        state.add_deployment(&spec("d"), 0.8).unwrap();
        clock.advance(std::time::Duration::from_secs(30));
        state.mark_scaled("d");
        assert_eq!(state.deployment("d").unwrap().last_scale_time, 1_030_000);
    }

    #[test]
    fn replacing_deployment_keeps_pods() {
        let (mut state, _) = test_state();
        state.add_deployment(&spec("d"), 0.8).unwrap();
        state.add_pod("d");
        let mut updated = spec("d");
        updated.prefer_spot = false;
        state.add_deployment(&updated, 0.8).unwrap();
        assert!(!state.deployment("d").unwrap().prefer_spot);
        assert_eq!(state.pods_for_deployment("d").count(), 1);
    }

    #[test]
    fn snapshot_projects_counts() {
        let (mut state, _) = test_state();
        state.add_deployment(&spec("d"), 0.5).unwrap();
        let node = state.add_node(Pool::Spot, 4, true);
        let a = state.add_pod("d");
        state.bind_pod(&a.id, &node.id);
        state.add_pod("d");

        let snap = state.snapshot();
        assert_eq!(snap.nodes.len(), 1);
        assert_eq!(snap.pods.len(), 2);
        let dep = &snap.deployments[0];
        assert_eq!((dep.running, dep.pending, dep.preempted), (1, 1, 0));
        assert_eq!(dep.spot_fraction_cap, 0.5);
        let spot = snap.pool(Pool::Spot).unwrap();
        assert_eq!((spot.nodes, spot.total_gpus, spot.free_gpus), (1, 4, 3));
        assert_eq!(spot.name, "spot");
        assert_eq!(snap.nodes[0].pool_name, "spot");
    }

    #[test]
    fn snapshot_uses_configured_pool_names() {
        let clock = ManualClock::new(1_000_000);
        let pools = PoolConfig {
            on_demand_pool_name: "od-a100".to_string(),
            spot_pool_name: "spot-a100".to_string(),
            ..PoolConfig::default()
        };
        let mut state = ClusterState::new(Arc::new(clock)).with_pool_names(&pools);
        state.add_node(Pool::Spot, 4, true);
        state.add_node(Pool::OnDemand, 4, false);

        let snap = state.snapshot();
        assert_eq!(state.pool_name(Pool::Spot), "spot-a100");
        assert_eq!(snap.pool(Pool::OnDemand).unwrap().name, "od-a100");
        assert_eq!(snap.pool(Pool::Spot).unwrap().name, "spot-a100");
        assert_eq!(snap.nodes_in_pool_named("spot-a100").count(), 1);
        assert_eq!(snap.nodes_in_pool_named("spot").count(), 0);
        assert!(snap.nodes_in_pool_named("od-a100").all(|n| n.pool == Pool::OnDemand));
    }

    #[test]
    fn verify_detects_drift() {
        let (mut state, _) = test_state();
        let node = state.add_node(Pool::Spot, 4, true);
        state.nodes.get_mut(&node.id).unwrap().used_gpus = 2;
        assert!(matches!(state.verify(), Err(StateError::Invariant(_))));
    }
}
