//! Scheduling pass: binds pending pods to nodes.
//!
//! Pool order per pod follows the owning deployment's policy:
//!
//! | prefer_spot | spot fraction < cap | try            | shortage recorded |
//! |---|---|---|---|
//! | yes | yes | spot, on-demand | spot |
//! | yes | no  | on-demand       | on-demand |
//! | no  | yes | on-demand, spot | on-demand |
//! | no  | no  | on-demand       | on-demand |
//!
//! Within a pool the fullest node that still has a free GPU wins
//! (best-fit), which keeps empty nodes empty so they can be reclaimed.

use std::collections::HashMap;

use tracing::{debug, warn};

use spotgrid_core::Pool;
use spotgrid_state::{ClusterState, NodeId, PodId, PoolSplit};

/// Result of one sweep over the pending pods.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScheduleOutcome {
    pub bound: u32,
    pub on_demand_shortage: u32,
    pub spot_shortage: u32,
    /// Pending pods skipped because their deployment is unknown.
    pub skipped: u32,
}

const SPOT_FIRST: &[Pool] = &[Pool::Spot, Pool::OnDemand];
const ON_DEMAND_FIRST: &[Pool] = &[Pool::OnDemand, Pool::Spot];
const ON_DEMAND_ONLY: &[Pool] = &[Pool::OnDemand];

/// Pools to try, in order, and the pool charged with the shortage if
/// every attempt fails.
pub fn placement_order(prefer_spot: bool, spot_fraction: f64, cap: f64) -> (&'static [Pool], Pool) {
    let under_cap = spot_fraction < cap;
    match (prefer_spot, under_cap) {
        (true, true) => (SPOT_FIRST, Pool::Spot),
        (false, true) => (ON_DEMAND_FIRST, Pool::OnDemand),
        (_, false) => (ON_DEMAND_ONLY, Pool::OnDemand),
    }
}

/// Fullest accepting node in `pool`. Ties go to the lowest node id.
fn best_fit(state: &ClusterState, pool: Pool) -> Option<NodeId> {
    state
        .nodes_in_pool(pool)
        .filter(|n| n.can_accept())
        .min_by_key(|n| n.free_gpus())
        .map(|n| n.id.clone())
}

/// Try to bind every pending pod. Capacity is not provisioned here; the
/// caller batches the returned shortages into one provisioning request.
pub fn schedule_pending(state: &mut ClusterState) -> ScheduleOutcome {
    let pending: Vec<(PodId, String)> = state
        .pending_pods()
        .map(|p| (p.id.clone(), p.deployment.clone()))
        .collect();

    let mut outcome = ScheduleOutcome::default();
    if pending.is_empty() {
        return outcome;
    }

    let mut splits: HashMap<String, PoolSplit> = HashMap::new();

    for (pod_id, deployment) in pending {
        let Some(dep) = state.deployment(&deployment) else {
            warn!(pod = %pod_id, %deployment, "pending pod has no deployment, skipping");
            outcome.skipped += 1;
            continue;
        };
        let (prefer_spot, cap) = (dep.prefer_spot, dep.spot_fraction_cap);

        let split = *splits
            .entry(deployment.clone())
            .or_insert_with(|| state.running_split(&deployment));
        let fraction = split.spot_fraction();
        let (order, shortage_pool) = placement_order(prefer_spot, fraction, cap);

        let mut placed = None;
        for &pool in order {
            if let Some(node_id) = best_fit(state, pool)
                && state.bind_pod(&pod_id, &node_id)
            {
                placed = Some((pool, node_id));
                break;
            }
        }

        match placed {
            Some((pool, node_id)) => {
                outcome.bound += 1;
                if let Some(split) = splits.get_mut(&deployment) {
                    split.add(pool);
                }
                debug!(
                    pod = %pod_id,
                    %deployment,
                    node = %node_id,
                    %pool,
                    spot_fraction = fraction,
                    "pod bound"
                );
            }
            None => {
                match shortage_pool {
                    Pool::OnDemand => outcome.on_demand_shortage += 1,
                    Pool::Spot => outcome.spot_shortage += 1,
                }
                debug!(pod = %pod_id, %deployment, pool = %shortage_pool, "no capacity for pod");
            }
        }
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use spotgrid_core::DeploymentSpec;
    use spotgrid_state::{ManualClock, PodPhase};

    fn test_state() -> ClusterState {
        ClusterState::new(Arc::new(ManualClock::new(1_000)))
    }

    fn deploy(state: &mut ClusterState, name: &str, prefer_spot: bool, cap: f64) {
        let mut spec = DeploymentSpec::new(name, 100.0);
        spec.prefer_spot = prefer_spot;
        spec.spot_fraction_cap = Some(cap);
        state.add_deployment(&spec, 0.8).unwrap();
    }

    fn pending(state: &mut ClusterState, name: &str, n: usize) -> Vec<PodId> {
        (0..n).map(|_| state.add_pod(name).id).collect()
    }

    #[test]
    fn placement_order_table() {
        assert_eq!(
            placement_order(true, 0.0, 0.5),
            (&[Pool::Spot, Pool::OnDemand][..], Pool::Spot)
        );
        assert_eq!(placement_order(true, 0.5, 0.5), (&[Pool::OnDemand][..], Pool::OnDemand));
        assert_eq!(
            placement_order(false, 0.2, 0.5),
            (&[Pool::OnDemand, Pool::Spot][..], Pool::OnDemand)
        );
        assert_eq!(placement_order(false, 0.0, 0.0), (&[Pool::OnDemand][..], Pool::OnDemand));
    }

    #[test]
    fn first_pod_follows_spot_preference() {
        let mut state = test_state();
        deploy(&mut state, "d", true, 0.5);
        state.add_node(Pool::Spot, 4, true);
        state.add_node(Pool::OnDemand, 4, false);
        let pods = pending(&mut state, "d", 1);

        let outcome = schedule_pending(&mut state);
        assert_eq!(outcome.bound, 1);
        let pod = state.pod(&pods[0]).unwrap();
        assert_eq!(state.pod_pool(pod), Some(Pool::Spot));
    }

    #[test]
    fn cap_diverts_to_on_demand() {
        let mut state = test_state();
        deploy(&mut state, "d", true, 0.5);
        state.add_node(Pool::Spot, 8, true);
        state.add_node(Pool::OnDemand, 8, false);
        pending(&mut state, "d", 6);

        let outcome = schedule_pending(&mut state);
        assert_eq!(outcome.bound, 6);
        let split = state.running_split("d");
        // spot, then alternate once the fraction reaches the cap.
        assert_eq!(split, PoolSplit { on_demand: 3, spot: 3 });
        state.verify().unwrap();
    }

    #[test]
    fn never_binds_spot_at_cap_when_on_demand_has_room() {
        let mut state = test_state();
        deploy(&mut state, "d", false, 0.25);
        let spot = state.add_node(Pool::Spot, 8, true);
        let od = state.add_node(Pool::OnDemand, 2, false);
        // One running on spot already: fraction 1.0 ≥ 0.25.
        let first = state.add_pod("d");
        state.bind_pod(&first.id, &spot.id);
        pending(&mut state, "d", 2);

        let outcome = schedule_pending(&mut state);
        assert_eq!(outcome.bound, 2);
        assert_eq!(state.node(&od.id).unwrap().used_gpus, 2);
        assert_eq!(state.node(&spot.id).unwrap().used_gpus, 1);
    }

    #[test]
    fn on_demand_preferring_deployment_spills_to_spot_under_cap() {
        let mut state = test_state();
        deploy(&mut state, "d", false, 0.5);
        state.add_node(Pool::Spot, 4, true);
        pending(&mut state, "d", 1);

        let outcome = schedule_pending(&mut state);
        assert_eq!(outcome.bound, 1);
        assert_eq!(state.running_split("d").spot, 1);
    }

    #[test]
    fn on_demand_preferring_at_cap_records_on_demand_shortage() {
        let mut state = test_state();
        deploy(&mut state, "d", false, 0.0);
        state.add_node(Pool::Spot, 4, true);
        pending(&mut state, "d", 3);

        let outcome = schedule_pending(&mut state);
        assert_eq!(outcome.bound, 0);
        assert_eq!(outcome.on_demand_shortage, 3);
        assert_eq!(outcome.spot_shortage, 0);
    }

    #[test]
    fn spot_preferring_without_capacity_records_spot_shortage() {
        let mut state = test_state();
        deploy(&mut state, "d", true, 1.0);
        pending(&mut state, "d", 4);

        let outcome = schedule_pending(&mut state);
        assert_eq!(outcome.spot_shortage, 4);
        assert_eq!(outcome.on_demand_shortage, 0);
        assert_eq!(state.pending_pods().count(), 4);
    }

    #[test]
    fn best_fit_packs_fullest_node() {
        let mut state = test_state();
        deploy(&mut state, "d", false, 0.0);
        let roomy = state.add_node(Pool::OnDemand, 8, false);
        let tight = state.add_node(Pool::OnDemand, 8, false);
        for _ in 0..6 {
            let p = state.add_pod("other");
            state.bind_pod(&p.id, &tight.id);
        }
        pending(&mut state, "d", 2);

        schedule_pending(&mut state);
        assert_eq!(state.node(&tight.id).unwrap().used_gpus, 8);
        assert_eq!(state.node(&roomy.id).unwrap().used_gpus, 0);
    }

    #[test]
    fn orphan_pending_pods_are_skipped() {
        let mut state = test_state();
        state.add_node(Pool::OnDemand, 4, false);
        let orphan = state.add_pod("ghost");

        let outcome = schedule_pending(&mut state);
        assert_eq!(outcome.skipped, 1);
        assert_eq!(state.pod(&orphan.id).unwrap().phase, PodPhase::Pending);
    }

    #[test]
    fn empty_cluster_records_shortage() {
        let mut state = test_state();
        deploy(&mut state, "d", false, 0.0);
        pending(&mut state, "d", 1);
        let outcome = schedule_pending(&mut state);
        assert_eq!(outcome.on_demand_shortage, 1);
    }
}
