//! AutoScaler: load-driven replica reconciliation.
//!
//! Reads `observed_rps` of each deployment, derives a desired replica
//! count, creates or removes pods to approach it, then drives scheduling,
//! capacity provisioning, preemption recovery and idle reclamation.

use tracing::{debug, info};

use spotgrid_core::{FleetConfig, Pool};
use spotgrid_pool::GpuPoolManager;
use spotgrid_state::{ClusterState, Deployment, NodeId, PodId, PodPhase};

use crate::scheduler::{ScheduleOutcome, schedule_pending};

/// A replica decision for a single deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleDecision {
    /// Create this many pods.
    Up(u32),
    /// Remove this many pods.
    Down(u32),
    /// Above target, but the scale-down cooldown has not elapsed.
    HeldByCooldown,
    NoChange,
}

/// AutoScaler tuning, usually derived from `FleetConfig`.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalerSettings {
    pub scale_up_sensitivity: f64,
    pub scale_down_cooldown_seconds: u64,
    pub max_scale_step: u32,
    pub reschedule_on_preemption: bool,
}

impl ScalerSettings {
    pub fn from_config(config: &FleetConfig) -> Self {
        let a = &config.autoscaler;
        Self {
            scale_up_sensitivity: a.scale_up_sensitivity,
            scale_down_cooldown_seconds: a.scale_down_cooldown_seconds,
            max_scale_step: a.max_scale_step,
            reschedule_on_preemption: a.reschedule_on_preemption,
        }
    }
}

impl Default for ScalerSettings {
    fn default() -> Self {
        Self::from_config(&FleetConfig::default())
    }
}

/// What one reconcile pass did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcileReport {
    pub orphans_collected: u32,
    pub pods_created: u32,
    pub pods_removed: u32,
    /// Deployments whose scale-down was deferred by the cooldown.
    pub held_by_cooldown: u32,
    pub pods_bound: u32,
    /// Shortages summed over both scheduling passes.
    pub on_demand_shortage: u32,
    pub spot_shortage: u32,
    pub nodes_added_on_demand: u32,
    pub nodes_added_spot: u32,
    pub pods_requeued: u32,
    pub nodes_reclaimed: Vec<NodeId>,
}

impl ReconcileReport {
    fn record_pass(&mut self, outcome: ScheduleOutcome, added: (u32, u32)) {
        self.pods_bound += outcome.bound;
        self.on_demand_shortage += outcome.on_demand_shortage;
        self.spot_shortage += outcome.spot_shortage;
        self.nodes_added_on_demand += added.0;
        self.nodes_added_spot += added.1;
    }
}

/// Replica target for a deployment:
/// `clamp(ceil(observed_rps / target_rps_per_replica * sensitivity), min, max)`.
///
/// A non-positive per-replica target means there is no load signal and
/// the deployment sits at its minimum.
pub fn desired_replicas(dep: &Deployment, sensitivity: f64) -> u32 {
    if dep.target_rps_per_replica <= 0.0 {
        return dep.min_replicas;
    }
    let raw = (dep.observed_rps / dep.target_rps_per_replica * sensitivity).ceil();
    let desired = if raw.is_finite() && raw > 0.0 {
        raw.min(f64::from(u32::MAX)) as u32
    } else {
        0
    };
    desired.clamp(dep.min_replicas, dep.max_replicas)
}

/// Drives the cluster toward the desired replica counts.
#[derive(Debug, Clone, Default)]
pub struct AutoScaler {
    settings: ScalerSettings,
}

impl AutoScaler {
    pub fn new(settings: ScalerSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ScalerSettings {
        &self.settings
    }

    /// Decide how to move `active` replicas toward `desired`.
    ///
    /// Scale-up is never gated; scale-down waits until `now` is at least
    /// one cooldown past the deployment's last scale action.
    pub fn evaluate(&self, dep: &Deployment, active: u32, desired: u32, now: u64) -> ScaleDecision {
        let step = self.settings.max_scale_step;
        if active < desired {
            return ScaleDecision::Up((desired - active).min(step));
        }
        if active > desired {
            let cooldown = self.settings.scale_down_cooldown_seconds.saturating_mul(1000);
            if now.saturating_sub(dep.last_scale_time) >= cooldown {
                return ScaleDecision::Down((active - desired).min(step));
            }
            return ScaleDecision::HeldByCooldown;
        }
        ScaleDecision::NoChange
    }

    /// One full reconciliation pass.
    ///
    /// Never fails: shortages the provider cannot cover stay pending and
    /// are retried on the next pass.
    pub fn reconcile(
        &self,
        state: &mut ClusterState,
        pools: &mut GpuPoolManager,
    ) -> ReconcileReport {
        let mut report = ReconcileReport::default();

        for id in state.orphan_pods() {
            if state.remove_pod(&id).is_some() {
                report.orphans_collected += 1;
            }
        }
        if report.orphans_collected > 0 {
            info!(count = report.orphans_collected, "collected orphaned pods");
        }

        for name in state.deployment_names() {
            self.scale_deployment(state, &name, &mut report);
        }

        let outcome = schedule_pending(state);
        let added = pools.ensure_capacity(state, outcome.on_demand_shortage, outcome.spot_shortage);
        report.record_pass(outcome, added);

        // The second pass also binds onto capacity the first pass provisioned.
        if self.settings.reschedule_on_preemption {
            let requeued = state.requeue_preempted() as u32;
            report.pods_requeued = requeued;
            if requeued > 0 {
                info!(requeued, "requeued preempted pods");
            }
            let outcome = schedule_pending(state);
            let added =
                pools.ensure_capacity(state, outcome.on_demand_shortage, outcome.spot_shortage);
            report.record_pass(outcome, added);
        }

        report.nodes_reclaimed = pools.scale_down_idle_nodes(state);

        debug!(
            created = report.pods_created,
            removed = report.pods_removed,
            bound = report.pods_bound,
            on_demand_shortage = report.on_demand_shortage,
            spot_shortage = report.spot_shortage,
            reclaimed = report.nodes_reclaimed.len(),
            "reconcile complete"
        );
        report
    }

    fn scale_deployment(&self, state: &mut ClusterState, name: &str, report: &mut ReconcileReport) {
        let Some(dep) = state.deployment(name).cloned() else {
            return;
        };
        let desired = desired_replicas(&dep, self.settings.scale_up_sensitivity);
        state.set_desired_replicas(name, desired);

        let active = state.replica_counts(name).active();
        match self.evaluate(&dep, active, desired, state.now()) {
            ScaleDecision::Up(n) => {
                for _ in 0..n {
                    state.add_pod(name);
                }
                state.mark_scaled(name);
                report.pods_created += n;
                info!(
                    deployment = %name,
                    from = active,
                    to = active + n,
                    desired,
                    observed_rps = dep.observed_rps,
                    "scaling up"
                );
            }
            ScaleDecision::Down(n) => {
                let victims = removal_order(state, name);
                let mut removed = 0;
                for id in victims.iter().take(n as usize) {
                    if state.remove_pod(id).is_some() {
                        removed += 1;
                    }
                }
                state.mark_scaled(name);
                report.pods_removed += removed;
                info!(
                    deployment = %name,
                    from = active,
                    to = active - removed,
                    desired,
                    observed_rps = dep.observed_rps,
                    "scaling down"
                );
            }
            ScaleDecision::HeldByCooldown => {
                report.held_by_cooldown += 1;
                debug!(deployment = %name, active, desired, "scale-down held by cooldown");
            }
            ScaleDecision::NoChange => {}
        }
    }
}

/// Removal candidates of one deployment: pending pods first, then pods
/// running on spot, then pods running on on-demand. Creation order is
/// kept within each group.
fn removal_order(state: &ClusterState, name: &str) -> Vec<PodId> {
    let mut ranked: Vec<(u8, PodId)> = state
        .pods_for_deployment(name)
        .filter_map(|pod| {
            let rank = match (pod.phase, state.pod_pool(pod)) {
                (PodPhase::Pending, _) => 0,
                (PodPhase::Running, Some(Pool::Spot)) => 1,
                (PodPhase::Running, _) => 2,
                _ => return None,
            };
            Some((rank, pod.id.clone()))
        })
        .collect();
    ranked.sort_by_key(|(rank, _)| *rank);
    ranked.into_iter().map(|(_, id)| id).collect()
}
