//! ControlPlane: the aggregate a driver owns.
//!
//! Bundles cluster state, pool manager and autoscaler. All mutation goes
//! through `&mut self`, so a single owning task gives mutual exclusion
//! between `reconcile()` and `tick()` without locks.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{info, warn};

use spotgrid_core::{DeploymentSpec, FleetConfig};
use spotgrid_pool::{GpuPoolManager, TickReport};
use spotgrid_state::{Clock, ClusterSnapshot, ClusterState, StateResult};

use crate::scaler::{AutoScaler, ReconcileReport, ScalerSettings};

pub struct ControlPlane {
    config: FleetConfig,
    state: ClusterState,
    pools: GpuPoolManager,
    scaler: AutoScaler,
}

impl std::fmt::Debug for ControlPlane {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlPlane")
            .field("nodes", &self.state.node_count())
            .field("pods", &self.state.pod_count())
            .field("pools", &self.pools)
            .finish_non_exhaustive()
    }
}

impl ControlPlane {
    /// Build a control plane from validated config and register the
    /// deployments listed in it.
    pub fn new(config: FleetConfig, clock: Arc<dyn Clock>) -> anyhow::Result<Self> {
        config.validate()?;

        let mut state = ClusterState::new(clock).with_pool_names(&config.pools);
        let default_cap = config.pools.default_spot_fraction_cap;
        for spec in &config.deployments {
            state.add_deployment(spec, default_cap)?;
        }

        let mut pools = GpuPoolManager::from_config(&config);
        pools.start_ticking(state.now());
        let scaler = AutoScaler::new(ScalerSettings::from_config(&config));

        info!(
            deployments = config.deployments.len(),
            gpu_per_node = config.pools.gpu_per_node,
            eviction_rate = config.eviction.global_spot_eviction_rate_per_minute,
            "control plane initialized"
        );

        Ok(Self {
            config,
            state,
            pools,
            scaler,
        })
    }

    /// Swap in a custom pool manager (seeded RNG, provisioner stub).
    pub fn with_pools(mut self, mut pools: GpuPoolManager) -> Self {
        pools.start_ticking(self.state.now());
        self.pools = pools;
        self
    }

    pub fn config(&self) -> &FleetConfig {
        &self.config
    }

    pub fn state(&self) -> &ClusterState {
        &self.state
    }

    /// Direct access for drivers that inject external events.
    pub fn state_mut(&mut self) -> &mut ClusterState {
        &mut self.state
    }

    /// Register a deployment, applying the fleet default spot cap when
    /// the deployment leaves it unset.
    pub fn create_deployment(&mut self, spec: &DeploymentSpec) -> StateResult<()> {
        self.state
            .add_deployment(spec, self.config.pools.default_spot_fraction_cap)
    }

    /// Remove a deployment and its pods. Returns the pods deleted.
    pub fn remove_deployment(&mut self, name: &str) -> usize {
        self.state.remove_deployment(name)
    }

    pub fn set_observed_rps(&mut self, name: &str, rps: f64) -> StateResult<()> {
        self.state.set_observed_rps(name, rps)
    }

    pub fn reconcile(&mut self) -> ReconcileReport {
        self.scaler.reconcile(&mut self.state, &mut self.pools)
    }

    pub fn tick(&mut self) -> TickReport {
        self.pools.tick(&mut self.state)
    }

    /// Evict, then reconcile, so evicted pods are rescheduled in the same
    /// cycle.
    pub fn step(&mut self) -> (TickReport, ReconcileReport) {
        let tick = self.tick();
        let reconcile = self.reconcile();
        (tick, reconcile)
    }

    pub fn snapshot(&self) -> ClusterSnapshot {
        self.state.snapshot()
    }

    /// Drive `step()` every `loop_tick_seconds`, publishing a snapshot
    /// after each cycle, until `shutdown` flips.
    ///
    /// Returns the control plane so the caller can inspect final state.
    pub async fn run(
        mut self,
        snapshots: watch::Sender<ClusterSnapshot>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Self {
        let period = Duration::from_secs_f64(self.config.autoscaler.loop_tick_seconds);
        info!(interval_ms = period.as_millis() as u64, "control loop started");

        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let (tick, report) = self.step();
                    if !tick.evicted.is_empty() {
                        warn!(
                            evicted = tick.evicted.len(),
                            preempted = tick.pods_preempted,
                            "spot capacity reclaimed"
                        );
                    }
                    if report.on_demand_shortage + report.spot_shortage > 0 {
                        info!(
                            on_demand = report.on_demand_shortage,
                            spot = report.spot_shortage,
                            "capacity shortage, provisioning in progress"
                        );
                    }
                    snapshots.send_replace(self.state.snapshot());
                }
                _ = shutdown.changed() => {
                    info!("control loop shutting down");
                    break;
                }
            }
        }
        self
    }
}
