//! GpuPoolManager: provisions, reclaims and evicts nodes.

use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use tracing::{debug, info, warn};

use spotgrid_core::{FleetConfig, Pool};
use spotgrid_state::{ClusterState, NodeId};

use crate::eviction::eviction_probability;
use crate::provisioner::{NodeProvisioner, SimulatedProvisioner};

/// Pool manager tuning, usually derived from `FleetConfig`.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolSettings {
    pub gpu_per_node: u32,
    pub node_startup_seconds: u64,
    pub scale_down_cooldown_seconds: u64,
    pub eviction_rate_per_minute: f64,
}

impl PoolSettings {
    pub fn from_config(config: &FleetConfig) -> Self {
        Self {
            gpu_per_node: config.pools.gpu_per_node,
            node_startup_seconds: config.pools.node_startup_seconds,
            scale_down_cooldown_seconds: config.autoscaler.scale_down_cooldown_seconds,
            eviction_rate_per_minute: config.eviction.global_spot_eviction_rate_per_minute,
        }
    }

    /// Minimum age before an idle node may be reclaimed.
    pub fn idle_threshold_millis(&self) -> u64 {
        self.node_startup_seconds
            .saturating_add(self.scale_down_cooldown_seconds)
            .saturating_mul(1000)
    }
}

/// Outcome of one eviction tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    /// Seconds since the previous tick.
    pub elapsed_secs: f64,
    /// Per-node eviction probability applied this tick.
    pub probability: f64,
    pub evicted: Vec<NodeId>,
    pub pods_preempted: usize,
    /// Idle nodes reclaimed after the evictions.
    pub reclaimed: Vec<NodeId>,
}

/// Owns the capacity lifecycle of both pools.
pub struct GpuPoolManager {
    settings: PoolSettings,
    provisioner: Box<dyn NodeProvisioner>,
    rng: Box<dyn RngCore + Send>,
    /// Epoch milliseconds of the previous tick.
    last_tick: Option<u64>,
}

impl std::fmt::Debug for GpuPoolManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuPoolManager")
            .field("settings", &self.settings)
            .field("provisioner", &self.provisioner)
            .field("last_tick", &self.last_tick)
            .finish_non_exhaustive()
    }
}

impl GpuPoolManager {
    /// Create a manager with unlimited simulated capacity and an
    /// entropy-seeded RNG.
    pub fn new(settings: PoolSettings) -> Self {
        Self {
            settings,
            provisioner: Box::new(SimulatedProvisioner::unlimited()),
            rng: Box::new(StdRng::from_entropy()),
            last_tick: None,
        }
    }

    /// Build from fleet config: quota and seed are honoured.
    pub fn from_config(config: &FleetConfig) -> Self {
        let manager = Self::new(PoolSettings::from_config(config))
            .with_provisioner(SimulatedProvisioner::new(config.pools.max_nodes_per_pool));
        match config.eviction.seed {
            Some(seed) => manager.with_rng(StdRng::seed_from_u64(seed)),
            None => manager,
        }
    }

    /// Replace the random source (seed it for reproducible runs).
    pub fn with_rng(mut self, rng: impl RngCore + Send + 'static) -> Self {
        self.rng = Box::new(rng);
        self
    }

    pub fn with_provisioner(mut self, provisioner: impl NodeProvisioner + 'static) -> Self {
        self.provisioner = Box::new(provisioner);
        self
    }

    pub fn settings(&self) -> &PoolSettings {
        &self.settings
    }

    /// Anchor the eviction clock; the next tick measures Δt from `now`.
    pub fn start_ticking(&mut self, now: u64) {
        self.last_tick = Some(now);
    }

    /// Add nodes so each pool has at least the demanded free GPUs.
    ///
    /// Returns `(on_demand_nodes_added, spot_nodes_added)`. Demand already
    /// covered by free capacity adds nothing. Provider failures are logged
    /// and leave the shortage for the next reconcile.
    pub fn ensure_capacity(
        &mut self,
        state: &mut ClusterState,
        demand_on_demand_gpus: u32,
        demand_spot_gpus: u32,
    ) -> (u32, u32) {
        let on_demand = self.ensure_pool(state, Pool::OnDemand, demand_on_demand_gpus);
        let spot = self.ensure_pool(state, Pool::Spot, demand_spot_gpus);
        (on_demand, spot)
    }

    fn ensure_pool(&mut self, state: &mut ClusterState, pool: Pool, demand: u32) -> u32 {
        let free = state.free_gpus_by_pool(pool);
        let deficit = demand.saturating_sub(free);
        if deficit == 0 {
            return 0;
        }

        let wanted = deficit.div_ceil(self.settings.gpu_per_node);
        let existing = state.nodes_in_pool(pool).count() as u32;
        let granted = match self.provisioner.provision(pool, wanted, existing) {
            Ok(granted) => granted,
            Err(e) => {
                warn!(%pool, wanted, error = %e, "provisioning failed, shortage persists");
                return 0;
            }
        };
        if granted < wanted {
            warn!(%pool, wanted, granted, "provisioning partially satisfied");
        }

        for _ in 0..granted {
            state.add_node(pool, self.settings.gpu_per_node, pool.is_preemptible());
        }
        if granted > 0 {
            info!(
                %pool,
                demand,
                free,
                nodes = granted,
                gpu_per_node = self.settings.gpu_per_node,
                "provisioned nodes"
            );
        }
        granted
    }

    /// Remove nodes with no GPUs in use that are older than the startup
    /// grace plus the scale-down cooldown.
    pub fn scale_down_idle_nodes(&self, state: &mut ClusterState) -> Vec<NodeId> {
        let now = state.now();
        let threshold = self.settings.idle_threshold_millis();
        let idle: Vec<NodeId> = state
            .nodes()
            .filter(|n| n.used_gpus == 0 && n.age_millis(now) > threshold)
            .map(|n| n.id.clone())
            .collect();

        for id in &idle {
            state.remove_node(id);
        }
        if !idle.is_empty() {
            info!(count = idle.len(), "reclaimed idle nodes");
        }
        idle
    }

    /// Simulate spot reclamation for the time since the previous tick,
    /// then reclaim idle nodes.
    pub fn tick(&mut self, state: &mut ClusterState) -> TickReport {
        let now = state.now();
        let elapsed_secs = match self.last_tick.replace(now) {
            Some(prev) => now.saturating_sub(prev) as f64 / 1000.0,
            None => 0.0,
        };
        let probability =
            eviction_probability(self.settings.eviction_rate_per_minute, elapsed_secs);

        let candidates: Vec<NodeId> = state
            .nodes()
            .filter(|n| n.preemptible && !n.terminating)
            .map(|n| n.id.clone())
            .collect();

        let mut report = TickReport {
            elapsed_secs,
            probability,
            ..TickReport::default()
        };

        if probability > 0.0 {
            for id in candidates {
                if self.rng.r#gen::<f64>() < probability {
                    let preempted = state.remove_node(&id);
                    info!(node = %id, preempted, "spot node evicted");
                    report.pods_preempted += preempted;
                    report.evicted.push(id);
                }
            }
        }

        debug!(
            elapsed_secs,
            probability,
            evicted = report.evicted.len(),
            "eviction tick"
        );

        report.reclaimed = self.scale_down_idle_nodes(state);
        report
    }
}
