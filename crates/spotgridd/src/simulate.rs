//! Offline simulation: drives the control plane against a manual clock.
//!
//! Each simulated tick advances the clock by `loop_tick_seconds`, applies
//! the load profile, then runs one evict-and-reconcile cycle. Given the
//! same config, seed and profile the run is fully reproducible.

use std::f64::consts::TAU;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use spotgrid_autoscale::ControlPlane;
use spotgrid_core::FleetConfig;
use spotgrid_state::{ClusterSnapshot, ManualClock};

/// Simulated wall-clock origin (2023-11-14T22:13:20Z).
const SIM_EPOCH_MILLIS: u64 = 1_700_000_000_000;

#[derive(Debug, Clone)]
pub struct SimulateOptions {
    pub ticks: u32,
    pub seed: u64,
    /// Relative swing of each deployment's load around its configured
    /// `observed_rps`. Zero keeps the load flat.
    pub amplitude: f64,
    /// Ticks per full load cycle.
    pub period_ticks: u32,
}

/// Totals accumulated over a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimulationSummary {
    pub ticks: u32,
    pub evictions: usize,
    pub pods_preempted: usize,
    pub pods_created: u32,
    pub pods_removed: u32,
    pub nodes_added: u32,
    pub nodes_reclaimed: usize,
}

/// Load multiplier for `tick` under a sinusoidal profile.
fn load_factor(tick: u32, amplitude: f64, period_ticks: u32) -> f64 {
    if amplitude == 0.0 || period_ticks == 0 {
        return 1.0;
    }
    let phase = TAU * f64::from(tick) / f64::from(period_ticks);
    (1.0 + amplitude * phase.sin()).max(0.0)
}

pub fn simulate(
    mut config: FleetConfig,
    opts: &SimulateOptions,
) -> anyhow::Result<(ClusterSnapshot, SimulationSummary)> {
    config.eviction.seed = Some(opts.seed);
    let step = Duration::from_secs_f64(config.autoscaler.loop_tick_seconds);
    let base_load: Vec<(String, f64)> = config
        .deployments
        .iter()
        .map(|d| (d.name.clone(), d.observed_rps))
        .collect();

    let clock = ManualClock::new(SIM_EPOCH_MILLIS);
    let mut plane = ControlPlane::new(config, Arc::new(clock.clone()))?;
    let mut summary = SimulationSummary::default();

    info!(
        ticks = opts.ticks,
        seed = opts.seed,
        amplitude = opts.amplitude,
        deployments = base_load.len(),
        "simulation started"
    );

    for tick in 1..=opts.ticks {
        clock.advance(step);
        let factor = load_factor(tick, opts.amplitude, opts.period_ticks);
        for (name, base) in &base_load {
            plane.set_observed_rps(name, base * factor)?;
        }

        let (evictions, report) = plane.step();
        summary.ticks = tick;
        summary.evictions += evictions.evicted.len();
        summary.pods_preempted += evictions.pods_preempted;
        summary.nodes_reclaimed += evictions.reclaimed.len() + report.nodes_reclaimed.len();
        summary.pods_created += report.pods_created;
        summary.pods_removed += report.pods_removed;
        summary.nodes_added += report.nodes_added_on_demand + report.nodes_added_spot;

        debug!(
            tick,
            load_factor = factor,
            nodes = plane.state().node_count(),
            pods = plane.state().pod_count(),
            evicted = evictions.evicted.len(),
            "simulated tick"
        );
    }

    plane.state().verify()?;
    Ok((plane.snapshot(), summary))
}
