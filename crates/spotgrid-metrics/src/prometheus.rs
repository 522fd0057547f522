//! Prometheus text exposition format.
//!
//! Pool labels use the names configured in `[pools]`, so dashboards can
//! tell apart fleets that share a scrape target.

use spotgrid_core::{Pool, PoolConfig};
use spotgrid_state::{ClusterSnapshot, PodPhase};

fn header(out: &mut String, name: &str, help: &str) {
    out.push_str(&format!("# HELP {name} {help}\n"));
    out.push_str(&format!("# TYPE {name} gauge\n"));
}

fn escape_label(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

/// Render a cluster snapshot into Prometheus text format.
pub fn render_prometheus(snapshot: &ClusterSnapshot, pools: &PoolConfig) -> String {
    let mut out = String::new();

    header(&mut out, "spotgrid_nodes", "Nodes per pool.");
    for pool in Pool::ALL {
        let nodes = snapshot.pool(pool).map_or(0, |p| p.nodes);
        out.push_str(&format!(
            "spotgrid_nodes{{pool=\"{}\"}} {nodes}\n",
            escape_label(pools.name_of(pool))
        ));
    }

    header(&mut out, "spotgrid_gpus_total", "GPUs provisioned per pool.");
    for pool in Pool::ALL {
        let total = snapshot.pool(pool).map_or(0, |p| p.total_gpus);
        out.push_str(&format!(
            "spotgrid_gpus_total{{pool=\"{}\"}} {total}\n",
            escape_label(pools.name_of(pool))
        ));
    }

    header(&mut out, "spotgrid_gpus_free", "Unallocated GPUs per pool.");
    for pool in Pool::ALL {
        let free = snapshot.pool(pool).map_or(0, |p| p.free_gpus);
        out.push_str(&format!(
            "spotgrid_gpus_free{{pool=\"{}\"}} {free}\n",
            escape_label(pools.name_of(pool))
        ));
    }

    header(&mut out, "spotgrid_pods", "Pods by lifecycle phase.");
    for phase in PodPhase::ALL {
        out.push_str(&format!(
            "spotgrid_pods{{phase=\"{}\"}} {}\n",
            phase.as_str(),
            snapshot.pods_in_phase(phase)
        ));
    }

    header(&mut out, "spotgrid_desired_replicas", "Replica target computed by the autoscaler.");
    for d in &snapshot.deployments {
        out.push_str(&format!(
            "spotgrid_desired_replicas{{deployment=\"{}\"}} {}\n",
            escape_label(&d.name),
            d.desired_replicas
        ));
    }

    header(&mut out, "spotgrid_running_replicas", "Replicas bound to a node.");
    for d in &snapshot.deployments {
        out.push_str(&format!(
            "spotgrid_running_replicas{{deployment=\"{}\"}} {}\n",
            escape_label(&d.name),
            d.running
        ));
    }

    header(&mut out, "spotgrid_pending_replicas", "Replicas waiting for capacity.");
    for d in &snapshot.deployments {
        out.push_str(&format!(
            "spotgrid_pending_replicas{{deployment=\"{}\"}} {}\n",
            escape_label(&d.name),
            d.pending
        ));
    }

    header(&mut out, "spotgrid_preempted_replicas", "Replicas displaced by spot eviction.");
    for d in &snapshot.deployments {
        out.push_str(&format!(
            "spotgrid_preempted_replicas{{deployment=\"{}\"}} {}\n",
            escape_label(&d.name),
            d.preempted
        ));
    }

    header(&mut out, "spotgrid_observed_rps", "Load signal in requests per second.");
    for d in &snapshot.deployments {
        out.push_str(&format!(
            "spotgrid_observed_rps{{deployment=\"{}\"}} {:.2}\n",
            escape_label(&d.name),
            d.observed_rps
        ));
    }

    out
}
