//! spotgrid-metrics: observability for the GPU fleet.
//!
//! Turns a `ClusterSnapshot` into Prometheus gauges. The exporter never
//! reads `ClusterState` directly; whatever the control loop last
//! published is what gets scraped.
//!
//! ```text
//! ControlPlane ── snapshot() ──▶ watch channel ──▶ render_prometheus() ──▶ /metrics
//! ```

pub mod prometheus;

pub use prometheus::render_prometheus;
