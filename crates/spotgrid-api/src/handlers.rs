//! REST API handlers.
//!
//! Each handler reads the latest published snapshot and returns JSON.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Deserialize;

use spotgrid_state::{ClusterSnapshot, PodPhase};

use crate::ApiState;

/// Response wrapper for consistent API format.
#[derive(serde::Serialize)]
struct ApiResponse<T: serde::Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: serde::Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

fn error_response(msg: &str, status: StatusCode) -> impl IntoResponse {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
}

fn latest(state: &ApiState) -> ClusterSnapshot {
    state.snapshots.borrow().clone()
}

// ── Snapshot ───────────────────────────────────────────────────

/// GET /api/v1/snapshot
pub async fn get_snapshot(State(state): State<ApiState>) -> impl IntoResponse {
    ApiResponse::ok(latest(&state))
}

// ── Nodes ──────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct NodeFilter {
    /// Configured pool name (`[pools] spot_pool_name` / `on_demand_pool_name`).
    pub pool: Option<String>,
}

/// GET /api/v1/nodes
pub async fn list_nodes(
    State(state): State<ApiState>,
    Query(filter): Query<NodeFilter>,
) -> impl IntoResponse {
    let snapshot = latest(&state);
    let Some(name) = filter.pool else {
        return ApiResponse::ok(snapshot.nodes).into_response();
    };
    if state.pools.pool_named(&name).is_none() {
        return error_response("unknown pool", StatusCode::BAD_REQUEST).into_response();
    }
    let nodes: Vec<_> = snapshot.nodes_in_pool_named(&name).cloned().collect();
    ApiResponse::ok(nodes).into_response()
}

// ── Pods ───────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct PodFilter {
    pub deployment: Option<String>,
    pub phase: Option<PodPhase>,
}

/// GET /api/v1/pods
pub async fn list_pods(
    State(state): State<ApiState>,
    Query(filter): Query<PodFilter>,
) -> impl IntoResponse {
    let pods: Vec<_> = latest(&state)
        .pods
        .into_iter()
        .filter(|p| filter.deployment.as_deref().is_none_or(|d| p.deployment == d))
        .filter(|p| filter.phase.is_none_or(|ph| p.phase == ph))
        .collect();
    ApiResponse::ok(pods)
}

// ── Deployments ────────────────────────────────────────────────

/// GET /api/v1/deployments
pub async fn list_deployments(State(state): State<ApiState>) -> impl IntoResponse {
    ApiResponse::ok(latest(&state).deployments)
}

/// GET /api/v1/deployments/{name}
pub async fn get_deployment(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    match latest(&state).deployments.into_iter().find(|d| d.name == name) {
        Some(d) => ApiResponse::ok(d).into_response(),
        None => error_response("deployment not found", StatusCode::NOT_FOUND).into_response(),
    }
}

// ── Prometheus ─────────────────────────────────────────────────

/// GET /metrics
pub async fn prometheus_metrics(State(state): State<ApiState>) -> impl IntoResponse {
    let body = spotgrid_metrics::render_prometheus(&latest(&state), &state.pools);
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}

/// GET /healthz
pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}
