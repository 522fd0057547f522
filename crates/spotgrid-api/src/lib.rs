//! spotgrid-api: read-only REST API for SpotGrid.
//!
//! Handlers serve whatever `ClusterSnapshot` the control loop last
//! published on its `watch` channel. Nothing here mutates the cluster.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/api/v1/snapshot` | Full cluster snapshot |
//! | GET | `/api/v1/nodes` | List nodes (`?pool=<configured pool name>`) |
//! | GET | `/api/v1/pods` | List pods (`?deployment=..&phase=..`) |
//! | GET | `/api/v1/deployments` | List deployments with replica counts |
//! | GET | `/api/v1/deployments/{name}` | One deployment |
//! | GET | `/metrics` | Prometheus exposition |
//! | GET | `/healthz` | Liveness |

pub mod handlers;

use axum::Router;
use axum::routing::get;
use tokio::sync::watch;

use spotgrid_core::PoolConfig;
use spotgrid_state::ClusterSnapshot;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub snapshots: watch::Receiver<ClusterSnapshot>,
    /// Pool display names used as metric labels.
    pub pools: PoolConfig,
}

/// Build the complete API router (REST + metrics + health).
pub fn build_router(snapshots: watch::Receiver<ClusterSnapshot>, pools: PoolConfig) -> Router {
    let api_state = ApiState { snapshots, pools };

    let api_routes = Router::new()
        .route("/snapshot", get(handlers::get_snapshot))
        .route("/nodes", get(handlers::list_nodes))
        .route("/pods", get(handlers::list_pods))
        .route("/deployments", get(handlers::list_deployments))
        .route("/deployments/{name}", get(handlers::get_deployment))
        .with_state(api_state.clone());

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::prometheus_metrics).with_state(api_state))
        .route("/healthz", get(handlers::healthz))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use spotgrid_core::Pool;
    use spotgrid_state::{NodeView, PoolSummary};

    fn router() -> (watch::Sender<ClusterSnapshot>, Router) {
        let (tx, rx) = watch::channel(ClusterSnapshot::default());
        (tx, build_router(rx, PoolConfig::default()))
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let resp = app
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn serves_latest_published_snapshot() {
        let (tx, app) = router();

        let (status, body) = get_json(app.clone(), "/api/v1/nodes").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().unwrap().len(), 0);

        tx.send_replace(ClusterSnapshot {
            taken_at: 5,
            nodes: vec![NodeView {
                id: "node-000001".to_string(),
                pool: Pool::Spot,
                pool_name: "spot".to_string(),
                total_gpus: 8,
                used_gpus: 2,
                preemptible: true,
            }],
            pools: vec![PoolSummary {
                pool: Pool::Spot,
                name: "spot".to_string(),
                nodes: 1,
                total_gpus: 8,
                free_gpus: 6,
            }],
            ..ClusterSnapshot::default()
        });

        let (_, body) = get_json(app.clone(), "/api/v1/nodes?pool=spot").await;
        assert_eq!(body["success"], true);
        assert_eq!(body["data"][0]["id"], "node-000001");

        let (_, body) = get_json(app, "/api/v1/nodes?pool=on-demand").await;
        assert_eq!(body["data"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn unknown_deployment_is_404_with_error_body() {
        let (_tx, app) = router();
        let (status, body) = get_json(app, "/api/v1/deployments/ghost").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "deployment not found");
    }

    #[tokio::test]
    async fn healthz_and_metrics_are_mounted_at_root() {
        let (_tx, app) = router();
        let resp = app
            .clone()
            .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = app
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("spotgrid_nodes{pool=\"spot\"} 0"));
    }
}
