//! podgrid-api — REST API for podgrid.
//!
//! Thin axum layer over [`podgrid_cluster::ClusterManager`]. Every response
//! uses the same JSON envelope: `{"success": bool, "data": ..., "error": ...}`.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/health` | Liveness |
//! | GET | `/api/v1/nodes` | List nodes |
//! | POST | `/api/v1/nodes` | Create a node `{capacity}` |
//! | GET | `/api/v1/nodes/{id}` | Get one node |
//! | DELETE | `/api/v1/nodes/{id}` | Delete a node |
//! | POST | `/api/v1/nodes/{id}/stop` | Stop a node, evacuating its pods |
//! | POST | `/api/v1/nodes/{id}/start` | Start a stopped node |
//! | POST | `/api/v1/heartbeat` | Node heartbeat `{node_id}` |
//! | GET | `/api/v1/pods` | List pods |
//! | POST | `/api/v1/pods` | Schedule a pod `{pod_id, cpu_request, policy?}` |
//! | DELETE | `/api/v1/pods/{id}` | Delete a pod |

pub mod handlers;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use podgrid_cluster::ClusterManager;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub cluster: Arc<ClusterManager>,
}

/// Build the complete API router.
pub fn build_router(cluster: Arc<ClusterManager>) -> Router {
    let api_state = ApiState { cluster };

    let api_routes = Router::new()
        .route("/nodes", get(handlers::list_nodes).post(handlers::create_node))
        .route("/nodes/{id}", get(handlers::get_node).delete(handlers::delete_node))
        .route("/nodes/{id}/stop", post(handlers::stop_node))
        .route("/nodes/{id}/start", post(handlers::start_node))
        .route("/heartbeat", post(handlers::heartbeat))
        .route("/pods", get(handlers::list_pods).post(handlers::schedule_pod))
        .route("/pods/{id}", axum::routing::delete(handlers::delete_pod))
        .with_state(api_state);

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/health", get(handlers::health))
}
