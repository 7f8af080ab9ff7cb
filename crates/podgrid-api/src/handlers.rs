//! REST API handlers.
//!
//! Each handler calls into the `ClusterManager` and maps its result onto the
//! JSON envelope and an HTTP status.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use tracing::warn;

use podgrid_cluster::{ClusterError, ScheduleOutcome};

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

fn error_response(msg: &str, status: StatusCode) -> Response {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
        .into_response()
}

fn status_for(err: &ClusterError) -> StatusCode {
    match err {
        ClusterError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        ClusterError::NodeNotFound(_) | ClusterError::PodNotFound(_) => StatusCode::NOT_FOUND,
        ClusterError::DuplicatePod(_) => StatusCode::CONFLICT,
        ClusterError::LaunchFailed { .. } => StatusCode::BAD_GATEWAY,
        ClusterError::StorageFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn cluster_error(err: ClusterError) -> Response {
    let status = status_for(&err);
    if status.is_server_error() {
        warn!(error = %err, "request failed");
    }
    error_response(&err.to_string(), status)
}

/// Unpack a JSON body, answering 400 for anything malformed.
fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, Response> {
    body.map(|Json(value)| value)
        .map_err(|rejection| error_response(&rejection.body_text(), StatusCode::BAD_REQUEST))
}

// ── Liveness ───────────────────────────────────────────────────

/// GET /health
pub async fn health() -> impl IntoResponse {
    ApiResponse::ok("ok")
}

// ── Nodes ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateNodeRequest {
    pub capacity: i64,
}

/// GET /api/v1/nodes
pub async fn list_nodes(State(state): State<ApiState>) -> Response {
    match state.cluster.list_nodes() {
        Ok(nodes) => ApiResponse::ok(nodes).into_response(),
        Err(e) => cluster_error(e),
    }
}

/// POST /api/v1/nodes
pub async fn create_node(
    State(state): State<ApiState>,
    body: Result<Json<CreateNodeRequest>, JsonRejection>,
) -> Response {
    let req = match json_body(body) {
        Ok(req) => req,
        Err(resp) => return resp,
    };
    match state.cluster.create_node(req.capacity).await {
        Ok(node) => (StatusCode::CREATED, ApiResponse::ok(node)).into_response(),
        Err(e) => cluster_error(e),
    }
}

/// GET /api/v1/nodes/{id}
pub async fn get_node(State(state): State<ApiState>, Path(id): Path<String>) -> Response {
    match state.cluster.get_node(&id) {
        Ok(node) => ApiResponse::ok(node).into_response(),
        Err(e) => cluster_error(e),
    }
}

/// DELETE /api/v1/nodes/{id}
pub async fn delete_node(State(state): State<ApiState>, Path(id): Path<String>) -> Response {
    match state.cluster.delete_node(&id).await {
        Ok(()) => ApiResponse::ok("deleted").into_response(),
        Err(e) => cluster_error(e),
    }
}

/// POST /api/v1/nodes/{id}/stop
pub async fn stop_node(State(state): State<ApiState>, Path(id): Path<String>) -> Response {
    match state.cluster.stop_node(&id) {
        Ok(evacuation) => ApiResponse::ok(serde_json::json!({
            "node_id": id,
            "status": "stopped",
            "relocated": evacuation
                .relocated
                .iter()
                .map(|(pod_id, node_id)| serde_json::json!({ "pod_id": pod_id, "node_id": node_id }))
                .collect::<Vec<_>>(),
            "unscheduled": evacuation.unscheduled,
        }))
        .into_response(),
        Err(e) => cluster_error(e),
    }
}

/// POST /api/v1/nodes/{id}/start
pub async fn start_node(State(state): State<ApiState>, Path(id): Path<String>) -> Response {
    match state.cluster.start_node(&id) {
        Ok(()) => ApiResponse::ok(serde_json::json!({ "node_id": id, "status": "started" }))
            .into_response(),
        Err(e) => cluster_error(e),
    }
}

// ── Heartbeats ─────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct HeartbeatRequest {
    pub node_id: String,
}

/// POST /api/v1/heartbeat
pub async fn heartbeat(
    State(state): State<ApiState>,
    body: Result<Json<HeartbeatRequest>, JsonRejection>,
) -> Response {
    let req = match json_body(body) {
        Ok(req) => req,
        Err(resp) => return resp,
    };
    if req.node_id.trim().is_empty() {
        return error_response("node_id must not be empty", StatusCode::BAD_REQUEST);
    }
    match state.cluster.heartbeat(&req.node_id) {
        Ok(()) => ApiResponse::ok("ack").into_response(),
        Err(e) => cluster_error(e),
    }
}

// ── Pods ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SchedulePodRequest {
    pub pod_id: String,
    pub cpu_request: i64,
    #[serde(default)]
    pub policy: Option<String>,
}

/// GET /api/v1/pods
pub async fn list_pods(State(state): State<ApiState>) -> Response {
    match state.cluster.list_pods() {
        Ok(pods) => ApiResponse::ok(pods).into_response(),
        Err(e) => cluster_error(e),
    }
}

/// POST /api/v1/pods
///
/// 200 when placed, 202 when accepted but left Unscheduled.
pub async fn schedule_pod(
    State(state): State<ApiState>,
    body: Result<Json<SchedulePodRequest>, JsonRejection>,
) -> Response {
    let req = match json_body(body) {
        Ok(req) => req,
        Err(resp) => return resp,
    };
    match state
        .cluster
        .schedule_pod(&req.pod_id, req.cpu_request, req.policy.as_deref())
    {
        Ok(outcome @ ScheduleOutcome::Scheduled { .. }) => ApiResponse::ok(outcome).into_response(),
        Ok(outcome @ ScheduleOutcome::Unscheduled { .. }) => {
            (StatusCode::ACCEPTED, ApiResponse::ok(outcome)).into_response()
        }
        Err(e) => cluster_error(e),
    }
}

/// DELETE /api/v1/pods/{id}
pub async fn delete_pod(State(state): State<ApiState>, Path(id): Path<String>) -> Response {
    match state.cluster.delete_pod(&id) {
        Ok(()) => ApiResponse::ok("deleted").into_response(),
        Err(e) => cluster_error(e),
    }
}
