use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use common::{
    CoordinatorError, DoneResponse, JobSnapshot, TaskAssignment, TaskAssignmentRequest,
    TaskCompleteRequest, TaskCompleteResponse,
};
use tower_http::trace::TraceLayer;
use tracing::debug;

use crate::coordinator::Coordinator;

pub fn build_router(coordinator: Coordinator) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/tasks/next", post(assign_task))
        .route("/api/v1/tasks/complete", post(complete_task))
        .route("/api/v1/done", get(job_done))
        .route("/api/v1/job", get(job_status))
        .layer(TraceLayer::new_for_http())
        .with_state(coordinator)
}

/* ---------------- errores ---------------- */

/// Envuelve el error del protocolo para devolverlo como JSON.
pub struct ApiError(CoordinatorError);

impl From<CoordinatorError> for ApiError {
    fn from(e: CoordinatorError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // NoTaskAvailable es parte del polling normal, no un fallo del servidor
        let status = match &self.0 {
            CoordinatorError::NoTaskAvailable => StatusCode::CONFLICT,
            CoordinatorError::NoSuchTask { .. } => StatusCode::NOT_FOUND,
            CoordinatorError::InputRead { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            CoordinatorError::InvalidJob(_) => StatusCode::BAD_REQUEST,
        };
        (status, Json(self.0.to_body())).into_response()
    }
}

/* ---------------- handlers HTTP ---------------- */

async fn health() -> &'static str {
    "ok"
}

// GetTask
async fn assign_task(
    State(coordinator): State<Coordinator>,
    Json(req): Json<TaskAssignmentRequest>,
) -> Result<Json<TaskAssignment>, ApiError> {
    let assignment = coordinator.get_task(req.worker_id).await?;
    Ok(Json(assignment))
}

// DoneTask
async fn complete_task(
    State(coordinator): State<Coordinator>,
    Json(req): Json<TaskCompleteRequest>,
) -> Result<Json<TaskCompleteResponse>, ApiError> {
    debug!(
        "reporte de {} (epoch {}) desde {:?}",
        req.task_id, req.epoch, req.worker_id
    );
    coordinator.done_task(&req.task_id, req.epoch)?;
    Ok(Json(TaskCompleteResponse { ok: true }))
}

// Done
async fn job_done(State(coordinator): State<Coordinator>) -> Json<DoneResponse> {
    Json(DoneResponse {
        done: coordinator.done(),
    })
}

async fn job_status(State(coordinator): State<Coordinator>) -> Json<JobSnapshot> {
    Json(coordinator.snapshot())
}
