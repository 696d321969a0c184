//! Coordinador falso para los tests del worker: sirve una cola fija de
//! asignaciones y anota los reportes.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use common::{
    CoordinatorError, DoneResponse, Epoch, TaskAssignment, TaskCompleteRequest,
    TaskCompleteResponse,
};
use std::{
    collections::VecDeque,
    env, fs,
    net::SocketAddr,
    path::PathBuf,
    sync::{Arc, Mutex},
};
use tokio::net::TcpListener;

pub fn temp_dir(sub: &str) -> PathBuf {
    let base = env::temp_dir().join("worker_tests").join(sub);
    let _ = fs::remove_dir_all(&base);
    fs::create_dir_all(&base).unwrap();
    base
}

#[derive(Clone, Default)]
struct StubState {
    queue: Arc<Mutex<VecDeque<TaskAssignment>>>,
    reports: Arc<Mutex<Vec<(String, Epoch)>>>,
    // None: terminado cuando la cola está vacía
    done: Arc<Mutex<Option<bool>>>,
    // próximos GetTask que responden input_read
    failures: Arc<Mutex<usize>>,
}

pub struct StubCoordinator {
    addr: SocketAddr,
    state: StubState,
}

impl StubCoordinator {
    pub async fn start(assignments: Vec<TaskAssignment>) -> Self {
        let state = StubState::default();
        state.queue.lock().unwrap().extend(assignments);

        let router = Router::new()
            .route("/api/v1/tasks/next", post(next))
            .route("/api/v1/tasks/complete", post(complete))
            .route("/api/v1/done", get(done))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Self { addr, state }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn reports(&self) -> Vec<(String, Epoch)> {
        self.state.reports.lock().unwrap().clone()
    }

    pub fn fail_next_polls(&self, n: usize) {
        *self.state.failures.lock().unwrap() = n;
    }

    pub fn pending_failures(&self) -> usize {
        *self.state.failures.lock().unwrap()
    }

    pub fn set_done(&self, done: bool) {
        *self.state.done.lock().unwrap() = Some(done);
    }
}

async fn next(State(s): State<StubState>) -> Response {
    {
        let mut failures = s.failures.lock().unwrap();
        if *failures > 0 {
            *failures -= 1;
            let err = CoordinatorError::InputRead {
                task_id: "in-roto".to_string(),
                source: std::io::Error::other("archivo no disponible"),
            };
            return (StatusCode::INTERNAL_SERVER_ERROR, Json(err.to_body())).into_response();
        }
    }
    match s.queue.lock().unwrap().pop_front() {
        Some(a) => Json(a).into_response(),
        None => (
            StatusCode::CONFLICT,
            Json(CoordinatorError::NoTaskAvailable.to_body()),
        )
            .into_response(),
    }
}

async fn complete(
    State(s): State<StubState>,
    Json(req): Json<TaskCompleteRequest>,
) -> Response {
    if req.epoch == 0 {
        let err = CoordinatorError::NoSuchTask {
            task_id: req.task_id,
            epoch: req.epoch,
        };
        return (StatusCode::NOT_FOUND, Json(err.to_body())).into_response();
    }
    s.reports.lock().unwrap().push((req.task_id, req.epoch));
    Json(TaskCompleteResponse { ok: true }).into_response()
}

async fn done(State(s): State<StubState>) -> Json<DoneResponse> {
    let forced = *s.done.lock().unwrap();
    let done = forced.unwrap_or_else(|| s.queue.lock().unwrap().is_empty());
    Json(DoneResponse { done })
}
