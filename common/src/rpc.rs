use serde::{Deserialize, Serialize};

use crate::task::{Epoch, Operation, TaskId};

pub type WorkerId = String;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskAssignmentRequest {
    #[serde(default)]
    pub worker_id: Option<WorkerId>,
}

/// Respuesta de GetTask.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskAssignment {
    pub task_id: TaskId,
    pub epoch: Epoch,
    pub operation: Operation,

    /// Map: contenido del archivo de entrada.
    /// Reduce: nombre del archivo de partición (`mr-<p>`), no su contenido.
    pub content: String,

    pub n_reduce: u32,
    pub partition: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskCompleteRequest {
    pub task_id: TaskId,
    pub epoch: Epoch,
    #[serde(default)]
    pub worker_id: Option<WorkerId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskCompleteResponse {
    pub ok: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoneResponse {
    pub done: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    NoTaskAvailable,
    NoSuchTask,
    InputRead,
    InvalidJob,
}

/// Cuerpo JSON de toda respuesta de error del coordinador.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: ErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<TaskId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub epoch: Option<Epoch>,
}
