use std::{io, path::PathBuf};

use thiserror::Error;

use crate::rpc::{ErrorBody, ErrorCode};
use crate::task::{Epoch, TaskId};

/// Errores del protocolo GetTask / DoneTask.
#[derive(Error, Debug)]
pub enum CoordinatorError {
    /// Transitorio: la cola está vacía en este instante, hay que volver a preguntar.
    #[error("no hay tareas disponibles por ahora")]
    NoTaskAvailable,

    /// Reporte tardío o duplicado. Se ignora.
    #[error("la tarea {task_id} (epoch {epoch}) no está en progreso")]
    NoSuchTask { task_id: TaskId, epoch: Epoch },

    /// La tarea ya volvió a pendientes; se puede reintentar.
    #[error("no se pudo leer la entrada de la tarea {task_id}: {source}")]
    InputRead {
        task_id: TaskId,
        #[source]
        source: io::Error,
    },

    #[error("job inválido: {0}")]
    InvalidJob(String),
}

impl CoordinatorError {
    pub fn code(&self) -> ErrorCode {
        match self {
            CoordinatorError::NoTaskAvailable => ErrorCode::NoTaskAvailable,
            CoordinatorError::NoSuchTask { .. } => ErrorCode::NoSuchTask,
            CoordinatorError::InputRead { .. } => ErrorCode::InputRead,
            CoordinatorError::InvalidJob(_) => ErrorCode::InvalidJob,
        }
    }

    pub fn to_body(&self) -> ErrorBody {
        let (task_id, epoch) = match self {
            CoordinatorError::NoSuchTask { task_id, epoch } => (Some(task_id.clone()), Some(*epoch)),
            CoordinatorError::InputRead { task_id, .. } => (Some(task_id.clone()), None),
            _ => (None, None),
        };

        ErrorBody {
            code: self.code(),
            message: self.to_string(),
            task_id,
            epoch,
        }
    }
}

/// Reconstruye el error a partir de lo que devolvió el coordinador por HTTP.
impl From<ErrorBody> for CoordinatorError {
    fn from(body: ErrorBody) -> Self {
        match body.code {
            ErrorCode::NoTaskAvailable => CoordinatorError::NoTaskAvailable,
            ErrorCode::NoSuchTask => CoordinatorError::NoSuchTask {
                task_id: body.task_id.unwrap_or_default(),
                epoch: body.epoch.unwrap_or_default(),
            },
            ErrorCode::InputRead => CoordinatorError::InputRead {
                task_id: body.task_id.unwrap_or_default(),
                source: io::Error::other(body.message),
            },
            ErrorCode::InvalidJob => CoordinatorError::InvalidJob(body.message),
        }
    }
}

/// Errores al ejecutar una tarea en el worker. Nunca se reportan al coordinador.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("error de E/S en {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("registro intermedio corrupto en {} (línea {line}): {source}", .path.display())]
    Corrupt {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("la función {phase} de la app {app} falló: {cause:#}")]
    App {
        app: String,
        phase: &'static str,
        cause: anyhow::Error,
    },

    #[error("asignación inválida para {task_id}: {reason}")]
    InvalidAssignment { task_id: TaskId, reason: String },
}

impl EngineError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> EngineError {
        let path = path.into();
        move |source| EngineError::Io { path, source }
    }
}
