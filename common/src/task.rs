use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::files::reduce_task_id;

pub type TaskId = String;

/// Número de asignación. Cada GetTask exitoso recibe uno nuevo, creciente.
pub type Epoch = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operation {
    Map,
    Reduce,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    Idle,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Nombre del archivo de entrada (map) o `mr-<i>` (reduce)
    pub id: TaskId,
    pub operation: Operation,
    pub state: TaskState,

    /// Partición que consume una tarea reduce
    pub partition: Option<u32>,

    /// Momento de la última asignación, si está en progreso
    pub assigned_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn map(filename: impl Into<String>) -> Self {
        Self {
            id: filename.into(),
            operation: Operation::Map,
            state: TaskState::Idle,
            partition: None,
            assigned_at: None,
        }
    }

    pub fn reduce(partition: u32) -> Self {
        Self {
            id: reduce_task_id(partition),
            operation: Operation::Reduce,
            state: TaskState::Idle,
            partition: Some(partition),
            assigned_at: None,
        }
    }

    pub fn is_map(&self) -> bool {
        self.operation == Operation::Map
    }
}
