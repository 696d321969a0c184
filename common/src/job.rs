use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobPhase {
    /// Quedan tareas map pendientes o en progreso
    Map,
    /// Todas las map terminaron, quedan reduce
    Reduce,
    Done,
}

/// Foto del estado del job. Sólo lectura, para el driver externo.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub phase: JobPhase,
    pub n_reduce: u32,

    /// -------- Conteo de tareas por colección --------
    pub total_tasks: usize,
    /// Incluye las reduce bloqueadas
    pub pending: usize,
    pub blocked: usize,
    pub in_progress: usize,
    pub completed: usize,

    pub submitted_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl JobSnapshot {
    pub fn is_done(&self) -> bool {
        self.pending == 0 && self.in_progress == 0
    }
}
