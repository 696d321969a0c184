use common::{
    files::intermediate_file_name, CoordinatorError, Epoch, JobSnapshot, Operation,
    TaskAssignment, WorkerId,
};
use std::{
    sync::{Arc, Mutex},
    time::Duration,
};
use tracing::{info, warn};

use crate::monitor::spawn_fault_monitor;
use crate::state::{lock_registry, Assignment, Registry, SharedRegistry};

/// Motor de tareas del coordinador: GetTask / DoneTask / Done.
///
/// Todo cambio de estado pasa por el único lock del registro. El lock nunca
/// se mantiene durante un `.await`: la lectura de la entrada de una tarea
/// map se hace afuera, cuando la tarea ya figura en progreso y ya tiene su
/// monitor de fallos.
#[derive(Clone)]
pub struct Coordinator {
    registry: SharedRegistry,
    task_timeout: Duration,
}

impl Coordinator {
    pub fn new(
        inputs: &[String],
        n_reduce: u32,
        task_timeout: Duration,
    ) -> Result<Self, CoordinatorError> {
        let registry = Registry::new(inputs, n_reduce)?;
        Ok(Self {
            registry: Arc::new(Mutex::new(registry)),
            task_timeout,
        })
    }

    pub async fn get_task(
        &self,
        worker_id: Option<WorkerId>,
    ) -> Result<TaskAssignment, CoordinatorError> {
        let (Assignment {
            task,
            epoch,
            retired,
        }, n_reduce) = {
            let mut reg = lock_registry(&self.registry);
            (reg.assign(worker_id.clone())?, reg.n_reduce())
        };

        // antes de cualquier await: si el future se cancela durante la
        // lectura, el timeout igual devuelve la tarea a pendientes
        spawn_fault_monitor(
            self.registry.clone(),
            task.id.clone(),
            epoch,
            self.task_timeout,
            retired,
        );

        let content = match task.operation {
            Operation::Map => match tokio::fs::read_to_string(&task.id).await {
                Ok(content) => content,
                Err(source) => {
                    // release es por epoch y suelta el sender, así que el
                    // monitor de esta asignación termina sin efecto
                    let requeued = lock_registry(&self.registry).release(&task.id, epoch);
                    warn!(
                        "no se pudo leer {} para el worker {:?}: {} (reencolada={})",
                        task.id, worker_id, source, requeued
                    );
                    return Err(CoordinatorError::InputRead {
                        task_id: task.id,
                        source,
                    });
                }
            },
            // reduce: la "entrada" es la referencia a su partición
            Operation::Reduce => task
                .partition
                .map(intermediate_file_name)
                .unwrap_or_else(|| task.id.clone()),
        };

        info!(
            "asignando tarea {:?} {} (epoch {}) al worker {:?}",
            task.operation, task.id, epoch, worker_id
        );

        Ok(TaskAssignment {
            task_id: task.id,
            epoch,
            operation: task.operation,
            content,
            n_reduce,
            partition: task.partition,
        })
    }

    pub fn done_task(&self, task_id: &str, epoch: Epoch) -> Result<(), CoordinatorError> {
        let mut reg = lock_registry(&self.registry);
        match reg.complete(task_id, epoch) {
            Ok(task) => {
                info!(
                    "tarea {:?} {} (epoch {}) completada ({}/{} completadas, {} en progreso)",
                    task.operation,
                    task.id,
                    epoch,
                    reg.completed_len(),
                    reg.total(),
                    reg.in_progress_len()
                );
                Ok(())
            }
            Err(e) => {
                info!("reporte ignorado: {}", e);
                Err(e)
            }
        }
    }

    /// true si no queda nada pendiente ni en progreso. Es una foto, no una
    /// barrera.
    pub fn done(&self) -> bool {
        lock_registry(&self.registry).is_done()
    }

    pub fn snapshot(&self) -> JobSnapshot {
        lock_registry(&self.registry).snapshot()
    }
}
