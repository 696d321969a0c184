use common::{Epoch, TaskId};
use std::time::Duration;
use tokio::{sync::oneshot, task::JoinHandle, time::sleep};
use tracing::{debug, warn};

use crate::state::{lock_registry, SharedRegistry};

/// Monitor de fallos de una asignación `(task_id, epoch)`.
///
/// Espera lo primero que pase entre:
/// - la señal de DoneTask (o que se suelte el sender): no hace nada,
///   DoneTask ya movió la tarea;
/// - el timeout: devuelve la tarea a pendientes si esa misma asignación
///   sigue en progreso.
pub fn spawn_fault_monitor(
    registry: SharedRegistry,
    task_id: TaskId,
    epoch: Epoch,
    timeout: Duration,
    retired: oneshot::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            _ = retired => {
                debug!("monitor de {} (epoch {}) retirado", task_id, epoch);
            }
            _ = sleep(timeout) => {
                let mut reg = lock_registry(&registry);
                let worker = reg
                    .in_flight(&task_id)
                    .filter(|f| f.epoch == epoch)
                    .and_then(|f| f.worker_id.clone());
                let requeued = reg.expire(&task_id, epoch);
                drop(reg);

                if requeued {
                    warn!(
                        "tarea {} (epoch {}) sin reporte de {:?} tras {:?}, vuelve a pendientes",
                        task_id, epoch, worker, timeout
                    );
                } else {
                    debug!(
                        "timeout de {} (epoch {}) sin efecto, la asignación ya no está en progreso",
                        task_id, epoch
                    );
                }
            }
        }
    })
}
