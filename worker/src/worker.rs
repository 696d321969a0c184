use anyhow::Result;
use common::{engine, CoordinatorError, MapReduceApp, TaskAssignment, TaskOutcome};
use std::sync::Arc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::WorkerConfig;
use crate::coordinator_client::{ClientError, CoordinatorClient};

/// Lo que hizo el worker hasta que el job terminó.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WorkerStats {
    /// Ejecutadas y aceptadas por el coordinador
    pub completed: usize,
    /// Falló la ejecución; no se reportaron
    pub failed: usize,
    /// Ejecutadas pero el coordinador no registró el reporte
    pub unreported: usize,
}

/// Cómo terminó una asignación.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Processed {
    Reported,
    Failed,
    Unreported,
}

/// Loop principal del worker.
/// - En cada tick pide una tarea (GetTask).
/// - La ejecuta en un hilo de bloqueo y, sólo si salió bien, la reporta (DoneTask).
/// - Sin tarea: pregunta Done(); si el job terminó, sale.
/// - Errores de transporte: espera al próximo tick, nunca sale.
pub async fn run(cfg: &WorkerConfig, app: Arc<dyn MapReduceApp>) -> Result<WorkerStats> {
    let client = CoordinatorClient::new(cfg.coordinator_url.clone())?;
    let mut stats = WorkerStats::default();

    info!(
        "worker {} usando app {} contra {} (work_dir={})",
        cfg.worker_id,
        app.name(),
        cfg.coordinator_url,
        cfg.work_dir.display()
    );

    let mut ticker = interval(cfg.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        match client.get_task(&cfg.worker_id).await {
            Ok(assignment) => {
                match process(&client, cfg, app.clone(), assignment).await {
                    Processed::Reported => stats.completed += 1,
                    Processed::Failed => stats.failed += 1,
                    Processed::Unreported => stats.unreported += 1,
                }
            }
            Err(ClientError::Coordinator(CoordinatorError::NoTaskAvailable)) => {
                match client.is_done().await {
                    Ok(true) => {
                        info!(
                            "job terminado, worker {} sale ({} hechas, {} fallidas, {} sin reportar)",
                            cfg.worker_id, stats.completed, stats.failed, stats.unreported
                        );
                        return Ok(stats);
                    }
                    Ok(false) => debug!("no hay tareas por ahora"),
                    Err(e) => warn!("no se pudo consultar Done(): {}", e),
                }
            }
            Err(ClientError::Coordinator(e)) => {
                // p. ej. input_read: la tarea ya volvió a pendientes
                warn!("GetTask rechazado: {}", e);
            }
            Err(e) => {
                warn!("coordinador inalcanzable: {}", e);
            }
        }
    }
}

/// Ejecuta una asignación y la reporta.
async fn process(
    client: &CoordinatorClient,
    cfg: &WorkerConfig,
    app: Arc<dyn MapReduceApp>,
    assignment: TaskAssignment,
) -> Processed {
    info!(
        "tengo tarea {:?} {} (epoch {})",
        assignment.operation, assignment.task_id, assignment.epoch
    );

    let task_id = assignment.task_id.clone();
    let epoch = assignment.epoch;
    let work_dir = cfg.work_dir.clone();

    // map/reduce hacen E/S bloqueante
    let handle =
        tokio::task::spawn_blocking(move || engine::execute(app.as_ref(), &assignment, &work_dir));

    let outcome = match handle.await {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(e)) => {
            // no se reporta: el monitor del coordinador la va a reasignar
            warn!("error procesando tarea {}: {}", task_id, e);
            return Processed::Failed;
        }
        Err(e) => {
            warn!("panic o join error en tarea {}: {:?}", task_id, e);
            return Processed::Failed;
        }
    };

    match outcome {
        TaskOutcome::Mapped { records } => {
            info!("map {} emitió {} pares", task_id, records)
        }
        TaskOutcome::Reduced { keys } => {
            info!("reduce {} escribió {} claves", task_id, keys)
        }
    }

    match client.done_task(&task_id, epoch, &cfg.worker_id).await {
        Ok(()) => {
            debug!("reporté {} (epoch {})", task_id, epoch);
            Processed::Reported
        }
        Err(ClientError::Coordinator(CoordinatorError::NoSuchTask { .. })) => {
            // llegamos tarde: otro worker ya tiene la tarea
            info!("reporte de {} (epoch {}) ignorado por el coordinador", task_id, epoch);
            Processed::Unreported
        }
        Err(e) => {
            // el monitor del coordinador la va a reasignar
            warn!("no se pudo reportar {}: {}", task_id, e);
            Processed::Unreported
        }
    }
}
