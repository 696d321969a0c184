mod config;
mod coordinator;
mod handlers;
mod monitor;
mod state;

use anyhow::{Context, Result};
use std::{env, time::Duration};
use tokio::{net::TcpListener, time::sleep};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::{clean_work_dir, CoordinatorConfig};
use crate::coordinator::Coordinator;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("coordinator=debug,tower_http=info,axum=info")),
        )
        .init();

    let cfg = CoordinatorConfig::from_env(env::args().skip(1).collect())?;

    // valida el job antes de tocar WORK_DIR: ninguna entrada puede llamarse
    // como un archivo de partición
    let coordinator = Coordinator::new(&cfg.inputs, cfg.n_reduce, cfg.task_timeout)?;

    let removed = clean_work_dir(&cfg.work_dir)?;
    if removed > 0 {
        warn!(
            "borrados {} archivos de una corrida anterior en {}",
            removed,
            cfg.work_dir.display()
        );
    }
    info!(
        "job creado: {} archivos de entrada, n_reduce={}, timeout={:?}",
        cfg.inputs.len(),
        cfg.n_reduce,
        cfg.task_timeout
    );

    // router HTTP
    let app = handlers::build_router(coordinator.clone());

    let listener = TcpListener::bind(&cfg.bind_addr)
        .await
        .with_context(|| format!("no se pudo escuchar en {}", cfg.bind_addr))?;
    info!("coordinator escuchando en {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(wait_until_done(coordinator, cfg))
        .await?;

    info!("coordinator terminado");
    Ok(())
}

/// Driver del job: consulta Done() periódicamente. Cuando el job terminó
/// deja un margen para que los workers vean `done=true` y después corta
/// el servidor. Ctrl-C corta antes.
async fn wait_until_done(coordinator: Coordinator, cfg: CoordinatorConfig) {
    tokio::select! {
        _ = poll_done(&coordinator, cfg.done_poll_interval) => {
            let snap = coordinator.snapshot();
            info!(
                "job terminado: {} tareas en {}s, cerrando en {:?}",
                snap.total_tasks,
                snap.finished_at
                    .map(|t| (t - snap.submitted_at).num_seconds())
                    .unwrap_or_default(),
                cfg.shutdown_grace
            );
            sleep(cfg.shutdown_grace).await;
        }
        _ = tokio::signal::ctrl_c() => {
            warn!("interrumpido con el job sin terminar: {:?}", coordinator.snapshot());
        }
    }
}

async fn poll_done(coordinator: &Coordinator, every: Duration) {
    while !coordinator.done() {
        sleep(every).await;
    }
}
