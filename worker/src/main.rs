mod config;
mod coordinator_client;
mod worker;

#[cfg(test)]
mod testing;

use anyhow::Result;
use common::apps;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::WorkerConfig;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("worker=debug,reqwest=info")),
        )
        .init();

    let cfg = WorkerConfig::from_env()?;
    let app = apps::named(&cfg.app)?;

    tokio::select! {
        res = worker::run(&cfg, app) => {
            let stats = res?;
            info!("worker {} terminado: {:?}", cfg.worker_id, stats);
        }
        _ = tokio::signal::ctrl_c() => {
            warn!("worker {} interrumpido", cfg.worker_id);
        }
    }

    Ok(())
}
