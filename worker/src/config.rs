use anyhow::{Context, Result};
use common::WorkerId;
use std::{env, path::PathBuf, time::Duration};

const DEFAULT_COORDINATOR_URL: &str = "http://localhost:8080";
const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;
const DEFAULT_APP: &str = "wordcount";

/// Configuración del worker.
/// - En Docker: COORDINATOR_URL=http://coordinator:8080
/// - Local: http://localhost:8080
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub coordinator_url: String,
    pub work_dir: PathBuf,
    pub poll_interval: Duration,
    pub app: String,
    pub worker_id: WorkerId,
}

impl WorkerConfig {
    pub fn from_env() -> Result<Self> {
        let poll_ms = match env::var("POLL_INTERVAL_MS") {
            Ok(raw) => raw
                .trim()
                .parse::<u64>()
                .with_context(|| format!("POLL_INTERVAL_MS inválido: {:?}", raw))?,
            Err(_) => DEFAULT_POLL_INTERVAL_MS,
        };

        Ok(Self {
            coordinator_url: env::var("COORDINATOR_URL")
                .unwrap_or_else(|_| DEFAULT_COORDINATOR_URL.to_string()),
            work_dir: env::var("WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(".")),
            // interval() no acepta período cero
            poll_interval: Duration::from_millis(poll_ms.max(1)),
            app: env::var("MR_APP").unwrap_or_else(|_| DEFAULT_APP.to_string()),
            worker_id: worker_id(),
        })
    }
}

/// `<hostname>-<8 hex>`: legible en los logs del coordinador y único aunque
/// corran varios workers en la misma máquina.
pub fn worker_id() -> WorkerId {
    let host = hostname::get()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string();
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    let host = if host.is_empty() { "worker".to_string() } else { host };
    format!("{}-{}", host, &suffix[..8])
}
