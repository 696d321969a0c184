use anyhow::{bail, Context, Result};
use common::files::is_job_file;
use glob::glob;
use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::{debug, warn};

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_N_REDUCE: u32 = 10;
const DEFAULT_TASK_TIMEOUT_SECS: u64 = 10;
const DEFAULT_DONE_POLL_MS: u64 = 1000;
const DEFAULT_SHUTDOWN_GRACE_MS: u64 = 3000;

/// Configuración del coordinador, leída de variables de entorno.
/// Los archivos de entrada vienen como argumentos o, si no hay, de `INPUT_GLOB`.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub bind_addr: String,
    pub n_reduce: u32,
    pub task_timeout: Duration,
    pub work_dir: PathBuf,
    pub done_poll_interval: Duration,
    pub shutdown_grace: Duration,
    pub inputs: Vec<String>,
}

impl CoordinatorConfig {
    pub fn from_env(args: Vec<String>) -> Result<Self> {
        let inputs = if args.is_empty() {
            match env::var("INPUT_GLOB") {
                Ok(pattern) => expand_glob(&pattern)?,
                Err(_) => bail!("uso: coordinator <archivo>... (o definir INPUT_GLOB)"),
            }
        } else {
            args
        };

        Ok(Self {
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string()),
            n_reduce: parse_var("N_REDUCE", DEFAULT_N_REDUCE)?,
            task_timeout: Duration::from_secs(parse_var(
                "TASK_TIMEOUT_SECS",
                DEFAULT_TASK_TIMEOUT_SECS,
            )?),
            work_dir: env::var("WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(".")),
            done_poll_interval: Duration::from_millis(parse_var(
                "DONE_POLL_MS",
                DEFAULT_DONE_POLL_MS,
            )?),
            shutdown_grace: Duration::from_millis(parse_var(
                "SHUTDOWN_GRACE_MS",
                DEFAULT_SHUTDOWN_GRACE_MS,
            )?),
            inputs,
        })
    }
}

fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("valor inválido para {}: {:?}", name, raw)),
        Err(_) => Ok(default),
    }
}

/// Sólo archivos regulares, en orden.
pub fn expand_glob(pattern: &str) -> Result<Vec<String>> {
    let mut files = Vec::new();
    for entry in glob(pattern).with_context(|| format!("patrón inválido: {}", pattern))? {
        match entry {
            Ok(path) if path.is_file() => files.push(path.to_string_lossy().to_string()),
            Ok(_) => {}
            Err(e) => warn!("no se pudo leer una entrada del glob: {}", e),
        }
    }
    files.sort();
    Ok(files)
}

/// Borra los `mr-<n>` y `mr-out-<n>` que haya dejado una corrida anterior.
/// Las particiones se escriben en modo append, así que un resto viejo se
/// mezclaría con el job nuevo.
pub fn clean_work_dir(work_dir: &Path) -> Result<usize> {
    let entries = match fs::read_dir(work_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            fs::create_dir_all(work_dir)
                .with_context(|| format!("no se pudo crear {}", work_dir.display()))?;
            return Ok(0);
        }
        Err(e) => {
            return Err(e).with_context(|| format!("no se pudo listar {}", work_dir.display()))
        }
    };

    let mut removed = 0;
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if is_job_file(name) && entry.path().is_file() {
            fs::remove_file(entry.path())
                .with_context(|| format!("no se pudo borrar {}", entry.path().display()))?;
            debug!("borrado resto de una corrida anterior: {}", name);
            removed += 1;
        }
    }
    Ok(removed)
}
