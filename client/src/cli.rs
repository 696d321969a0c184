use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use common::{files::output_partition, DoneResponse, JobSnapshot};
use reqwest::Client;
use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

/// Igual que en el worker:
/// - En Docker: COORDINATOR_URL=http://coordinator:8080
/// - Local: default http://localhost:8080
fn coordinator_base_url() -> String {
    env::var("COORDINATOR_URL").unwrap_or_else(|_| "http://localhost:8080".to_string())
}

#[derive(Parser)]
#[command(name = "client")]
#[command(about = "CLI simple para consultar al coordinador de map/reduce")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Imprime true si el job terminó
    Done,
    /// Estado del job: fase y conteo de tareas
    Status,
    /// Espera a que el job termine
    Wait {
        /// Intervalo entre consultas, en milisegundos
        #[arg(long, default_value_t = 1000)]
        interval_ms: u64,
    },
    /// Junta las líneas de todos los mr-out-<p>, ordenadas
    Results {
        #[arg(long, default_value = ".")]
        work_dir: PathBuf,
    },
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    let client = Client::new();
    let base_url = coordinator_base_url();

    match cli.command {
        Commands::Done => {
            println!("{}", fetch_done(&client, &base_url).await?);
        }

        Commands::Status => {
            let url = format!("{}/api/v1/job", base_url);
            let resp = client.get(&url).send().await?;
            if !resp.status().is_success() {
                bail!("el coordinador respondió {}", resp.status());
            }
            let job: JobSnapshot = resp.json().await?;
            print_snapshot(&job);
        }

        Commands::Wait { interval_ms } => {
            let every = Duration::from_millis(interval_ms.max(1));
            while !fetch_done(&client, &base_url).await? {
                tokio::time::sleep(every).await;
            }
            println!("Job terminado.");
        }

        Commands::Results { work_dir } => {
            for line in collect_results(&work_dir)? {
                println!("{}", line);
            }
        }
    }

    Ok(())
}

async fn fetch_done(client: &Client, base_url: &str) -> Result<bool> {
    let url = format!("{}/api/v1/done", base_url);
    let resp = client
        .get(&url)
        .send()
        .await
        .with_context(|| format!("no se pudo hablar con el coordinador en {}", base_url))?;
    if !resp.status().is_success() {
        bail!("el coordinador respondió {}", resp.status());
    }
    let DoneResponse { done } = resp.json().await?;
    Ok(done)
}

fn print_snapshot(job: &JobSnapshot) {
    println!("Job:");
    println!("  fase: {:?}", job.phase);
    println!("  n_reduce: {}", job.n_reduce);
    println!(
        "  tareas: total={}, pendientes={} (bloqueadas={}), en progreso={}, completadas={}",
        job.total_tasks, job.pending, job.blocked, job.in_progress, job.completed
    );

    if job.total_tasks > 0 {
        let pct = (job.completed as f64 / job.total_tasks as f64) * 100.0;
        println!("  progreso: {:.1}%", pct);
    }

    println!("  submitted_at: {}", job.submitted_at);
    if let Some(ref done) = job.finished_at {
        println!("  finalizado: {}", done);
    }
}

/// Lee todos los `mr-out-<p>` de `work_dir` y devuelve sus líneas ordenadas.
fn collect_results(work_dir: &Path) -> Result<Vec<String>> {
    let mut lines = Vec::new();
    let entries =
        fs::read_dir(work_dir).with_context(|| format!("no se pudo listar {}", work_dir.display()))?;

    for entry in entries {
        let entry = entry?;
        let name = entry.file_name();
        let is_output = name.to_str().and_then(output_partition).is_some();
        if !is_output {
            continue;
        }
        let text = fs::read_to_string(entry.path())
            .with_context(|| format!("no se pudo leer {}", entry.path().display()))?;
        lines.extend(text.lines().map(str::to_string));
    }

    lines.sort();
    Ok(lines)
}
