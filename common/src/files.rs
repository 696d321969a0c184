//! Contrato de nombres en disco entre la fase map y la fase reduce.

use std::path::{Path, PathBuf};

use crate::task::TaskId;

pub fn intermediate_file_name(partition: u32) -> String {
    format!("mr-{}", partition)
}

pub fn output_file_name(partition: u32) -> String {
    format!("mr-out-{}", partition)
}

/// Id de la tarea reduce que consume la partición `partition`.
pub fn reduce_task_id(partition: u32) -> TaskId {
    intermediate_file_name(partition)
}

pub fn intermediate_path(work_dir: &Path, partition: u32) -> PathBuf {
    work_dir.join(intermediate_file_name(partition))
}

pub fn output_path(work_dir: &Path, partition: u32) -> PathBuf {
    work_dir.join(output_file_name(partition))
}

/// true si `name` es `mr-<n>` o `mr-out-<n>`.
pub fn is_job_file(name: &str) -> bool {
    let digits = name
        .strip_prefix("mr-out-")
        .or_else(|| name.strip_prefix("mr-"));

    match digits {
        Some(d) => !d.is_empty() && d.chars().all(|c| c.is_ascii_digit()),
        None => false,
    }
}

/// Partición de un archivo `mr-out-<n>`.
pub fn output_partition(name: &str) -> Option<u32> {
    name.strip_prefix("mr-out-")?.parse().ok()
}
