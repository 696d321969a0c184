// coordinator/src/state.rs

use chrono::{DateTime, Utc};
use common::{
    files::is_job_file, CoordinatorError, Epoch, JobPhase, JobSnapshot, Task, TaskId,
    TaskState, WorkerId,
};
use std::{
    collections::{HashMap, HashSet, VecDeque},
    path::Path,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};
use tokio::sync::oneshot;

pub type SharedRegistry = Arc<Mutex<Registry>>;

/// Toma el lock del registro. Si un handler entró en pánico con el lock
/// tomado, el estado sigue siendo consistente (cada transición es atómica
/// bajo el lock), así que se recupera el guard.
pub fn lock_registry(registry: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Tarea asignada y todavía no reportada.
#[derive(Debug)]
pub struct InFlight {
    pub task: Task,
    pub epoch: Epoch,
    pub worker_id: Option<WorkerId>,
    // avisa al monitor que la tarea terminó
    retire: Option<oneshot::Sender<()>>,
}

/// Lo que devuelve `Registry::assign`: la tarea, su epoch y el receptor que
/// va a escuchar el monitor de fallos.
#[derive(Debug)]
pub struct Assignment {
    pub task: Task,
    pub epoch: Epoch,
    pub retired: oneshot::Receiver<()>,
}

/// Máquina de estados de las tareas del job.
///
/// Cada tarea está en exactamente una colección:
/// - `ready`: pendiente y asignable
/// - `blocked`: reduce pendiente, esperando que termine la fase map
/// - `in_progress`: asignada, esperando DoneTask o timeout
/// - `completed`
///
/// `ready` + `blocked` forman el conjunto "pendiente".
#[derive(Debug)]
pub struct Registry {
    n_reduce: u32,
    total: usize,

    // FIFO: los reencolados van al final
    ready: VecDeque<Task>,
    blocked: Vec<Task>,
    in_progress: HashMap<TaskId, InFlight>,
    completed: Vec<Task>,

    next_epoch: Epoch,

    submitted_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
}

impl Registry {
    /// Crea una tarea map por archivo y `n_reduce` tareas reduce bloqueadas.
    pub fn new(inputs: &[String], n_reduce: u32) -> Result<Self, CoordinatorError> {
        if n_reduce == 0 {
            return Err(CoordinatorError::InvalidJob(
                "n_reduce tiene que ser al menos 1".to_string(),
            ));
        }
        if inputs.is_empty() {
            return Err(CoordinatorError::InvalidJob(
                "no hay archivos de entrada".to_string(),
            ));
        }

        let mut seen: HashSet<&str> = HashSet::new();

        for input in inputs {
            // mr-<n> / mr-out-<n> son nombres del job: chocarían con el id de
            // una reduce o se borrarían como restos de una corrida anterior
            let is_reserved = Path::new(input)
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(is_job_file);
            if is_reserved {
                return Err(CoordinatorError::InvalidJob(format!(
                    "el archivo de entrada {:?} usa un nombre reservado para las particiones",
                    input
                )));
            }
            if !seen.insert(input.as_str()) {
                return Err(CoordinatorError::InvalidJob(format!(
                    "archivo de entrada repetido: {:?}",
                    input
                )));
            }
        }

        let ready: VecDeque<Task> = inputs.iter().map(Task::map).collect();
        let blocked: Vec<Task> = (0..n_reduce).map(Task::reduce).collect();

        Ok(Self {
            n_reduce,
            total: ready.len() + blocked.len(),
            ready,
            blocked,
            in_progress: HashMap::new(),
            completed: Vec::new(),
            next_epoch: 1,
            submitted_at: Utc::now(),
            finished_at: None,
        })
    }

    pub fn n_reduce(&self) -> u32 {
        self.n_reduce
    }

    /// GetTask: saca la primera tarea lista y la pasa a en progreso con un
    /// epoch nuevo.
    pub fn assign(&mut self, worker_id: Option<WorkerId>) -> Result<Assignment, CoordinatorError> {
        let mut task = self
            .ready
            .pop_front()
            .ok_or(CoordinatorError::NoTaskAvailable)?;

        let epoch = self.next_epoch;
        self.next_epoch += 1;

        task.state = TaskState::InProgress;
        task.assigned_at = Some(Utc::now());

        let (tx, rx) = oneshot::channel();
        self.in_progress.insert(
            task.id.clone(),
            InFlight {
                task: task.clone(),
                epoch,
                worker_id,
                retire: Some(tx),
            },
        );

        Ok(Assignment {
            task,
            epoch,
            retired: rx,
        })
    }

    /// DoneTask: sólo acepta el reporte si la asignación en progreso es la
    /// del mismo epoch. Un reporte tardío de una asignación vencida no
    /// puede cerrar la asignación nueva.
    pub fn complete(&mut self, task_id: &str, epoch: Epoch) -> Result<Task, CoordinatorError> {
        if !self.is_current(task_id, epoch) {
            return Err(no_such_task(task_id, epoch));
        }
        let Some(InFlight {
            mut task, retire, ..
        }) = self.in_progress.remove(task_id)
        else {
            return Err(no_such_task(task_id, epoch));
        };

        if let Some(tx) = retire {
            // best effort: si el monitor ya no escucha, da igual
            let _ = tx.send(());
        }

        task.state = TaskState::Completed;
        self.completed.push(task.clone());

        if task.is_map() {
            self.promote_reduce_if_map_drained();
        }

        if self.is_done() && self.finished_at.is_none() {
            self.finished_at = Some(Utc::now());
        }

        Ok(task)
    }

    /// Timeout del monitor: vuelve la tarea a pendientes si la asignación
    /// `epoch` sigue en progreso. Devuelve si hubo reencolado.
    pub fn expire(&mut self, task_id: &str, epoch: Epoch) -> bool {
        self.requeue(task_id, epoch)
    }

    /// Falló la carga de la entrada en GetTask: la tarea no se pierde,
    /// vuelve a pendientes.
    pub fn release(&mut self, task_id: &str, epoch: Epoch) -> bool {
        self.requeue(task_id, epoch)
    }

    fn is_current(&self, task_id: &str, epoch: Epoch) -> bool {
        self.in_progress
            .get(task_id)
            .is_some_and(|inflight| inflight.epoch == epoch)
    }

    fn requeue(&mut self, task_id: &str, epoch: Epoch) -> bool {
        if !self.is_current(task_id, epoch) {
            return false;
        }
        let Some(InFlight { mut task, .. }) = self.in_progress.remove(task_id) else {
            return false;
        };

        task.state = TaskState::Idle;
        task.assigned_at = None;
        self.ready.push_back(task);
        true
    }

    fn map_outstanding(&self) -> usize {
        self.ready.iter().filter(|t| t.is_map()).count()
            + self.in_progress.values().filter(|f| f.task.is_map()).count()
    }

    fn promote_reduce_if_map_drained(&mut self) {
        if self.blocked.is_empty() || self.map_outstanding() > 0 {
            return;
        }
        self.ready.extend(self.blocked.drain(..));
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn pending_len(&self) -> usize {
        self.ready.len() + self.blocked.len()
    }

    pub fn in_progress_len(&self) -> usize {
        self.in_progress.len()
    }

    pub fn completed_len(&self) -> usize {
        self.completed.len()
    }

    /// Done(): no queda nada pendiente ni en progreso.
    pub fn is_done(&self) -> bool {
        self.pending_len() == 0 && self.in_progress.is_empty()
    }

    pub fn phase(&self) -> JobPhase {
        if self.is_done() {
            JobPhase::Done
        } else if self.map_outstanding() > 0 {
            JobPhase::Map
        } else {
            JobPhase::Reduce
        }
    }

    pub fn in_flight(&self, task_id: &str) -> Option<&InFlight> {
        self.in_progress.get(task_id)
    }

    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            phase: self.phase(),
            n_reduce: self.n_reduce,
            total_tasks: self.total,
            pending: self.pending_len(),
            blocked: self.blocked.len(),
            in_progress: self.in_progress.len(),
            completed: self.completed.len(),
            submitted_at: self.submitted_at,
            finished_at: self.finished_at,
        }
    }
}

fn no_such_task(task_id: &str, epoch: Epoch) -> CoordinatorError {
    CoordinatorError::NoSuchTask {
        task_id: task_id.to_string(),
        epoch,
    }
}
