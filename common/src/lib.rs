pub mod apps;
pub mod engine;
pub mod error;
pub mod files;
pub mod job;
pub mod rpc;
pub mod task;
pub mod wordcount;

pub use apps::MapReduceApp;
pub use engine::{KeyValue, TaskOutcome};
pub use error::{CoordinatorError, EngineError};
pub use job::{JobPhase, JobSnapshot};
pub use rpc::{
    DoneResponse, ErrorBody, ErrorCode, TaskAssignment, TaskAssignmentRequest,
    TaskCompleteRequest, TaskCompleteResponse, WorkerId,
};
pub use task::{Epoch, Operation, Task, TaskId, TaskState};
