//! Worker pool: concurrent execution of queued specifications in
//! subprocesses, one isolated environment slot per running worker.

mod pool;
mod process;

pub use pool::{SlotTimeoutPolicy, StopHandle, WorkerPool, WorkerPoolConfig};
pub use process::{ProcessExecutor, WorkerExecutor};

use crate::spec::SpecId;

/// Outcome of one worker execution, fed into run aggregation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerResult {
    /// The specification the worker executed.
    pub spec: SpecId,
    /// Exit code of the worker process; `None` when it was terminated by a
    /// signal, never launched, or never got an environment slot.
    pub exit_code: Option<i32>,
    /// Whether the specification passed.
    pub success: bool,
}
