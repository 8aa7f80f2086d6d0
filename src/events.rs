//! Typed event registry for worker lifecycle notifications.
//!
//! The set of event kinds is closed: handlers are registered per kind at
//! startup and dispatched synchronously at fixed points in a run. For one
//! worker, `WorkerCreated` always precedes `WorkerFinished`; across
//! different workers event order is unspecified. A failing handler is
//! logged and swallowed — observers cannot abort a run.

use std::time::Duration;

use tracing::warn;

use crate::spec::SpecId;
use crate::task::WorkerTask;

/// Closed set of dispatchable event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    WorkerCreated,
    WorkerFinished,
    RunFinished,
}

/// Dispatched after a worker's arguments are built, before its process is
/// spawned.
///
/// This is the extension point for observers that need to audit or adjust a
/// worker invocation: the command vector and environment are mutable, the
/// specification identifier is not.
#[derive(Debug)]
pub struct WorkerCreated {
    spec: SpecId,
    /// Index of the environment slot the worker will run under.
    pub slot_index: usize,
    /// Argument vector of the pending invocation; handlers may rewrite it.
    pub command: Vec<String>,
    /// Environment variables of the pending invocation; handlers may add,
    /// change, or remove entries.
    pub env: Vec<(String, String)>,
}

impl WorkerCreated {
    pub fn from_task(task: WorkerTask) -> Self {
        Self {
            spec: task.spec,
            slot_index: task.slot_index,
            command: task.command,
            env: task.env,
        }
    }

    /// The specification the worker will execute. Immutable by design.
    pub fn spec(&self) -> &SpecId {
        &self.spec
    }

    /// Rebuild the worker task from the (possibly mutated) payload.
    pub fn into_task(self) -> WorkerTask {
        WorkerTask {
            spec: self.spec,
            slot_index: self.slot_index,
            command: self.command,
            env: self.env,
        }
    }
}

/// Dispatched after a worker process exits and its slot is released.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerFinished {
    /// The specification the worker executed.
    pub spec: SpecId,
    /// Exit code of the worker process; `None` when it was terminated by a
    /// signal or never launched.
    pub exit_code: Option<i32>,
    /// Whether the specification passed.
    pub success: bool,
}

/// Dispatched once at the end of a run, after aggregation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunFinished {
    /// Number of specifications actually executed.
    pub total: usize,
    /// Number of failed specifications.
    pub failed: usize,
    /// Wall-clock duration of the run.
    pub elapsed: Duration,
}

/// Result type for event handlers; an `Err` is logged and swallowed.
pub type HandlerResult = anyhow::Result<()>;

type CreatedHandler = Box<dyn Fn(&mut WorkerCreated) -> HandlerResult + Send + Sync>;
type FinishedHandler = Box<dyn Fn(&WorkerFinished) -> HandlerResult + Send + Sync>;
type RunFinishedHandler = Box<dyn Fn(&RunFinished) -> HandlerResult + Send + Sync>;

/// Registry mapping each event kind to its ordered handler list.
///
/// Registration happens once at startup; dispatch calls handlers in
/// registration order.
#[derive(Default)]
pub struct EventBus {
    created: Vec<CreatedHandler>,
    finished: Vec<FinishedHandler>,
    run_finished: Vec<RunFinishedHandler>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for `WorkerCreated`.
    pub fn on_worker_created<F>(&mut self, handler: F)
    where
        F: Fn(&mut WorkerCreated) -> HandlerResult + Send + Sync + 'static,
    {
        self.created.push(Box::new(handler));
    }

    /// Register a handler for `WorkerFinished`.
    pub fn on_worker_finished<F>(&mut self, handler: F)
    where
        F: Fn(&WorkerFinished) -> HandlerResult + Send + Sync + 'static,
    {
        self.finished.push(Box::new(handler));
    }

    /// Register a handler for `RunFinished`.
    pub fn on_run_finished<F>(&mut self, handler: F)
    where
        F: Fn(&RunFinished) -> HandlerResult + Send + Sync + 'static,
    {
        self.run_finished.push(Box::new(handler));
    }

    /// Number of handlers registered for a kind.
    pub fn handler_count(&self, kind: EventKind) -> usize {
        match kind {
            EventKind::WorkerCreated => self.created.len(),
            EventKind::WorkerFinished => self.finished.len(),
            EventKind::RunFinished => self.run_finished.len(),
        }
    }

    pub fn dispatch_worker_created(&self, event: &mut WorkerCreated) {
        for handler in &self.created {
            if let Err(err) = handler(event) {
                warn!(spec = %event.spec(), "worker-created handler failed: {err:#}");
            }
        }
    }

    pub fn dispatch_worker_finished(&self, event: &WorkerFinished) {
        for handler in &self.finished {
            if let Err(err) = handler(event) {
                warn!(spec = %event.spec, "worker-finished handler failed: {err:#}");
            }
        }
    }

    pub fn dispatch_run_finished(&self, event: &RunFinished) {
        for handler in &self.run_finished {
            if let Err(err) = handler(event) {
                warn!("run-finished handler failed: {err:#}");
            }
        }
    }
}
