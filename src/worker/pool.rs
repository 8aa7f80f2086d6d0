//! The worker pool: bounded concurrent lifecycles over the shared queue.
//!
//! Each lifecycle loops through `pop → acquire slot → build arguments →
//! dispatch created → run subprocess → release slot → dispatch finished →
//! report result` until the queue is empty or a stop signal arrives. A stop
//! signal prevents further pops and spawns; in-flight workers finish and
//! their events and results are still delivered (graceful drain).

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use futures::future::join_all;
use serde::Deserialize;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::env::EnvironmentPool;
use crate::events::{EventBus, WorkerCreated, WorkerFinished};
use crate::queue::SpecQueue;
use crate::spec::SpecId;
use crate::task::ArgumentsBuilder;
use crate::worker::{WorkerExecutor, WorkerResult};

/// What to do with a specification when no environment slot frees up
/// within the acquisition timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotTimeoutPolicy {
    /// Put the specification back at the end of the queue, once. A second
    /// timeout for the same specification records it as failed.
    #[default]
    Requeue,
    /// Record the specification as failed immediately.
    Fail,
}

impl SlotTimeoutPolicy {
    pub fn as_label(&self) -> &'static str {
        match self {
            SlotTimeoutPolicy::Requeue => "requeue",
            SlotTimeoutPolicy::Fail => "fail",
        }
    }
}

/// Tuning knobs for the pool.
#[derive(Debug, Clone, Default)]
pub struct WorkerPoolConfig {
    /// Cap on concurrent lifecycles. Effective concurrency is the smaller
    /// of this and the environment pool capacity; `None` means the
    /// environment count alone decides.
    pub max_concurrency: Option<usize>,
    /// Slot-acquisition timeout handling.
    pub slot_timeout_policy: SlotTimeoutPolicy,
}

/// Handle for requesting a graceful stop of a running pool.
///
/// Clones share the same signal; a handle can be created first and wired
/// into a pool later (signal handlers register before any pool exists).
#[derive(Debug, Clone)]
pub struct StopHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl StopHandle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Signal the pool to stop: no new pops or spawns, in-flight workers
    /// run to completion.
    pub fn stop(&self) {
        self.tx.send_replace(true);
    }

    /// Whether a stop has been requested.
    pub fn is_stopped(&self) -> bool {
        *self.tx.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for StopHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixed-size pool of concurrent worker lifecycles.
pub struct WorkerPool {
    queue: Arc<SpecQueue>,
    environments: EnvironmentPool,
    builder: Arc<ArgumentsBuilder>,
    executor: Arc<dyn WorkerExecutor>,
    events: Arc<EventBus>,
    config: WorkerPoolConfig,
    stop: StopHandle,
}

impl WorkerPool {
    pub fn new(
        queue: Arc<SpecQueue>,
        environments: EnvironmentPool,
        builder: ArgumentsBuilder,
        executor: Arc<dyn WorkerExecutor>,
        events: Arc<EventBus>,
        config: WorkerPoolConfig,
        stop: StopHandle,
    ) -> Self {
        Self {
            queue,
            environments,
            builder: Arc::new(builder),
            executor,
            events,
            config,
            stop,
        }
    }

    /// Handle for stopping the pool from outside (signal handler, tests).
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Number of concurrent lifecycles the pool will run.
    pub fn concurrency(&self) -> usize {
        let cap = self.config.max_concurrency.unwrap_or(usize::MAX).max(1);
        self.environments.capacity().min(cap)
    }

    /// Run lifecycles until the queue drains or a stop is requested.
    ///
    /// Returns one result per executed (or slot-starved) specification.
    /// Specifications still queued after a stop are left in the queue.
    pub async fn run(&self) -> Vec<WorkerResult> {
        debug!(
            concurrency = self.concurrency(),
            queued = self.queue.len(),
            slot_timeout_policy = self.config.slot_timeout_policy.as_label(),
            "starting worker pool"
        );

        let results: Arc<Mutex<Vec<WorkerResult>>> = Arc::new(Mutex::new(Vec::new()));
        let requeued: Arc<Mutex<HashSet<SpecId>>> = Arc::new(Mutex::new(HashSet::new()));

        let handles: Vec<_> = (0..self.concurrency())
            .map(|worker| {
                let lifecycle = Lifecycle {
                    worker,
                    queue: Arc::clone(&self.queue),
                    environments: self.environments.clone(),
                    builder: Arc::clone(&self.builder),
                    executor: Arc::clone(&self.executor),
                    events: Arc::clone(&self.events),
                    policy: self.config.slot_timeout_policy,
                    stop_rx: self.stop.subscribe(),
                    results: Arc::clone(&results),
                    requeued: Arc::clone(&requeued),
                };
                tokio::spawn(lifecycle.run())
            })
            .collect();

        for outcome in join_all(handles).await {
            if let Err(err) = outcome {
                warn!("worker lifecycle panicked: {err}");
            }
        }

        let mut guard = results.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        std::mem::take(&mut *guard)
    }
}

/// Per-lifecycle view of the pool's shared state.
struct Lifecycle {
    worker: usize,
    queue: Arc<SpecQueue>,
    environments: EnvironmentPool,
    builder: Arc<ArgumentsBuilder>,
    executor: Arc<dyn WorkerExecutor>,
    events: Arc<EventBus>,
    policy: SlotTimeoutPolicy,
    stop_rx: watch::Receiver<bool>,
    results: Arc<Mutex<Vec<WorkerResult>>>,
    requeued: Arc<Mutex<HashSet<SpecId>>>,
}

impl Lifecycle {
    async fn run(self) {
        loop {
            if *self.stop_rx.borrow() {
                debug!(worker = self.worker, "stop requested; draining");
                break;
            }

            let Some(spec) = self.queue.try_pop() else {
                debug!(worker = self.worker, "queue empty; lifecycle done");
                break;
            };

            let lease = match self.environments.acquire().await {
                Ok(lease) => lease,
                Err(timeout) => {
                    self.handle_slot_timeout(spec, timeout.timeout);
                    continue;
                }
            };

            if *self.stop_rx.borrow() {
                // Stop arrived while waiting for a slot; do not spawn.
                self.queue.requeue(spec);
                break;
            }

            debug!(
                worker = self.worker,
                spec = %spec,
                slot = lease.index(),
                "starting worker"
            );

            let mut created = WorkerCreated::from_task(self.builder.build(&spec, &lease));
            self.events.dispatch_worker_created(&mut created);
            let task = created.into_task();

            let outcome = self.executor.execute(&task).await;
            drop(lease);

            let (exit_code, success) = match outcome {
                Ok(code) => (code, code == Some(0)),
                Err(err) => {
                    warn!(spec = %spec, "failed to launch worker: {err}");
                    (None, false)
                }
            };

            debug!(worker = self.worker, spec = %spec, ?exit_code, success, "worker finished");
            self.events.dispatch_worker_finished(&WorkerFinished {
                spec: spec.clone(),
                exit_code,
                success,
            });
            self.push_result(WorkerResult {
                spec,
                exit_code,
                success,
            });
        }
    }

    fn handle_slot_timeout(&self, spec: SpecId, timeout: std::time::Duration) {
        let first_timeout = self.policy == SlotTimeoutPolicy::Requeue && {
            let mut requeued = self
                .requeued
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            requeued.insert(spec.clone())
        };

        if first_timeout {
            warn!(spec = %spec, ?timeout, "no free environment slot; requeueing once");
            self.queue.requeue(spec);
        } else {
            warn!(spec = %spec, ?timeout, "no free environment slot; recording failure");
            // No worker process existed for this specification, so no
            // lifecycle events are dispatched; the failure is still
            // reported through the result sink.
            self.push_result(WorkerResult {
                spec,
                exit_code: None,
                success: false,
            });
        }
    }

    fn push_result(&self, result: WorkerResult) {
        self.results
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(result);
    }
}
