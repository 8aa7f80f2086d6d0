//! End-to-end orchestration of one parallel run.
//!
//! The controller owns the full pipeline explicitly: select specifications
//! (finder or rerun cache), build the queue, run the worker pool, aggregate
//! results, persist the rerun cache, dispatch the run-finished event, and
//! hand the caller a summary to derive the process exit status from.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::{Granularity, RunnerConfig};
use crate::env::EnvironmentPool;
use crate::events::{EventBus, RunFinished};
use crate::finder::{FeatureFinder, FinderError, ScenarioFinder, SpecificationFinder};
use crate::queue::SpecQueue;
use crate::rerun::{CacheError, RerunCache};
use crate::spec::SpecId;
use crate::task::ArgumentsBuilder;
use crate::worker::{
    ProcessExecutor, StopHandle, WorkerExecutor, WorkerPool, WorkerPoolConfig,
};

/// How the initial specification set is selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    /// Everything the finder yields.
    #[default]
    Full,
    /// Only the failures recorded by the previous run.
    Rerun,
}

/// Fatal errors aborting a run before any worker spawns.
#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Finder(#[from] FinderError),

    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Aggregated outcome of one run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Mode the run was started in.
    pub mode: RunMode,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// Wall-clock duration of the run.
    pub elapsed: Duration,
    /// Number of specifications executed.
    pub total: usize,
    /// Identifiers of failed specifications.
    pub failed_specs: Vec<SpecId>,
}

impl RunSummary {
    /// Number of failed specifications.
    pub fn failed(&self) -> usize {
        self.failed_specs.len()
    }

    pub fn all_passed(&self) -> bool {
        self.failed_specs.is_empty()
    }

    /// Process exit status for this run: zero iff zero failures.
    pub fn exit_code(&self) -> i32 {
        if self.all_passed() {
            0
        } else {
            1
        }
    }

    /// Whether a rerun was requested but the cache had nothing to run.
    pub fn nothing_to_rerun(&self) -> bool {
        self.mode == RunMode::Rerun && self.total == 0
    }
}

/// Orchestrates one full run against explicitly injected collaborators.
///
/// Precondition: one controller per rerun-cache path at a time; concurrent
/// controllers sharing a cache file are not coordinated.
pub struct ParallelController {
    config: RunnerConfig,
    finder: Box<dyn SpecificationFinder>,
    executor: Arc<dyn WorkerExecutor>,
    events: Arc<EventBus>,
    cache: RerunCache,
    stop: StopHandle,
}

impl ParallelController {
    /// Wire a controller from explicit collaborators.
    pub fn new(
        config: RunnerConfig,
        finder: Box<dyn SpecificationFinder>,
        executor: Arc<dyn WorkerExecutor>,
        events: EventBus,
    ) -> Self {
        let cache = RerunCache::new(&config.rerun_cache, &config.base_dir);
        Self {
            config,
            finder,
            executor,
            events: Arc::new(events),
            cache,
            stop: StopHandle::new(),
        }
    }

    /// Wire the production collaborators implied by the configuration: a
    /// finder matching the configured granularity and a subprocess
    /// executor rooted at the base directory.
    pub fn from_config(config: RunnerConfig, events: EventBus) -> Self {
        let finder: Box<dyn SpecificationFinder> = match config.granularity {
            Granularity::Feature => Box::new(FeatureFinder::new(&config.features_dir)),
            Granularity::Scenario => Box::new(ScenarioFinder::new(&config.features_dir)),
        };
        let executor = Arc::new(ProcessExecutor::new(&config.base_dir));
        Self::new(config, finder, executor, events)
    }

    /// Handle for requesting a graceful stop; safe to wire into a signal
    /// handler before the run starts.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Execute one run to completion.
    pub async fn run(&self, mode: RunMode) -> Result<RunSummary, RunError> {
        let started_at = Utc::now();
        let timer = Instant::now();

        let specs = match mode {
            RunMode::Full => self.finder.find()?,
            RunMode::Rerun => self.cache.load()?,
        };

        if mode == RunMode::Rerun && specs.is_empty() {
            info!("rerun cache is empty; nothing to rerun");
            let summary = RunSummary {
                mode,
                started_at,
                elapsed: timer.elapsed(),
                total: 0,
                failed_specs: Vec::new(),
            };
            self.events.dispatch_run_finished(&RunFinished {
                total: 0,
                failed: 0,
                elapsed: summary.elapsed,
            });
            return Ok(summary);
        }

        info!(total = specs.len(), mode = ?mode, "starting parallel run");

        let queue = Arc::new(SpecQueue::from_specs(specs));
        let environments = EnvironmentPool::from_environments(
            self.config.environments.clone(),
            self.config.slot_timeout,
        );
        let pool = WorkerPool::new(
            queue,
            environments,
            ArgumentsBuilder::new(self.config.template.clone()),
            Arc::clone(&self.executor),
            Arc::clone(&self.events),
            WorkerPoolConfig {
                max_concurrency: self.config.max_concurrency,
                slot_timeout_policy: self.config.slot_timeout_policy,
            },
            self.stop.clone(),
        );

        let results = pool.run().await;

        let failed_specs: Vec<SpecId> = results
            .iter()
            .filter(|result| !result.success)
            .map(|result| result.spec.clone())
            .collect();
        for spec in &failed_specs {
            self.cache.record(spec);
        }
        // The cache is an optimization for future runs; failing to write it
        // must not change this run's outcome.
        if let Err(err) = self.cache.persist() {
            warn!("failed to persist rerun cache: {err}");
        }

        let elapsed = timer.elapsed();
        self.events.dispatch_run_finished(&RunFinished {
            total: results.len(),
            failed: failed_specs.len(),
            elapsed,
        });
        info!(
            total = results.len(),
            failed = failed_specs.len(),
            ?elapsed,
            "run finished"
        );

        Ok(RunSummary {
            mode,
            started_at,
            elapsed,
            total: results.len(),
            failed_specs,
        })
    }
}
