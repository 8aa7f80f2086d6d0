//! stampede — parallel runner for behavior-style test suites.
//!
//! Executes feature/scenario specifications across a bounded pool of worker
//! subprocesses, each under an isolated set of environment variables
//! (distinct cache directory, server port, database, PID file), and
//! persists failed specifications to a rerun cache so the next invocation
//! can re-execute only what failed.
//!
//! The core pieces, leaf to root:
//!
//! - [`queue::SpecQueue`] — ordered queue with exclusive concurrent pop
//! - [`env::EnvironmentPool`] — leased environment slots, one per worker
//! - [`task::ArgumentsBuilder`] — (spec, slot, template) → worker invocation
//! - [`worker::WorkerPool`] — bounded concurrent worker lifecycles
//! - [`rerun::RerunCache`] — durable failure record across runs
//! - [`runner::ParallelController`] — one full run, end to end

pub mod config;
pub mod env;
pub mod events;
pub mod finder;
pub mod queue;
pub mod rerun;
pub mod runner;
pub mod spec;
pub mod summary;
pub mod task;
pub mod worker;

pub use config::{ConfigError, Granularity, RunnerConfig, RunnerSettings};
pub use runner::{ParallelController, RunError, RunMode, RunSummary};
pub use spec::SpecId;
