//! Subprocess execution of one worker task.

use std::io;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::task::WorkerTask;

/// Execution engine interface: runs one built worker invocation to
/// completion and reports its exit code.
///
/// The production implementation spawns a subprocess; tests substitute
/// in-memory implementations to script outcomes.
#[async_trait]
pub trait WorkerExecutor: Send + Sync {
    /// Execute the task and return the process exit code, or `None` when
    /// the process was terminated by a signal.
    async fn execute(&self, task: &WorkerTask) -> io::Result<Option<i32>>;
}

/// Spawns worker tasks as real subprocesses.
///
/// Arguments are passed argv-style, never through a shell. The slot's
/// environment variables are applied on top of the inherited parent
/// environment, slot values winning on collision. The working directory is
/// the configured base path, so relative specification identifiers resolve
/// the same way regardless of where the runner itself was invoked.
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    working_dir: PathBuf,
}

impl ProcessExecutor {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
        }
    }
}

#[async_trait]
impl WorkerExecutor for ProcessExecutor {
    async fn execute(&self, task: &WorkerTask) -> io::Result<Option<i32>> {
        let (program, args) = task.command.split_first().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "worker command is empty")
        })?;

        debug!(spec = %task.spec, slot = task.slot_index, command = ?task.command, "spawning worker");

        let output = Command::new(program)
            .args(args)
            .envs(task.env.iter().map(|(key, value)| (key, value)))
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .output()
            .await?;

        if !output.status.success() {
            warn!(
                spec = %task.spec,
                code = ?output.status.code(),
                "worker failed: {}",
                tail(&output.stderr)
            );
        }

        Ok(output.status.code())
    }
}

/// Last few lines of captured output, for failure logs.
fn tail(bytes: &[u8]) -> String {
    const MAX_LINES: usize = 5;
    let text = String::from_utf8_lossy(bytes);
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(MAX_LINES);
    lines[start..].join(" | ")
}
