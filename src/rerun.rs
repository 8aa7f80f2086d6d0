//! Durable cache of failed specifications for rerun mode.
//!
//! After a run the controller persists every failed identifier to a JSON
//! file; a later `--rerun` invocation reads that file back and executes only
//! those specifications. Identifiers are stored relative to the configured
//! base path, so the cache stays valid when the invoking shell's working
//! directory changes between runs — workers are spawned with the base path
//! as their working directory, which keeps relative identifiers meaningful.
//!
//! Precondition: one controller per cache path at a time. Concurrent
//! processes writing the same cache file are not coordinated.

use std::collections::BTreeSet;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::spec::SpecId;

/// Default cache location in the system temp directory.
pub fn default_cache_path() -> PathBuf {
    std::env::temp_dir().join("stampede_rerun_cache.json")
}

/// On-disk shape of the rerun cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RerunRecord {
    /// Base path the failed identifiers are relative to.
    pub base_path: PathBuf,
    /// Failed specification identifiers, sorted for diffability.
    pub failed: Vec<String>,
}

/// Errors raised by cache access.
///
/// A missing file is not an error — `load` treats it as an empty record. A
/// file that exists but does not parse is corruption and fails hard.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("failed to access rerun cache {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("rerun cache {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Failure bookkeeping for one run, backed by a JSON file.
///
/// `record` collects failures while workers finish (callers may be
/// concurrent); `persist` replaces the previous file atomically so a crash
/// mid-write never leaves a half-written cache behind.
#[derive(Debug)]
pub struct RerunCache {
    path: PathBuf,
    base_path: PathBuf,
    failed: Mutex<BTreeSet<String>>,
}

impl RerunCache {
    /// Create a cache handle for the given file path and identifier base.
    pub fn new(path: impl Into<PathBuf>, base_path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            base_path: base_path.into(),
            failed: Mutex::new(BTreeSet::new()),
        }
    }

    /// The cache file location.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the previous run's failed identifiers.
    ///
    /// Returns an empty list when the file does not exist yet; returns
    /// `CacheError::Corrupt` when the file exists but is not a valid
    /// record.
    pub fn load(&self) -> CacheResult<Vec<SpecId>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(CacheError::Io {
                    path: self.path.clone(),
                    source: err,
                })
            }
        };

        let record: RerunRecord =
            serde_json::from_str(&content).map_err(|err| CacheError::Corrupt {
                path: self.path.clone(),
                source: err,
            })?;

        Ok(record.failed.into_iter().map(SpecId::new).collect())
    }

    /// Add a failed specification to the in-memory record.
    pub fn record(&self, spec: &SpecId) {
        let relative = self.relativize(spec.as_str());
        self.lock().insert(relative);
    }

    /// Number of failures recorded so far.
    pub fn recorded(&self) -> usize {
        self.lock().len()
    }

    /// Write the current record to disk, replacing any previous content.
    ///
    /// Writes to a sibling temp file, fsyncs, then renames over the target.
    pub fn persist(&self) -> CacheResult<()> {
        let record = RerunRecord {
            base_path: self.base_path.clone(),
            failed: self.lock().iter().cloned().collect(),
        };
        let json = serde_json::to_string_pretty(&record).map_err(|err| CacheError::Corrupt {
            path: self.path.clone(),
            source: err,
        })?;

        let io_err = |source| CacheError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(io_err)?;
            }
        }

        let temp_path = self.path.with_extension("json.tmp");
        {
            let mut file = fs::File::create(&temp_path).map_err(io_err)?;
            file.write_all(json.as_bytes()).map_err(io_err)?;
            file.sync_all().map_err(io_err)?;
        }
        fs::rename(&temp_path, &self.path).map_err(io_err)?;

        Ok(())
    }

    fn relativize(&self, id: &str) -> String {
        Path::new(id)
            .strip_prefix(&self.base_path)
            .map(|rel| rel.display().to_string())
            .unwrap_or_else(|_| id.to_string())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeSet<String>> {
        self.failed.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
