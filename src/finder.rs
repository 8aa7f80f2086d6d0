//! Discovery of executable specifications from feature files.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::spec::SpecId;

/// Errors raised while discovering specifications.
#[derive(Error, Debug)]
pub enum FinderError {
    #[error("invalid feature search pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Result type for finder operations.
pub type FinderResult<T> = Result<T, FinderError>;

/// External collaborator yielding the specifications for a full run.
///
/// Called once at controller start in normal mode; rerun mode bypasses the
/// finder and reads the rerun cache instead.
pub trait SpecificationFinder: Send + Sync {
    fn find(&self) -> FinderResult<Vec<SpecId>>;
}

/// Finds feature files, one specification per `.feature` file.
///
/// Output is sorted by path so repeated runs enqueue work in the same
/// order.
#[derive(Debug, Clone)]
pub struct FeatureFinder {
    features_dir: PathBuf,
}

impl FeatureFinder {
    pub fn new(features_dir: impl Into<PathBuf>) -> Self {
        Self {
            features_dir: features_dir.into(),
        }
    }

    fn feature_files(&self) -> FinderResult<Vec<PathBuf>> {
        let pattern = format!("{}/**/*.feature", self.features_dir.display());
        let mut files = Vec::new();
        for entry in glob::glob(&pattern)? {
            match entry {
                Ok(path) => files.push(path),
                Err(err) => {
                    let path = err.path().to_path_buf();
                    return Err(FinderError::Io {
                        path,
                        source: err.into_error(),
                    });
                }
            }
        }
        files.sort();
        Ok(files)
    }
}

impl SpecificationFinder for FeatureFinder {
    fn find(&self) -> FinderResult<Vec<SpecId>> {
        Ok(self
            .feature_files()?
            .into_iter()
            .map(|path| SpecId::new(path.display().to_string()))
            .collect())
    }
}

/// Finds individual scenarios, one specification per `Scenario:` heading.
///
/// Identifiers take the `path:line` form the execution engine accepts for
/// running a single scenario. Feature files without any scenario heading
/// contribute nothing.
#[derive(Debug, Clone)]
pub struct ScenarioFinder {
    features_dir: PathBuf,
}

impl ScenarioFinder {
    pub fn new(features_dir: impl Into<PathBuf>) -> Self {
        Self {
            features_dir: features_dir.into(),
        }
    }

    fn scenarios_in(path: &Path) -> FinderResult<Vec<SpecId>> {
        let content = fs::read_to_string(path).map_err(|source| FinderError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(content
            .lines()
            .enumerate()
            .filter(|(_, line)| {
                let line = line.trim_start();
                line.starts_with("Scenario:") || line.starts_with("Scenario Outline:")
            })
            .map(|(index, _)| SpecId::new(format!("{}:{}", path.display(), index + 1)))
            .collect())
    }
}

impl SpecificationFinder for ScenarioFinder {
    fn find(&self) -> FinderResult<Vec<SpecId>> {
        let files = FeatureFinder::new(&self.features_dir).feature_files()?;
        let mut specs = Vec::new();
        for path in files {
            specs.extend(Self::scenarios_in(&path)?);
        }
        Ok(specs)
    }
}
