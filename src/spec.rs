use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier for one executable specification unit.
///
/// A specification is either a whole feature file (`features/login.feature`)
/// or a single scenario addressed by line (`features/login.feature:12`).
/// The runner treats the value as opaque: it is produced by a finder or read
/// back from the rerun cache, and passed through to the worker command
/// unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpecId(String);

impl SpecId {
    /// Create an identifier from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the identifier, returning the inner string.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for SpecId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for SpecId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SpecId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}
