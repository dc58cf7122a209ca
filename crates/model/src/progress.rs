use serde::{Deserialize, Serialize};
use std::fmt;

/// Durable checkpoint document, stored remotely as `{"current": n}`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressRecord {
    #[serde(default)]
    pub current: u64,
}

impl ProgressRecord {
    pub fn new(current: u64) -> Self {
        ProgressRecord { current }
    }
}

/// Opaque token identifying one stored revision of a progress record
/// (an HTTP entity tag, or a counter for local stores).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProgressVersion(pub String);

impl ProgressVersion {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProgressVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Precondition attached to a progress write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteCondition {
    /// Create the record; fails if one already exists.
    Absent,
    /// Replace the record only while it is still at this version.
    Matches(ProgressVersion),
    /// Overwrite whatever is stored.
    Any,
}

impl fmt::Display for WriteCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteCondition::Absent => f.write_str("no existing record"),
            WriteCondition::Matches(version) => write!(f, "version {version}"),
            WriteCondition::Any => f.write_str("any version"),
        }
    }
}

/// A progress record together with the revision it was read at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredProgress {
    pub record: ProgressRecord,
    pub version: Option<ProgressVersion>,
}

impl StoredProgress {
    /// Condition a writer that read this record must meet to replace it.
    /// Stores that report no version can only be overwritten blindly.
    pub fn write_condition(&self) -> WriteCondition {
        match &self.version {
            Some(version) => WriteCondition::Matches(version.clone()),
            None => WriteCondition::Any,
        }
    }
}
