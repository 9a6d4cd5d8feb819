//! Logical read/aggregate commands and their read-concern descriptors.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Cluster-wide comparable logical timestamp.
///
/// Ordered first by seconds, then by the increment that disambiguates events
/// within the same second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ClusterTime {
    /// Seconds component of the logical clock.
    #[serde(rename = "t")]
    pub seconds: u32,
    /// Tie-breaking increment within one second.
    #[serde(rename = "i")]
    pub increment: u32,
}

impl ClusterTime {
    pub const fn new(seconds: u32, increment: u32) -> Self {
        Self { seconds, increment }
    }
}

impl std::fmt::Display for ClusterTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.seconds, self.increment)
    }
}

/// Fully qualified collection namespace (`db.coll`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Namespace {
    pub db: String,
    pub coll: String,
}

impl Namespace {
    pub fn new(db: impl Into<String>, coll: impl Into<String>) -> Self {
        Self {
            db: db.into(),
            coll: coll.into(),
        }
    }
}

impl std::fmt::Display for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.db, self.coll)
    }
}

/// Consistency level requested for a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadConcernLevel {
    /// No explicit level; shards apply their defaults.
    None,
    Local,
    Majority,
    /// All participating shards read at one identical logical timestamp.
    Snapshot,
}

/// Read-concern descriptor attached to a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadConcern {
    pub level: ReadConcernLevel,
    /// Caller-pinned snapshot timestamp; used verbatim when present.
    pub at_cluster_time: Option<ClusterTime>,
    /// Lower bound for the selected snapshot timestamp, and a causal-consistency
    /// floor forwarded to shards at non-snapshot levels.
    pub after_cluster_time: Option<ClusterTime>,
}

impl ReadConcern {
    pub fn level(level: ReadConcernLevel) -> Self {
        Self {
            level,
            at_cluster_time: None,
            after_cluster_time: None,
        }
    }

    pub fn snapshot() -> Self {
        Self::level(ReadConcernLevel::Snapshot)
    }

    pub fn snapshot_at(at_cluster_time: ClusterTime) -> Self {
        Self {
            level: ReadConcernLevel::Snapshot,
            at_cluster_time: Some(at_cluster_time),
            after_cluster_time: None,
        }
    }
}

impl Default for ReadConcern {
    fn default() -> Self {
        Self::level(ReadConcernLevel::None)
    }
}

/// One logical operation issued by a caller.
///
/// Immutable for the lifetime of a routing attempt: the payload document is
/// opaque to the router apart from the filter shape used for targeting.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub namespace: Namespace,
    /// Opaque operation document (filter, pipeline, ...).
    pub payload: Value,
    pub read_concern: ReadConcern,
}

impl Command {
    pub fn new(namespace: Namespace, payload: Value) -> Self {
        Self {
            namespace,
            payload,
            read_concern: ReadConcern::default(),
        }
    }

    pub fn with_read_concern(mut self, read_concern: ReadConcern) -> Self {
        self.read_concern = read_concern;
        self
    }
}
