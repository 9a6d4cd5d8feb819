//! Snapshot-time selection.
//!
//! For snapshot reads the router freezes one logical timestamp before the
//! first dispatch round and reuses it verbatim on every retried request.
//! Freezing the value in an immutable context object, rather than re-sampling
//! the clock, is what lets snapshot consistency survive transient per-shard
//! failures.

use crate::command::{ClusterTime, ReadConcern, ReadConcernLevel};

/// Cluster-wide logical clock collaborator. Monotonic; injectable so tests
/// can supply deterministic values.
pub trait LogicalClock: Send + Sync {
    fn now(&self) -> ClusterTime;
}

/// Frozen snapshot timestamp for one operation.
///
/// Created once before the first dispatch round, immutable thereafter. Every
/// remote request issued for the operation, across all retry rounds, carries
/// the identical timestamp when one is frozen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotContext {
    at_cluster_time: Option<ClusterTime>,
}

impl SnapshotContext {
    /// Context for non-snapshot reads; each shard applies its own
    /// point-in-time semantics at the requested level.
    pub const fn none() -> Self {
        Self {
            at_cluster_time: None,
        }
    }

    pub fn at_cluster_time(&self) -> Option<ClusterTime> {
        self.at_cluster_time
    }
}

/// Selects the snapshot timestamp for `read_concern`.
///
/// A caller-pinned `at_cluster_time` is used verbatim. Otherwise the clock is
/// sampled exactly once, here, and clamped up to `after_cluster_time` when the
/// caller supplied a lower bound.
pub fn select_snapshot_time(read_concern: &ReadConcern, clock: &dyn LogicalClock) -> SnapshotContext {
    if read_concern.level != ReadConcernLevel::Snapshot {
        return SnapshotContext::none();
    }

    let selected = match read_concern.at_cluster_time {
        Some(pinned) => pinned,
        None => {
            let now = clock.now();
            match read_concern.after_cluster_time {
                Some(floor) if now < floor => floor,
                _ => now,
            }
        }
    };

    tracing::debug!(at_cluster_time = %selected, "froze snapshot read timestamp");
    SnapshotContext {
        at_cluster_time: Some(selected),
    }
}
