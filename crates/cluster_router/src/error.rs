//! Error taxonomy for routed operations.
//!
//! Retryable and fatal kinds are closed enums so adding a new shard error
//! forces an explicit retry-policy decision in the coordinator's match.

use thiserror::Error;

use crate::topology::ShardId;

/// Per-shard errors the coordinator retries within its round budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RetryableErrorKind {
    /// Shard observed a newer routing table version than the request carried.
    #[error("stale routing version")]
    StaleRoutingVersion,
    /// Requested snapshot timestamp is not yet available on the shard.
    #[error("snapshot unavailable")]
    SnapshotUnavailable,
    /// Connection reset, broken stream, or similar transient transport fault.
    #[error("transient network failure")]
    TransientNetwork,
    /// Shard did not answer within the round timeout.
    #[error("timed out")]
    Timeout,
}

/// Per-shard errors that abort the whole operation immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FatalErrorKind {
    #[error("unauthorized")]
    Unauthorized,
    #[error("malformed request")]
    MalformedRequest,
    #[error("unrecoverable shard failure")]
    Unrecoverable,
}

/// Tagged outcome error for one remote invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ShardError {
    #[error("retryable: {0}")]
    Retryable(RetryableErrorKind),
    #[error("fatal: {0}")]
    Fatal(FatalErrorKind),
}

/// Topology collaborator failure. Never retried by the router; refreshing
/// routing metadata is the collaborator's concern.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("routing unavailable: {reason}")]
pub struct RoutingUnavailable {
    pub reason: String,
}

impl RoutingUnavailable {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Terminal errors surfaced to the caller of `Router::execute`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouterError {
    #[error(transparent)]
    RoutingUnavailable(#[from] RoutingUnavailable),

    /// A shard answered with a non-retryable error; other shards' results are
    /// discarded.
    #[error("shard {shard} failed: {kind}")]
    FatalShard { shard: ShardId, kind: FatalErrorKind },

    /// Outstanding targets remained after the final round. Carries the most
    /// recent retryable failure so callers see the real cause rather than a
    /// generic exhaustion notice.
    #[error("retry budget exhausted after {rounds} rounds; last failure on shard {shard}: {cause}")]
    RetryBudgetExhausted {
        rounds: u32,
        shard: ShardId,
        cause: RetryableErrorKind,
    },

    /// The enclosing operation was cancelled while a round was in flight.
    #[error("operation cancelled")]
    Cancelled,
}
