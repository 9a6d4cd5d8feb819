//! Round-driving retry coordinator.
//!
//! Drives `Init -> Dispatching -> Evaluating -> {RetryPending -> Dispatching |
//! Succeeded | Failed}` for one operation. All retry bookkeeping is mutated
//! only between rounds, after the round's fan-in barrier, so no locking is
//! needed around `RetryState`.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use crate::command::Command;
use crate::dispatch::{dispatch_round, RemoteInvoker};
use crate::error::{RetryableErrorKind, RouterError, ShardError};
use crate::snapshot::SnapshotContext;
use crate::topology::{ShardId, TargetSet};
use crate::RouterConfig;

/// Mutable per-operation retry bookkeeping, owned exclusively by the round
/// loop.
struct RetryState {
    round: u32,
    /// Targets still owed a success, in target-set order.
    outstanding: Vec<ShardId>,
    successes: BTreeMap<ShardId, Value>,
    /// Most recent retryable failure, surfaced as the cause when the budget
    /// runs out.
    last_retryable: Option<(ShardId, RetryableErrorKind)>,
}

impl RetryState {
    fn new(targets: &TargetSet) -> Self {
        Self {
            round: 0,
            outstanding: targets.shards().to_vec(),
            successes: BTreeMap::new(),
            last_retryable: None,
        }
    }
}

/// Runs dispatch rounds until every target succeeded, a fatal error surfaced,
/// or the retry budget is exhausted.
///
/// Returns the per-shard success payloads and the number of rounds used.
/// Already-succeeded targets are never re-invoked; the frozen snapshot
/// context is reused verbatim on every round.
pub(crate) async fn run_rounds(
    invoker: &Arc<dyn RemoteInvoker>,
    command: &Command,
    targets: &TargetSet,
    snapshot: &SnapshotContext,
    config: &RouterConfig,
) -> Result<(BTreeMap<ShardId, Value>, u32), RouterError> {
    let max_rounds = config.max_rounds.max(1);
    let mut state = RetryState::new(targets);

    loop {
        tracing::debug!(
            namespace = %command.namespace,
            round = state.round,
            outstanding = state.outstanding.len(),
            "dispatching round"
        );

        let mut outcomes = dispatch_round(
            invoker,
            &state.outstanding,
            command,
            snapshot,
            config.round_timeout,
        )
        .await;

        // Evaluation phase: single-threaded, after the fan-in barrier.
        let mut still_outstanding = Vec::new();
        for shard in std::mem::take(&mut state.outstanding) {
            // The dispatcher guarantees one outcome per requested target; a
            // missing entry is treated as a transient fault.
            let outcome = outcomes
                .remove(&shard)
                .unwrap_or(Err(ShardError::Retryable(RetryableErrorKind::TransientNetwork)));
            match outcome {
                Ok(payload) => {
                    state.successes.insert(shard, payload);
                }
                Err(ShardError::Retryable(kind)) => {
                    tracing::warn!(
                        shard = %shard,
                        round = state.round,
                        error = %kind,
                        "retryable shard failure"
                    );
                    state.last_retryable = Some((shard.clone(), kind));
                    still_outstanding.push(shard);
                }
                Err(ShardError::Fatal(kind)) => {
                    tracing::error!(
                        shard = %shard,
                        round = state.round,
                        error = %kind,
                        "fatal shard failure, aborting operation"
                    );
                    return Err(RouterError::FatalShard { shard, kind });
                }
            }
        }
        state.outstanding = still_outstanding;

        if state.outstanding.is_empty() {
            return Ok((state.successes, state.round + 1));
        }

        if state.round + 1 >= max_rounds {
            let (shard, cause) = state
                .last_retryable
                .take()
                .unwrap_or((state.outstanding[0].clone(), RetryableErrorKind::TransientNetwork));
            tracing::error!(
                shard = %shard,
                rounds = state.round + 1,
                cause = %cause,
                "retry budget exhausted"
            );
            return Err(RouterError::RetryBudgetExhausted {
                rounds: state.round + 1,
                shard,
                cause,
            });
        }

        state.round += 1;
    }
}
