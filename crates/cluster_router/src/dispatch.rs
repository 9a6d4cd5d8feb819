//! Per-round concurrent dispatch to shard owners.
//!
//! One round issues every outstanding invocation concurrently and resolves
//! only when each requested target has exactly one outcome; targets still
//! pending when the round timeout fires are recorded as retryable timeouts
//! rather than dropped.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::task::JoinSet;

use crate::command::{Command, ReadConcernLevel};
use crate::error::{RetryableErrorKind, ShardError};
use crate::snapshot::SnapshotContext;
use crate::topology::ShardId;

/// Outcome of one remote invocation: a result payload or a tagged error.
pub type RawOutcome = Result<Value, ShardError>;

/// Remote-invocation collaborator.
///
/// Implementations own transport and connection pooling; the router only
/// requires that `invoke` honors cancellation when its future is dropped.
#[async_trait]
pub trait RemoteInvoker: Send + Sync + 'static {
    async fn invoke(&self, shard: &ShardId, request: Value, deadline: Duration) -> RawOutcome;
}

/// Builds the request document sent to every target of one round.
///
/// Clones the opaque command payload and injects the read-concern document:
/// the frozen `atClusterTime` for snapshot reads, or the caller's
/// `afterClusterTime` causal floor at other levels.
pub fn build_request(command: &Command, snapshot: &SnapshotContext) -> Value {
    let mut request = command.payload.clone();
    let Some(read_concern) = read_concern_document(command, snapshot) else {
        return request;
    };

    // Non-object payloads are forwarded untouched; the shard rejects them as
    // malformed if it cannot interpret them.
    if let Some(fields) = request.as_object_mut() {
        fields.insert("readConcern".to_string(), read_concern);
    }
    request
}

fn read_concern_document(command: &Command, snapshot: &SnapshotContext) -> Option<Value> {
    if let Some(at) = snapshot.at_cluster_time() {
        return Some(json!({"level": "snapshot", "atClusterTime": at}));
    }

    let after = command.read_concern.after_cluster_time;
    match command.read_concern.level {
        ReadConcernLevel::None => after.map(|floor| json!({"afterClusterTime": floor})),
        ReadConcernLevel::Local | ReadConcernLevel::Majority => {
            let level = match command.read_concern.level {
                ReadConcernLevel::Local => "local",
                _ => "majority",
            };
            let mut doc = json!({"level": level});
            if let Some(floor) = after {
                doc["afterClusterTime"] = serde_json::to_value(floor).unwrap_or(Value::Null);
            }
            Some(doc)
        }
        // Snapshot level always freezes a timestamp, handled above.
        ReadConcernLevel::Snapshot => Some(json!({"level": "snapshot"})),
    }
}

/// Issues one concurrent invocation per target and waits for the full fan-in.
///
/// Every target in `targets` maps to exactly one `RawOutcome` in the returned
/// table. Dropping the returned future (caller cancellation) aborts all
/// in-flight invocations.
pub async fn dispatch_round(
    invoker: &Arc<dyn RemoteInvoker>,
    targets: &[ShardId],
    command: &Command,
    snapshot: &SnapshotContext,
    round_timeout: Duration,
) -> BTreeMap<ShardId, RawOutcome> {
    let request = build_request(command, snapshot);

    let mut pending: BTreeSet<ShardId> = targets.iter().cloned().collect();
    let mut tasks = JoinSet::new();
    for shard in targets {
        let invoker = Arc::clone(invoker);
        let shard = shard.clone();
        let request = request.clone();
        tasks.spawn(async move {
            let outcome =
                match tokio::time::timeout(round_timeout, invoker.invoke(&shard, request, round_timeout))
                    .await
                {
                    Ok(outcome) => outcome,
                    Err(_) => Err(ShardError::Retryable(RetryableErrorKind::Timeout)),
                };
            (shard, outcome)
        });
    }

    let mut outcomes = BTreeMap::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((shard, outcome)) => {
                pending.remove(&shard);
                outcomes.insert(shard, outcome);
            }
            Err(err) => {
                tracing::warn!(error = ?err, "dispatch task failed to join");
            }
        }
    }

    // Tasks that never produced an attributable outcome (join failure) still
    // owe the round one entry per target.
    for shard in pending {
        outcomes.insert(
            shard,
            Err(ShardError::Retryable(RetryableErrorKind::TransientNetwork)),
        );
    }

    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{ClusterTime, Namespace, ReadConcern};
    use crate::snapshot::{select_snapshot_time, LogicalClock};

    struct FixedClock(ClusterTime);

    impl LogicalClock for FixedClock {
        fn now(&self) -> ClusterTime {
            self.0
        }
    }

    fn command(read_concern: ReadConcern) -> Command {
        Command::new(
            Namespace::new("testdb", "coll"),
            json!({"aggregate": "coll", "pipeline": []}),
        )
        .with_read_concern(read_concern)
    }

    #[test]
    fn snapshot_request_carries_frozen_at_cluster_time() {
        let command = command(ReadConcern::snapshot());
        let clock = FixedClock(ClusterTime::new(12, 4));
        let snapshot = select_snapshot_time(&command.read_concern, &clock);

        let request = build_request(&command, &snapshot);
        assert_eq!(
            request["readConcern"],
            json!({"level": "snapshot", "atClusterTime": {"t": 12, "i": 4}})
        );
        // The opaque payload survives alongside the injection.
        assert_eq!(request["aggregate"], json!("coll"));
    }

    #[test]
    fn default_read_concern_injects_nothing() {
        let command = command(ReadConcern::default());
        let request = build_request(&command, &SnapshotContext::none());
        assert!(request.get("readConcern").is_none());
    }

    #[test]
    fn causal_floor_forwarded_at_majority_level() {
        let mut read_concern = ReadConcern::level(ReadConcernLevel::Majority);
        read_concern.after_cluster_time = Some(ClusterTime::new(9, 1));
        let command = command(read_concern);

        let request = build_request(&command, &SnapshotContext::none());
        assert_eq!(
            request["readConcern"],
            json!({"level": "majority", "afterClusterTime": {"t": 9, "i": 1}})
        );
    }

    #[tokio::test]
    async fn slow_target_times_out_without_dropping_outcomes() {
        struct SlowShardB;

        #[async_trait]
        impl RemoteInvoker for SlowShardB {
            async fn invoke(&self, shard: &ShardId, _request: Value, _deadline: Duration) -> RawOutcome {
                if shard.as_str() == "shardB" {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                }
                Ok(json!({"from": shard.as_str()}))
            }
        }

        let invoker: Arc<dyn RemoteInvoker> = Arc::new(SlowShardB);
        let targets: Vec<ShardId> = vec!["shardA".into(), "shardB".into()];
        let command = command(ReadConcern::default());

        let outcomes = dispatch_round(
            &invoker,
            &targets,
            &command,
            &SnapshotContext::none(),
            Duration::from_millis(50),
        )
        .await;

        assert_eq!(outcomes.len(), 2);
        assert_eq!(
            outcomes[&ShardId::new("shardA")],
            Ok(json!({"from": "shardA"}))
        );
        assert_eq!(
            outcomes[&ShardId::new("shardB")],
            Err(ShardError::Retryable(RetryableErrorKind::Timeout))
        );
    }
}
