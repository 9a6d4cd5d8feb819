//! Routes one logical read/aggregate operation to the shard owners that must
//! participate, retries transient per-shard failures under a fixed budget,
//! and merges partial results into a single consistent answer.
//!
//! Targeting is computed once per operation; for snapshot reads one logical
//! timestamp is frozen before the first round and reused verbatim on every
//! retried request, so snapshot consistency survives partial failure. The
//! caller observes either fully merged results or a single terminal error,
//! never partial success.
//!
//! Transport, connection pooling, routing-metadata refresh and the logical
//! clock are injected collaborators ([`RemoteInvoker`], [`TopologyService`],
//! [`LogicalClock`]), which keeps the engine deterministic under test.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

mod aggregate;
mod command;
mod dispatch;
mod error;
mod retry;
mod snapshot;
mod topology;

pub use aggregate::AggregatedResult;
pub use command::{ClusterTime, Command, Namespace, ReadConcern, ReadConcernLevel};
pub use dispatch::{RawOutcome, RemoteInvoker};
pub use error::{
    FatalErrorKind, RetryableErrorKind, RouterError, RoutingUnavailable, ShardError,
};
pub use snapshot::{LogicalClock, SnapshotContext};
pub use topology::{ShardId, TargetSet, TopologyService};

/// Retry and timeout policy shared by all operations a router executes.
#[derive(Debug, Clone, Copy)]
pub struct RouterConfig {
    /// Maximum dispatch rounds per operation, including the first. Values
    /// below 1 are treated as 1.
    pub max_rounds: u32,
    /// Wall-clock budget for one round's fan-in; targets still pending when
    /// it fires are recorded as retryable timeouts.
    pub round_timeout: Duration,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            max_rounds: 10,
            round_timeout: Duration::from_secs(10),
        }
    }
}

/// Routing engine for one cluster. Cheap to clone; collaborators are shared.
#[derive(Clone)]
pub struct Router {
    topology: Arc<dyn TopologyService>,
    invoker: Arc<dyn RemoteInvoker>,
    clock: Arc<dyn LogicalClock>,
    config: RouterConfig,
}

impl Router {
    pub fn new(
        topology: Arc<dyn TopologyService>,
        invoker: Arc<dyn RemoteInvoker>,
        clock: Arc<dyn LogicalClock>,
        config: RouterConfig,
    ) -> Self {
        Self {
            topology,
            invoker,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Executes one operation to completion.
    ///
    /// Each call runs an independent operation and independently selects its
    /// own snapshot time unless the caller pinned one, so repeated calls with
    /// the same command are safe.
    pub async fn execute(&self, command: Command) -> Result<AggregatedResult, RouterError> {
        let targets = topology::resolve_targets(&command, self.topology.as_ref()).await?;
        let snapshot = snapshot::select_snapshot_time(&command.read_concern, self.clock.as_ref());

        let (successes, rounds) =
            retry::run_rounds(&self.invoker, &command, &targets, &snapshot, &self.config).await?;

        tracing::debug!(
            namespace = %command.namespace,
            shards = targets.len(),
            rounds,
            "operation succeeded"
        );
        Ok(aggregate::aggregate(successes, &targets, rounds))
    }

    /// Executes one operation, aborting with [`RouterError::Cancelled`] when
    /// `shutdown` resolves first.
    ///
    /// Cancellation drops the in-flight round, which aborts every per-target
    /// invocation; no partial success is returned.
    pub async fn execute_with_shutdown<F>(
        &self,
        command: Command,
        shutdown: F,
    ) -> Result<AggregatedResult, RouterError>
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            result = self.execute(command) => result,
            _ = shutdown => {
                tracing::warn!("operation cancelled by caller");
                Err(RouterError::Cancelled)
            }
        }
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("config", &self.config)
            .finish()
    }
}
