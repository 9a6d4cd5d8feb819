//! Shard targeting: turns one command into the set of shards that must
//! participate, using routing metadata supplied by an external collaborator.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::command::Command;
use crate::error::RoutingUnavailable;

/// Opaque identifier of a partition owner.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ShardId(String);

impl ShardId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ShardId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ShardId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Routing metadata collaborator.
///
/// `route_by_key` inspects an opaque filter document and answers with the one
/// shard that owns the pinned partition key, or `None` when no single shard
/// can be proven sufficient.
#[async_trait]
pub trait TopologyService: Send + Sync {
    /// All shards in the current topology snapshot.
    async fn current_shards(&self) -> Result<Vec<ShardId>, RoutingUnavailable>;

    /// Single owning shard for a filter that pins one partition key.
    async fn route_by_key(&self, filter: &Value) -> Result<Option<ShardId>, RoutingUnavailable>;
}

/// Ordered set of shards chosen for one operation.
///
/// Computed once per operation and never recomputed mid-retry; the order is
/// the deterministic order later used for response concatenation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetSet {
    shards: Vec<ShardId>,
}

impl TargetSet {
    /// Builds a set from an already-ordered shard sequence.
    pub(crate) fn from_ordered(shards: Vec<ShardId>) -> Self {
        Self { shards }
    }

    fn targeted(shard: ShardId) -> Self {
        Self {
            shards: vec![shard],
        }
    }

    fn scatter_gather(mut shards: Vec<ShardId>) -> Self {
        // Stable deterministic order independent of how the topology
        // collaborator happens to enumerate its members.
        shards.sort();
        shards.dedup();
        Self { shards }
    }

    pub fn is_targeted(&self) -> bool {
        self.shards.len() == 1
    }

    pub fn len(&self) -> usize {
        self.shards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.is_empty()
    }

    pub fn shards(&self) -> &[ShardId] {
        &self.shards
    }

    pub fn iter(&self) -> impl Iterator<Item = &ShardId> {
        self.shards.iter()
    }
}

/// Resolves the target set for `command`.
///
/// Targeted when the payload's filter pins a single partition key, otherwise
/// every shard in the current topology snapshot. Topology failures propagate
/// as `RoutingUnavailable` without any retry here.
pub async fn resolve_targets(
    command: &Command,
    topology: &dyn TopologyService,
) -> Result<TargetSet, RoutingUnavailable> {
    if let Some(shard) = topology.route_by_key(&command.payload).await? {
        tracing::debug!(namespace = %command.namespace, shard = %shard, "targeted operation");
        return Ok(TargetSet::targeted(shard));
    }

    let shards = topology.current_shards().await?;
    if shards.is_empty() {
        return Err(RoutingUnavailable::new("topology has no shards"));
    }
    tracing::debug!(
        namespace = %command.namespace,
        shard_count = shards.len(),
        "scatter-gather operation"
    );
    Ok(TargetSet::scatter_gather(shards))
}
