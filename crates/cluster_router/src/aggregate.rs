//! Merges per-shard success payloads into the single result callers see.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::topology::{ShardId, TargetSet};

/// Final value of one routed operation.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedResult {
    /// Per-shard payloads concatenated in target-set order. Array payloads
    /// are flattened so a shard batch contributes its documents directly.
    pub documents: Vec<Value>,
    /// Dispatch rounds the operation used, including the final one.
    pub rounds: u32,
}

/// Concatenates shard payloads in the deterministic order established at
/// target resolution, independent of per-round arrival order.
pub fn aggregate(
    mut successes: BTreeMap<ShardId, Value>,
    order: &TargetSet,
    rounds: u32,
) -> AggregatedResult {
    let mut documents = Vec::new();
    for shard in order.iter() {
        match successes.remove(shard) {
            Some(Value::Array(batch)) => documents.extend(batch),
            Some(single) => documents.push(single),
            None => {}
        }
    }
    AggregatedResult { documents, rounds }
}
