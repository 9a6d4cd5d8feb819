//! Shared deterministic fakes for router integration tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use cluster_router::{
    ClusterTime, LogicalClock, RawOutcome, RemoteInvoker, RoutingUnavailable, ShardId,
    TopologyService,
};

/// Clock returning one fixed value; lets tests pin the frozen snapshot time.
pub struct FakeClock(pub ClusterTime);

impl LogicalClock for FakeClock {
    fn now(&self) -> ClusterTime {
        self.0
    }
}

/// Topology with a fixed roster and an optional pinned route for every key.
pub struct StaticTopology {
    pub shards: Vec<ShardId>,
    /// When set, every filter routes to this one shard (targeted operation);
    /// when `None`, operations scatter to the full roster.
    pub pinned: Option<ShardId>,
}

impl StaticTopology {
    pub fn scatter(shards: &[&str]) -> Self {
        Self {
            shards: shards.iter().map(|s| ShardId::new(*s)).collect(),
            pinned: None,
        }
    }

    pub fn targeted(shards: &[&str], pinned: &str) -> Self {
        Self {
            shards: shards.iter().map(|s| ShardId::new(*s)).collect(),
            pinned: Some(ShardId::new(pinned)),
        }
    }
}

#[async_trait]
impl TopologyService for StaticTopology {
    async fn current_shards(&self) -> Result<Vec<ShardId>, RoutingUnavailable> {
        Ok(self.shards.clone())
    }

    async fn route_by_key(&self, _filter: &Value) -> Result<Option<ShardId>, RoutingUnavailable> {
        Ok(self.pinned.clone())
    }
}

/// Invoker that replays a per-shard script of outcomes, records every request
/// it was asked to send, and optionally delays individual shards to exercise
/// arrival-order independence.
#[derive(Default)]
pub struct RecordingInvoker {
    scripts: Mutex<HashMap<ShardId, Vec<RawOutcome>>>,
    delays: HashMap<ShardId, Duration>,
    requests: Mutex<Vec<(ShardId, Value)>>,
}

impl RecordingInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(mut self, shard: &str, outcomes: Vec<RawOutcome>) -> Self {
        self.scripts
            .get_mut()
            .expect("lock")
            .insert(ShardId::new(shard), outcomes);
        self
    }

    pub fn delay(mut self, shard: &str, delay: Duration) -> Self {
        self.delays.insert(ShardId::new(shard), delay);
        self
    }

    /// All requests issued to `shard`, in issue order.
    pub fn requests_for(&self, shard: &str) -> Vec<Value> {
        let shard = ShardId::new(shard);
        self.requests
            .lock()
            .expect("lock")
            .iter()
            .filter(|(s, _)| *s == shard)
            .map(|(_, request)| request.clone())
            .collect()
    }

    pub fn invocation_count(&self, shard: &str) -> usize {
        self.requests_for(shard).len()
    }

    pub fn total_invocations(&self) -> usize {
        self.requests.lock().expect("lock").len()
    }
}

#[async_trait]
impl RemoteInvoker for RecordingInvoker {
    async fn invoke(&self, shard: &ShardId, request: Value, _deadline: Duration) -> RawOutcome {
        self.requests
            .lock()
            .expect("lock")
            .push((shard.clone(), request));

        if let Some(delay) = self.delays.get(shard) {
            tokio::time::sleep(*delay).await;
        }

        let mut scripts = self.scripts.lock().expect("lock");
        let script = scripts
            .get_mut(shard)
            .unwrap_or_else(|| panic!("no script for shard {shard}"));
        assert!(!script.is_empty(), "script for shard {shard} exhausted");
        script.remove(0)
    }
}

/// Invoker whose calls never complete; used for cancellation tests.
pub struct StalledInvoker;

#[async_trait]
impl RemoteInvoker for StalledInvoker {
    async fn invoke(&self, _shard: &ShardId, _request: Value, _deadline: Duration) -> RawOutcome {
        std::future::pending().await
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_test_writer()
        .try_init();
}
