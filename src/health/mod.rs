//! Dependency-health aggregation.
//!
//! # Purpose and responsibility
//! Runs the mandatory dependency checks behind readiness and the detailed
//! status endpoint, and enriches the detailed snapshot with optional metric
//! blocks fetched from a configured provider.
//!
//! # Key invariants and assumptions
//! - Overall status is `ok` iff every mandatory check passes; an optional
//!   metric failure only omits that block and never flips status.
//! - Metric fetches are independently fault-isolated: one failing or slow
//!   category must not fail or block the others.
//! - The itemized-checks capability is declared at construction time; there
//!   is no runtime type inspection in the handlers.
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HealthError {
    #[error("{0}")]
    Check(String),
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

pub type HealthResult<T> = Result<T, HealthError>;

/// One mandatory dependency check (broker reachability, key-value store
/// reachability, and so on).
#[async_trait]
pub trait HealthChecker: Send + Sync {
    fn name(&self) -> &str;
    async fn check(&self) -> HealthResult<()>;
}

/// Optional capability: a checker that can also report named sub-checks for
/// the detailed snapshot. Registered separately at construction.
#[async_trait]
pub trait ItemizedChecker: HealthChecker {
    async fn items(&self) -> Vec<(String, HealthResult<()>)>;
}

/// Optional metrics collaborator, one accessor per metric category. Each call
/// is best-effort; the aggregator absorbs failures per category.
#[async_trait]
pub trait MetricsProvider: Send + Sync {
    async fn broker_info(&self) -> anyhow::Result<BrokerInfo>;
    async fn stream_stats(&self) -> anyhow::Result<StreamStats>;
    async fn kv_bucket_stats(&self) -> anyhow::Result<KvBucketStats>;
    async fn job_queue_stats(&self) -> anyhow::Result<JobQueueStats>;
    async fn consumer_stats(&self) -> anyhow::Result<ConsumerStats>;
    async fn fleet_stats(&self) -> anyhow::Result<FleetStats>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerInfo {
    pub server_name: String,
    pub version: String,
    pub connections: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamStats {
    pub streams: u64,
    pub messages: u64,
    pub bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KvBucketStats {
    pub buckets: u64,
    pub keys: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobQueueStats {
    pub pending: u64,
    pub in_flight: u64,
    pub completed: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumerStats {
    pub consumers: u64,
    pub redeliveries: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetStats {
    pub registered_workers: u64,
    pub reachable_workers: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ComponentHealth {
    fn from_result(result: &HealthResult<()>) -> Self {
        match result {
            Ok(()) => Self {
                status: "ok".to_string(),
                error: None,
            },
            Err(err) => Self {
                status: "error".to_string(),
                error: Some(err.to_string()),
            },
        }
    }
}

/// Detailed health report: mandatory component statuses plus independently
/// nullable metric blocks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthSnapshot {
    pub status: String,
    pub components: BTreeMap<String, ComponentHealth>,
    pub version: String,
    pub uptime_seconds: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub broker: Option<BrokerInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub streams: Option<StreamStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kv_buckets: Option<KvBucketStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_queue: Option<JobQueueStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consumers: Option<ConsumerStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fleet: Option<FleetStats>,
}

/// Outcome of the readiness tier.
#[derive(Debug, Clone)]
pub enum Readiness {
    Ready,
    NotReady { error: String },
}

/// Aggregates mandatory checks and optional metrics.
///
/// Correctness (readiness) is strict; observability (metrics) is best-effort.
pub struct HealthAggregator {
    checks: Vec<Arc<dyn HealthChecker>>,
    itemized: Vec<Arc<dyn ItemizedChecker>>,
    metrics: Option<Arc<dyn MetricsProvider>>,
    version: String,
    started_at: Instant,
}

impl HealthAggregator {
    pub fn new(checks: Vec<Arc<dyn HealthChecker>>) -> Self {
        Self {
            checks,
            itemized: Vec::new(),
            metrics: None,
            version: env!("CARGO_PKG_VERSION").to_string(),
            started_at: Instant::now(),
        }
    }

    /// Register a checker that additionally reports itemized sub-checks.
    pub fn with_itemized(mut self, checker: Arc<dyn ItemizedChecker>) -> Self {
        self.itemized.push(checker);
        self
    }

    pub fn with_metrics(mut self, provider: Arc<dyn MetricsProvider>) -> Self {
        self.metrics = Some(provider);
        self
    }

    /// Readiness tier: run every mandatory check and join the failures into
    /// one combined error. An aggregator with no checks is ready.
    pub async fn check_ready(&self) -> Readiness {
        let mut failures = Vec::new();
        for check in &self.checks {
            if let Err(err) = check.check().await {
                failures.push(format!("{}: {}", check.name(), err));
            }
        }
        for check in &self.itemized {
            if let Err(err) = check.check().await {
                failures.push(format!("{}: {}", check.name(), err));
            }
        }
        if failures.is_empty() {
            Readiness::Ready
        } else {
            Readiness::NotReady {
                error: failures.join("; "),
            }
        }
    }

    /// Detailed tier: per-component statuses plus best-effort metric blocks.
    pub async fn snapshot(&self) -> HealthSnapshot {
        let mut components = BTreeMap::new();
        let mut degraded = false;

        for check in &self.checks {
            let result = check.check().await;
            degraded |= result.is_err();
            components.insert(
                check.name().to_string(),
                ComponentHealth::from_result(&result),
            );
        }
        for check in &self.itemized {
            for (item, result) in check.items().await {
                degraded |= result.is_err();
                components.insert(
                    format!("{}/{}", check.name(), item),
                    ComponentHealth::from_result(&result),
                );
            }
        }

        let mut snapshot = HealthSnapshot {
            status: if degraded { "degraded" } else { "ok" }.to_string(),
            components,
            version: self.version.clone(),
            uptime_seconds: self.started_at.elapsed().as_secs(),
            broker: None,
            streams: None,
            kv_buckets: None,
            job_queue: None,
            consumers: None,
            fleet: None,
        };

        if let Some(provider) = &self.metrics {
            // Each category is fetched concurrently and absorbs its own
            // failure; a missing block is the only visible effect.
            let (broker, streams, kv_buckets, job_queue, consumers, fleet) = tokio::join!(
                absorb("broker_info", provider.broker_info()),
                absorb("stream_stats", provider.stream_stats()),
                absorb("kv_bucket_stats", provider.kv_bucket_stats()),
                absorb("job_queue_stats", provider.job_queue_stats()),
                absorb("consumer_stats", provider.consumer_stats()),
                absorb("fleet_stats", provider.fleet_stats()),
            );
            snapshot.broker = broker;
            snapshot.streams = streams;
            snapshot.kv_buckets = kv_buckets;
            snapshot.job_queue = job_queue;
            snapshot.consumers = consumers;
            snapshot.fleet = fleet;
        }

        snapshot
    }
}

async fn absorb<T>(
    category: &'static str,
    fetch: impl std::future::Future<Output = anyhow::Result<T>>,
) -> Option<T> {
    match fetch.await {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!(category, error = %err, "metric fetch failed");
            None
        }
    }
}
