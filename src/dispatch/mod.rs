//! Dispatch façade: the boundary to the worker fleet.
//!
//! # Purpose and responsibility
//! Defines the [`DispatchFacade`] trait every user-facing operation goes
//! through, the job correlation ID minted once per dispatch, and the error
//! taxonomy separating fatal dispatch-level failures from expected per-host
//! partial failures.
//!
//! # Where it fits in fleetplane
//! Handlers resolve a target, then call exactly one façade method. The wire
//! transport behind a production implementation (broker, discovery, retries)
//! is out of scope here; the in-process [`LoopbackDispatcher`] answers from
//! the registry for development and tests.
//!
//! # Key invariants and assumptions
//! - Every dispatch call, single or broadcast, yields exactly one [`JobId`].
//! - A broadcast's payload and error maps are disjoint; a worker appears in
//!   at most one of them.
//! - A malformed correlation ID surfaces as [`DispatchError::BadCorrelationId`],
//!   never a panic in the request path.
use crate::fleet::registry::TargetRegistry;
use crate::fleet::target::{selector_matches, BroadcastSelector};
use crate::model::{DnsConfig, NodeLoad, PingReport, SystemStatus, Worker};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

pub mod broadcast;

/// Server-generated correlation identifier, minted once per dispatch call and
/// echoed back to the caller.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for JobId {
    type Err = DispatchError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        // Preserve the original input for clearer error messages.
        let uuid = Uuid::parse_str(input)
            .map_err(|_| DispatchError::BadCorrelationId(input.to_string()))?;
        Ok(Self(uuid))
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("dispatch failed: {0}")]
    Failed(String),
    #[error("invalid correlation id: {0}")]
    BadCorrelationId(String),
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

pub type DispatchResult<T> = Result<T, DispatchError>;

/// Result of a single-target operation: the worker the dispatcher resolved
/// and its payload.
#[derive(Debug, Clone)]
pub struct SingleOutcome<T> {
    pub job: JobId,
    pub hostname: String,
    pub payload: T,
}

/// Correlated results of a broadcast: every worker that responded appears in
/// exactly one of the two maps.
#[derive(Debug, Clone)]
pub struct BroadcastOutcome<T> {
    pub job: JobId,
    pub payloads: BTreeMap<String, T>,
    pub errors: BTreeMap<String, String>,
}

/// Fleet operations, one single/broadcast pair per domain operation.
///
/// Single-target calls fail the whole request on error; broadcast calls fail
/// only on dispatch-level problems, with per-host failures reported in the
/// outcome's error map.
#[async_trait]
pub trait DispatchFacade: Send + Sync {
    async fn hostname(&self, host: Option<&str>) -> DispatchResult<SingleOutcome<String>>;
    async fn hostname_broadcast(
        &self,
        selector: &BroadcastSelector,
    ) -> DispatchResult<BroadcastOutcome<String>>;

    async fn system_status(&self, host: Option<&str>)
        -> DispatchResult<SingleOutcome<SystemStatus>>;
    async fn system_status_broadcast(
        &self,
        selector: &BroadcastSelector,
    ) -> DispatchResult<BroadcastOutcome<SystemStatus>>;

    async fn node_load(&self, host: Option<&str>) -> DispatchResult<SingleOutcome<NodeLoad>>;
    async fn node_load_broadcast(
        &self,
        selector: &BroadcastSelector,
    ) -> DispatchResult<BroadcastOutcome<NodeLoad>>;

    async fn dns_config_get(&self, host: Option<&str>)
        -> DispatchResult<SingleOutcome<DnsConfig>>;
    async fn dns_config_get_broadcast(
        &self,
        selector: &BroadcastSelector,
    ) -> DispatchResult<BroadcastOutcome<DnsConfig>>;

    async fn dns_config_set(
        &self,
        host: Option<&str>,
        config: DnsConfig,
    ) -> DispatchResult<SingleOutcome<DnsConfig>>;
    async fn dns_config_set_broadcast(
        &self,
        selector: &BroadcastSelector,
        config: DnsConfig,
    ) -> DispatchResult<BroadcastOutcome<DnsConfig>>;

    async fn ping(
        &self,
        host: Option<&str>,
        destination: &str,
    ) -> DispatchResult<SingleOutcome<PingReport>>;
    async fn ping_broadcast(
        &self,
        selector: &BroadcastSelector,
        destination: &str,
    ) -> DispatchResult<BroadcastOutcome<PingReport>>;
}

/// Label marking a registered worker as unreachable for the loopback façade.
pub const LABEL_UNREACHABLE: &str = "unreachable";
const UNREACHABLE_ERROR: &str = "connection timed out";

/// In-process façade answering from the target registry.
///
/// Exists for local development and tests, no external dependencies. Workers
/// labeled `unreachable=true` simulate a node that never responds: the
/// broadcast outcome carries a synthesized timeout error for them rather
/// than omitting them silently.
pub struct LoopbackDispatcher {
    registry: Arc<dyn TargetRegistry>,
    dns: RwLock<HashMap<String, DnsConfig>>,
    started_at: Instant,
}

impl LoopbackDispatcher {
    pub fn new(registry: Arc<dyn TargetRegistry>) -> Self {
        Self {
            registry,
            dns: RwLock::new(HashMap::new()),
            started_at: Instant::now(),
        }
    }

    /// Mint the correlation ID for one dispatch call.
    ///
    /// Round-trips through the wire form the broker would carry so a
    /// malformed ID propagates as an error instead of crashing the handler.
    fn mint_job(&self) -> DispatchResult<JobId> {
        Uuid::new_v4().to_string().parse()
    }

    async fn workers(&self) -> DispatchResult<Vec<Worker>> {
        self.registry
            .list_targets()
            .await
            .map_err(|err| DispatchError::Failed(format!("fleet registry unavailable: {err}")))
    }

    fn is_unreachable(worker: &Worker) -> bool {
        worker
            .labels
            .get(LABEL_UNREACHABLE)
            .is_some_and(|value| value == "true")
    }

    /// Pick the worker a single-target call lands on.
    async fn resolve_single(&self, host: Option<&str>) -> DispatchResult<Worker> {
        let workers = self.workers().await?;
        match host {
            Some(hostname) => {
                let worker = workers
                    .into_iter()
                    .find(|w| w.hostname == hostname)
                    .ok_or_else(|| DispatchError::Failed(format!("unknown worker: {hostname}")))?;
                if Self::is_unreachable(&worker) {
                    return Err(DispatchError::Failed(UNREACHABLE_ERROR.to_string()));
                }
                Ok(worker)
            }
            None => workers
                .into_iter()
                .find(|w| !Self::is_unreachable(w))
                .ok_or_else(|| DispatchError::Failed("no reachable workers".to_string())),
        }
    }

    /// Run one synthesized operation against every selected worker.
    async fn fan_out<T, F>(
        &self,
        selector: &BroadcastSelector,
        mut op: F,
    ) -> DispatchResult<BroadcastOutcome<T>>
    where
        F: FnMut(&Worker) -> T,
    {
        let job = self.mint_job()?;
        metrics::counter!("fleetplane_dispatch_total", "mode" => "broadcast").increment(1);
        let mut payloads = BTreeMap::new();
        let mut errors = BTreeMap::new();
        for worker in self.workers().await? {
            if !selector_matches(selector, &worker) {
                continue;
            }
            if Self::is_unreachable(&worker) {
                errors.insert(worker.hostname.clone(), UNREACHABLE_ERROR.to_string());
            } else {
                payloads.insert(worker.hostname.clone(), op(&worker));
            }
        }
        Ok(BroadcastOutcome {
            job,
            payloads,
            errors,
        })
    }

    async fn single<T, F>(&self, host: Option<&str>, op: F) -> DispatchResult<SingleOutcome<T>>
    where
        F: FnOnce(&Worker) -> T,
    {
        let job = self.mint_job()?;
        metrics::counter!("fleetplane_dispatch_total", "mode" => "single").increment(1);
        let worker = self.resolve_single(host).await?;
        let payload = op(&worker);
        Ok(SingleOutcome {
            job,
            hostname: worker.hostname,
            payload,
        })
    }

    fn status_for(&self, worker: &Worker) -> SystemStatus {
        SystemStatus {
            hostname: worker.hostname.clone(),
            agent_version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: self.started_at.elapsed().as_secs(),
        }
    }

    fn load_for(worker: &Worker) -> NodeLoad {
        // Deterministic per hostname so tests can assert stable payloads.
        let seed = worker.hostname.len() as f64;
        NodeLoad {
            load_1m: seed * 0.01,
            load_5m: seed * 0.02,
            load_15m: seed * 0.03,
            memory_used_percent: (seed * 3.0) % 100.0,
        }
    }

    fn default_dns() -> DnsConfig {
        DnsConfig {
            servers: vec!["9.9.9.9".to_string()],
            search_domains: vec![],
        }
    }

    fn ping_for(destination: &str) -> PingReport {
        PingReport {
            destination: destination.to_string(),
            transmitted: 3,
            received: 3,
            avg_rtt_ms: 0.42,
        }
    }
}

#[async_trait]
impl DispatchFacade for LoopbackDispatcher {
    async fn hostname(&self, host: Option<&str>) -> DispatchResult<SingleOutcome<String>> {
        self.single(host, |worker| worker.hostname.clone()).await
    }

    async fn hostname_broadcast(
        &self,
        selector: &BroadcastSelector,
    ) -> DispatchResult<BroadcastOutcome<String>> {
        self.fan_out(selector, |worker| worker.hostname.clone())
            .await
    }

    async fn system_status(
        &self,
        host: Option<&str>,
    ) -> DispatchResult<SingleOutcome<SystemStatus>> {
        self.single(host, |worker| self.status_for(worker)).await
    }

    async fn system_status_broadcast(
        &self,
        selector: &BroadcastSelector,
    ) -> DispatchResult<BroadcastOutcome<SystemStatus>> {
        self.fan_out(selector, |worker| self.status_for(worker))
            .await
    }

    async fn node_load(&self, host: Option<&str>) -> DispatchResult<SingleOutcome<NodeLoad>> {
        self.single(host, Self::load_for).await
    }

    async fn node_load_broadcast(
        &self,
        selector: &BroadcastSelector,
    ) -> DispatchResult<BroadcastOutcome<NodeLoad>> {
        self.fan_out(selector, Self::load_for).await
    }

    async fn dns_config_get(
        &self,
        host: Option<&str>,
    ) -> DispatchResult<SingleOutcome<DnsConfig>> {
        let dns = self.dns.read().await;
        self.single(host, |worker| {
            dns.get(&worker.hostname)
                .cloned()
                .unwrap_or_else(Self::default_dns)
        })
        .await
    }

    async fn dns_config_get_broadcast(
        &self,
        selector: &BroadcastSelector,
    ) -> DispatchResult<BroadcastOutcome<DnsConfig>> {
        let dns = self.dns.read().await;
        self.fan_out(selector, |worker| {
            dns.get(&worker.hostname)
                .cloned()
                .unwrap_or_else(Self::default_dns)
        })
        .await
    }

    async fn dns_config_set(
        &self,
        host: Option<&str>,
        config: DnsConfig,
    ) -> DispatchResult<SingleOutcome<DnsConfig>> {
        let outcome = self.single(host, |_| config.clone()).await?;
        self.dns
            .write()
            .await
            .insert(outcome.hostname.clone(), config);
        Ok(outcome)
    }

    async fn dns_config_set_broadcast(
        &self,
        selector: &BroadcastSelector,
        config: DnsConfig,
    ) -> DispatchResult<BroadcastOutcome<DnsConfig>> {
        let outcome = self.fan_out(selector, |_| config.clone()).await?;
        let mut dns = self.dns.write().await;
        for hostname in outcome.payloads.keys() {
            dns.insert(hostname.clone(), config.clone());
        }
        Ok(outcome)
    }

    async fn ping(
        &self,
        host: Option<&str>,
        destination: &str,
    ) -> DispatchResult<SingleOutcome<PingReport>> {
        self.single(host, |_| Self::ping_for(destination)).await
    }

    async fn ping_broadcast(
        &self,
        selector: &BroadcastSelector,
        destination: &str,
    ) -> DispatchResult<BroadcastOutcome<PingReport>> {
        self.fan_out(selector, |_| Self::ping_for(destination)).await
    }
}
