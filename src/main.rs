//! Fleetplane HTTP service entry point.
//!
//! # Purpose
//! Wires configuration, the target registry, the dispatch façade, the audit
//! recorder, and the health aggregator, then starts the API server and the
//! metrics endpoint.
//!
//! # Notes
//! The `build_state` helper keeps wiring testable and minimizes main setup
//! logic.
mod api;
mod app;
mod audit;
mod auth;
mod config;
mod dispatch;
mod fleet;
mod health;
mod model;
mod observability;

use app::{build_router, AppState};
use async_trait::async_trait;
use audit::{spawn_recorder, AuditLayer, InMemoryAuditStore};
use auth::middleware::AuthConfig;
use auth::roles::RoleMapping;
use dispatch::{LoopbackDispatcher, LABEL_UNREACHABLE};
use fleet::registry::{InMemoryRegistry, TargetRegistry};
use health::{
    FleetStats, HealthAggregator, HealthChecker, HealthError, HealthResult, ItemizedChecker,
    MetricsProvider,
};
use model::Worker;
use std::future::Future;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = config::FleetplaneConfig::from_env_or_yaml()?;
    run_with_shutdown(config, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await
}

async fn run_with_shutdown<F>(config: config::FleetplaneConfig, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let metrics_handle = observability::init_observability();
    let state = build_state(&config);
    let metrics_task = tokio::spawn(observability::serve_metrics(
        metrics_handle,
        config.metrics_bind,
    ));

    let app = build_router(state);

    let addr = config.bind_addr;
    tracing::info!(%addr, "fleetplane listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tokio::pin!(shutdown);
    tokio::select! {
        result = axum::serve(listener, app.into_make_service()) => {
            result?;
        }
        _ = &mut shutdown => {}
    }

    metrics_task.abort();
    let _ = metrics_task.await;
    Ok(())
}

fn build_state(config: &config::FleetplaneConfig) -> AppState {
    let workers = config
        .workers
        .iter()
        .map(|seed| {
            let mut worker = Worker::new(&seed.hostname);
            for (key, value) in &seed.labels {
                worker = worker.with_label(key, value);
            }
            worker
        })
        .collect();
    let registry = Arc::new(InMemoryRegistry::new(workers));

    let dispatcher = Arc::new(LoopbackDispatcher::new(registry.clone()));

    let audit_store = Arc::new(InMemoryAuditStore::new());
    // The writer task outlives this function; it drains until the server and
    // its audit handles drop.
    let (audit_handle, _writer) = spawn_recorder(audit_store, config.audit_queue_depth);
    let audit = AuditLayer::new(
        audit_handle,
        Arc::new(config.audit_excluded_prefixes.clone()),
    );

    let fleet_check = Arc::new(RegistryHealth {
        registry: registry.clone(),
    });
    let health = Arc::new(
        HealthAggregator::new(Vec::new())
            .with_itemized(fleet_check.clone())
            .with_metrics(fleet_check),
    );

    AppState {
        auth: Arc::new(AuthConfig {
            signing_key: config.signing_key.clone(),
            roles: RoleMapping::new(config.custom_roles.clone()),
        }),
        registry,
        dispatcher,
        health,
        audit,
    }
}

/// Health view over the target registry: ready when the registry answers,
/// itemized per worker, with fleet counts as the metric block.
struct RegistryHealth {
    registry: Arc<InMemoryRegistry>,
}

impl RegistryHealth {
    async fn workers(&self) -> HealthResult<Vec<Worker>> {
        self.registry
            .list_targets()
            .await
            .map_err(|err| HealthError::Check(format!("fleet registry unavailable: {err}")))
    }

    fn is_unreachable(worker: &Worker) -> bool {
        worker
            .labels
            .get(LABEL_UNREACHABLE)
            .is_some_and(|value| value == "true")
    }
}

#[async_trait]
impl HealthChecker for RegistryHealth {
    fn name(&self) -> &str {
        "fleet"
    }

    async fn check(&self) -> HealthResult<()> {
        self.workers().await.map(|_| ())
    }
}

#[async_trait]
impl ItemizedChecker for RegistryHealth {
    async fn items(&self) -> Vec<(String, HealthResult<()>)> {
        match self.workers().await {
            Ok(workers) => workers
                .into_iter()
                .map(|worker| {
                    let result = if Self::is_unreachable(&worker) {
                        Err(HealthError::Check("connection timed out".to_string()))
                    } else {
                        Ok(())
                    };
                    (worker.hostname, result)
                })
                .collect(),
            Err(err) => vec![("registry".to_string(), Err(err))],
        }
    }
}

#[async_trait]
impl MetricsProvider for RegistryHealth {
    async fn broker_info(&self) -> anyhow::Result<health::BrokerInfo> {
        Ok(health::BrokerInfo {
            server_name: "loopback".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            connections: self.registry.list_targets().await?.len() as u64,
        })
    }

    async fn stream_stats(&self) -> anyhow::Result<health::StreamStats> {
        Ok(health::StreamStats {
            streams: 0,
            messages: 0,
            bytes: 0,
        })
    }

    async fn kv_bucket_stats(&self) -> anyhow::Result<health::KvBucketStats> {
        Ok(health::KvBucketStats {
            buckets: 0,
            keys: 0,
        })
    }

    async fn job_queue_stats(&self) -> anyhow::Result<health::JobQueueStats> {
        Ok(health::JobQueueStats {
            pending: 0,
            in_flight: 0,
            completed: 0,
        })
    }

    async fn consumer_stats(&self) -> anyhow::Result<health::ConsumerStats> {
        Ok(health::ConsumerStats {
            consumers: 0,
            redeliveries: 0,
        })
    }

    async fn fleet_stats(&self) -> anyhow::Result<FleetStats> {
        let workers = self.registry.list_targets().await?;
        let reachable = workers
            .iter()
            .filter(|worker| !Self::is_unreachable(worker))
            .count() as u64;
        Ok(FleetStats {
            registered_workers: workers.len() as u64,
            reachable_workers: reachable,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::collections::HashMap;

    fn test_config() -> config::FleetplaneConfig {
        config::FleetplaneConfig {
            bind_addr: "127.0.0.1:0".parse().expect("bind"),
            metrics_bind: "127.0.0.1:0".parse().expect("metrics"),
            signing_key: "test-key".to_string(),
            custom_roles: HashMap::new(),
            audit_excluded_prefixes: vec!["/health".to_string(), "/metrics".to_string()],
            audit_queue_depth: 8,
            workers: vec![
                config::WorkerSeed {
                    hostname: "server1".to_string(),
                    labels: HashMap::new(),
                },
                config::WorkerSeed {
                    hostname: "server2".to_string(),
                    labels: HashMap::from([(LABEL_UNREACHABLE.to_string(), "true".to_string())]),
                },
            ],
        }
    }

    #[tokio::test]
    async fn build_state_seeds_registry_from_config() {
        let state = build_state(&test_config());
        let targets = state.registry.list_targets().await.expect("list");
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].hostname, "server1");
    }

    #[tokio::test]
    async fn registry_health_reports_fleet_counts() {
        let state = build_state(&test_config());
        let snapshot = state.health.snapshot().await;
        // server2 is labeled unreachable, so the fleet view is degraded.
        assert_eq!(snapshot.status, "degraded");
        let fleet = snapshot.fleet.expect("fleet stats");
        assert_eq!(fleet.registered_workers, 2);
        assert_eq!(fleet.reachable_workers, 1);
        assert_eq!(snapshot.components["fleet/server1"].status, "ok");
        assert_eq!(snapshot.components["fleet/server2"].status, "error");
    }

    #[tokio::test]
    #[serial]
    async fn run_with_shutdown_starts_and_stops() {
        run_with_shutdown(test_config(), async {
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        })
        .await
        .expect("run should stop cleanly");
    }
}
