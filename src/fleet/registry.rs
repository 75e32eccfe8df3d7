//! Target registry: the externally-supplied inventory of known workers.
//!
//! # Purpose
//! Exposes the [`TargetRegistry`] trait consumed by target validation and
//! broadcast resolution, plus an in-memory implementation for local
//! development, tests, and deployments with a static fleet.
use crate::model::Worker;
use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

pub type RegistryResult<T> = Result<T, RegistryError>;

/// Inventory of known workers, injected once at startup and safe for
/// concurrent use.
#[async_trait]
pub trait TargetRegistry: Send + Sync {
    async fn list_targets(&self) -> RegistryResult<Vec<Worker>>;
}

/// In-memory registry seeded from configuration.
///
/// Workers can be registered and deregistered at runtime, so a discovery
/// bridge can keep it current; reads are concurrent, writes serialized.
pub struct InMemoryRegistry {
    workers: RwLock<HashMap<String, Worker>>,
}

impl InMemoryRegistry {
    pub fn new(seed: Vec<Worker>) -> Self {
        let workers = seed
            .into_iter()
            .map(|worker| (worker.hostname.clone(), worker))
            .collect();
        Self {
            workers: RwLock::new(workers),
        }
    }

    pub async fn register(&self, worker: Worker) {
        self.workers
            .write()
            .await
            .insert(worker.hostname.clone(), worker);
    }

    pub async fn deregister(&self, hostname: &str) {
        self.workers.write().await.remove(hostname);
    }
}

#[async_trait]
impl TargetRegistry for InMemoryRegistry {
    async fn list_targets(&self) -> RegistryResult<Vec<Worker>> {
        let mut items: Vec<Worker> = self.workers.read().await.values().cloned().collect();
        // Sorted output keeps any-host selection and test assertions stable.
        items.sort_by(|a, b| a.hostname.cmp(&b.hostname));
        Ok(items)
    }
}
