//! Domain payload types shared between the dispatch façade and the HTTP API.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A worker node known to the target registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Worker {
    pub hostname: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl Worker {
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            labels: BTreeMap::new(),
        }
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }
}

/// System state reported by a worker agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemStatus {
    pub hostname: String,
    pub agent_version: String,
    pub uptime_seconds: u64,
}

/// Load figures reported by a worker agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeLoad {
    pub load_1m: f64,
    pub load_5m: f64,
    pub load_15m: f64,
    pub memory_used_percent: f64,
}

/// DNS resolver configuration on a worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DnsConfig {
    pub servers: Vec<String>,
    #[serde(default)]
    pub search_domains: Vec<String>,
}

/// Result of a connectivity probe from a worker to a destination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PingReport {
    pub destination: String,
    pub transmitted: u32,
    pub received: u32,
    pub avg_rtt_ms: f64,
}
