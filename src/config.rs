use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::net::SocketAddr;

/// Audit exclusions always contain the probe and metrics surfaces; operator
/// additions extend the list, they never replace it.
const BUILTIN_AUDIT_EXCLUSIONS: &[&str] = &["/health", "/metrics"];

// Fleetplane configuration sourced from environment variables, with an
// optional YAML override file for the parts that do not fit an env var.
#[derive(Debug, Clone)]
pub struct FleetplaneConfig {
    pub bind_addr: SocketAddr,
    pub metrics_bind: SocketAddr,
    pub signing_key: String,
    pub custom_roles: HashMap<String, Vec<String>>,
    pub audit_excluded_prefixes: Vec<String>,
    pub audit_queue_depth: usize,
    /// Static worker seed for deployments without a live registry feed.
    pub workers: Vec<WorkerSeed>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkerSeed {
    pub hostname: String,
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct FleetplaneConfigOverride {
    bind_addr: Option<String>,
    metrics_bind: Option<String>,
    custom_roles: Option<HashMap<String, Vec<String>>>,
    audit_excluded_prefixes: Option<Vec<String>>,
    audit_queue_depth: Option<usize>,
    workers: Option<Vec<WorkerSeed>>,
}

impl FleetplaneConfig {
    pub fn from_env() -> Result<Self> {
        let bind_addr = std::env::var("FLEETPLANE_BIND")
            .unwrap_or_else(|_| "0.0.0.0:8443".to_string())
            .parse()
            .with_context(|| "parse FLEETPLANE_BIND")?;
        let metrics_bind = std::env::var("FLEETPLANE_METRICS_BIND")
            .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
            .parse()
            .with_context(|| "parse FLEETPLANE_METRICS_BIND")?;
        let signing_key =
            std::env::var("FLEETPLANE_SIGNING_KEY").with_context(|| "FLEETPLANE_SIGNING_KEY")?;
        Ok(Self {
            bind_addr,
            metrics_bind,
            signing_key,
            custom_roles: HashMap::new(),
            audit_excluded_prefixes: builtin_exclusions(),
            audit_queue_depth: crate::audit::DEFAULT_QUEUE_DEPTH,
            workers: Vec::new(),
        })
    }

    pub fn from_env_or_yaml() -> Result<Self> {
        let mut config = Self::from_env()?;
        if let Ok(path) = std::env::var("FLEETPLANE_CONFIG") {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("read FLEETPLANE_CONFIG: {path}"))?;
            let override_cfg: FleetplaneConfigOverride =
                serde_yaml::from_str(&contents).with_context(|| "parse fleetplane config yaml")?;
            if let Some(value) = override_cfg.bind_addr {
                config.bind_addr = value.parse().with_context(|| "parse bind_addr")?;
            }
            if let Some(value) = override_cfg.metrics_bind {
                config.metrics_bind = value.parse().with_context(|| "parse metrics_bind")?;
            }
            if let Some(value) = override_cfg.custom_roles {
                config.custom_roles = value;
            }
            if let Some(value) = override_cfg.audit_excluded_prefixes {
                config.audit_excluded_prefixes = builtin_exclusions();
                config
                    .audit_excluded_prefixes
                    .extend(value.into_iter().filter(|prefix| !prefix.is_empty()));
            }
            if let Some(value) = override_cfg.audit_queue_depth {
                config.audit_queue_depth = value;
            }
            if let Some(value) = override_cfg.workers {
                config.workers = value;
            }
        }
        Ok(config)
    }
}

fn builtin_exclusions() -> Vec<String> {
    BUILTIN_AUDIT_EXCLUSIONS
        .iter()
        .map(|prefix| prefix.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for key in [
            "FLEETPLANE_BIND",
            "FLEETPLANE_METRICS_BIND",
            "FLEETPLANE_SIGNING_KEY",
            "FLEETPLANE_CONFIG",
        ] {
            std::env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn signing_key_is_required() {
        clear_env();
        assert!(FleetplaneConfig::from_env().is_err());
    }

    #[test]
    #[serial]
    fn defaults_apply_when_env_is_sparse() {
        clear_env();
        std::env::set_var("FLEETPLANE_SIGNING_KEY", "test-key");
        let config = FleetplaneConfig::from_env().expect("config");
        assert_eq!(config.bind_addr.to_string(), "0.0.0.0:8443");
        assert_eq!(config.metrics_bind.to_string(), "0.0.0.0:8080");
        assert_eq!(config.audit_queue_depth, crate::audit::DEFAULT_QUEUE_DEPTH);
        assert_eq!(
            config.audit_excluded_prefixes,
            vec!["/health".to_string(), "/metrics".to_string()]
        );
        clear_env();
    }

    #[test]
    #[serial]
    fn yaml_override_extends_exclusions_and_seeds_workers() {
        clear_env();
        std::env::set_var("FLEETPLANE_SIGNING_KEY", "test-key");
        let dir = std::env::temp_dir().join("fleetplane-config-test");
        std::fs::create_dir_all(&dir).expect("tempdir");
        let path = dir.join("override.yaml");
        std::fs::write(
            &path,
            concat!(
                "bind_addr: 127.0.0.1:9443\n",
                "audit_excluded_prefixes:\n",
                "  - /internal\n",
                "audit_queue_depth: 16\n",
                "custom_roles:\n",
                "  auditor:\n",
                "    - \"*:read\"\n",
                "workers:\n",
                "  - hostname: server1\n",
                "    labels:\n",
                "      env: prod\n",
            ),
        )
        .expect("write override");
        std::env::set_var("FLEETPLANE_CONFIG", &path);

        let config = FleetplaneConfig::from_env_or_yaml().expect("config");
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:9443");
        assert_eq!(
            config.audit_excluded_prefixes,
            vec![
                "/health".to_string(),
                "/metrics".to_string(),
                "/internal".to_string()
            ]
        );
        assert_eq!(config.audit_queue_depth, 16);
        assert_eq!(
            config.custom_roles.get("auditor"),
            Some(&vec!["*:read".to_string()])
        );
        assert_eq!(config.workers.len(), 1);
        assert_eq!(config.workers[0].hostname, "server1");
        clear_env();
    }
}
