//! Target classification and validation.
//!
//! A requested destination is one of three shapes: the empty sentinel (let
//! the dispatcher pick any reachable worker), an explicit hostname, or a
//! broadcast selector (`_all` or a `key=value` label expression matched
//! against the live registry).
use crate::fleet::registry::TargetRegistry;
use crate::model::Worker;
use thiserror::Error;

/// Literal broadcast token addressing every known worker.
pub const BROADCAST_ALL: &str = "_all";

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("target not found")]
    TargetNotFound,
    #[error("{0}")]
    Invalid(String),
    #[error("registry error: {0}")]
    Registry(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BroadcastSelector {
    All,
    Label { key: String, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    AnyHost,
    Host(String),
    Broadcast(BroadcastSelector),
}

impl Target {
    /// Classify the raw target string by shape alone, without consulting the
    /// registry. A `key=value` expression is tentatively a label selector;
    /// [`validate_target`] decides whether it actually matches anything.
    pub fn parse(raw: &str) -> Target {
        let raw = raw.trim();
        if raw.is_empty() {
            return Target::AnyHost;
        }
        if raw == BROADCAST_ALL {
            return Target::Broadcast(BroadcastSelector::All);
        }
        if let Some((key, value)) = raw.split_once('=') {
            if !key.is_empty() && !value.is_empty() {
                return Target::Broadcast(BroadcastSelector::Label {
                    key: key.to_string(),
                    value: value.to_string(),
                });
            }
        }
        Target::Host(raw.to_string())
    }
}

/// True when the worker carries the selector's label.
pub fn selector_matches(selector: &BroadcastSelector, worker: &Worker) -> bool {
    match selector {
        BroadcastSelector::All => true,
        BroadcastSelector::Label { key, value } => {
            worker.labels.get(key).is_some_and(|have| have == value)
        }
    }
}

/// True for the literal broadcast token and for any label selector matching
/// at least one registered worker; false for the any-host sentinel and for
/// concrete hostnames.
pub async fn is_broadcast_target(registry: &dyn TargetRegistry, raw: &str) -> bool {
    match Target::parse(raw) {
        Target::Broadcast(BroadcastSelector::All) => true,
        Target::Broadcast(selector) => match registry.list_targets().await {
            Ok(workers) => workers
                .iter()
                .any(|worker| selector_matches(&selector, worker)),
            Err(_) => false,
        },
        _ => false,
    }
}

/// Validate a raw target against the registry.
///
/// # Errors
/// - [`ValidationError::TargetNotFound`] for an explicit hostname the
///   registry does not know, and for a label selector matching no worker.
pub async fn validate_target(
    registry: &dyn TargetRegistry,
    raw: &str,
) -> Result<Target, ValidationError> {
    let target = Target::parse(raw);
    match &target {
        Target::AnyHost | Target::Broadcast(BroadcastSelector::All) => Ok(target),
        Target::Broadcast(selector) => {
            let workers = registry
                .list_targets()
                .await
                .map_err(|err| ValidationError::Registry(err.to_string()))?;
            if workers.iter().any(|w| selector_matches(selector, w)) {
                Ok(target)
            } else {
                Err(ValidationError::TargetNotFound)
            }
        }
        Target::Host(hostname) => {
            let workers = registry
                .list_targets()
                .await
                .map_err(|err| ValidationError::Registry(err.to_string()))?;
            if workers.iter().any(|w| &w.hostname == hostname) {
                Ok(target)
            } else {
                Err(ValidationError::TargetNotFound)
            }
        }
    }
}
