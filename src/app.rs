//! Application state and router construction.
//!
//! # Purpose and responsibility
//! Owns the wiring between HTTP routes and the collaborators behind them:
//! which routes exist, which scope each requires, and the middleware order.
//!
//! # Key invariants and assumptions
//! - The audit layer wraps the scope guard, so it observes the final status
//!   code of denied requests too; it only records requests that carry an
//!   authenticated identity on the response.
//! - `/health/live` and `/health/ready` are wired outside every guard. That
//!   exemption is part of the routing table, not runtime configuration.
use crate::api;
use crate::audit::{record_request, AuditLayer};
use crate::auth::middleware::{enforce_scope, AuthConfig, ScopeGuard};
use crate::dispatch::DispatchFacade;
use crate::fleet::registry::TargetRegistry;
use crate::health::HealthAggregator;
use axum::routing::{get, post, put};
use axum::{middleware, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

const SYSTEM_READ: &[&str] = &["system:read"];
const NETWORK_READ: &[&str] = &["network:read"];
const NETWORK_WRITE: &[&str] = &["network:write"];
const HEALTH_READ: &[&str] = &["health:read"];

#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthConfig>,
    pub registry: Arc<dyn TargetRegistry>,
    pub dispatcher: Arc<dyn DispatchFacade>,
    pub health: Arc<HealthAggregator>,
    pub audit: AuditLayer,
}

pub fn build_router(state: AppState) -> Router {
    let trace_layer =
        TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
            tracing::info_span!(
                "http.request",
                method = %request.method(),
                uri = %request.uri(),
                version = ?request.version()
            )
        });

    let guard = |required| {
        middleware::from_fn_with_state(ScopeGuard::new(state.auth.clone(), required), enforce_scope)
    };

    let system = Router::new()
        .route("/node/hostname", get(api::node::node_hostname))
        .route("/node/status", get(api::node::node_status))
        .route("/node/load", get(api::node::node_load))
        .route_layer(guard(SYSTEM_READ));

    let network_read = Router::new()
        .route("/node/dns", get(api::node::node_dns_get))
        .route("/node/ping", post(api::node::node_ping))
        .route_layer(guard(NETWORK_READ));

    let network_write = Router::new()
        .route("/node/dns", put(api::node::node_dns_set))
        .route_layer(guard(NETWORK_WRITE));

    let detailed_health = Router::new()
        .route("/health", get(api::health::health_detail))
        .route_layer(guard(HEALTH_READ));

    let probes = Router::new()
        .route("/health/live", get(api::health::health_live))
        .route("/health/ready", get(api::health::health_ready));

    Router::new()
        .merge(system)
        .merge(network_read)
        .merge(network_write)
        .merge(detailed_health)
        .merge(probes)
        .layer(middleware::from_fn_with_state(
            state.audit.clone(),
            record_request,
        ))
        .layer(trace_layer)
        .with_state(state)
}
