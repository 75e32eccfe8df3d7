//! Dispatch API handlers.
//!
//! # Purpose and responsibility
//! One handler per fleet operation: classify the requested target, call the
//! matching façade shape, and wrap the outcome in the single or broadcast
//! envelope. Reads answer 200; asynchronous modifications answer 202 even
//! when individual hosts failed, because partial failure is contained in the
//! per-host entries.
use crate::api::error::{api_dispatch_error, api_validation_error, ApiError};
use crate::api::types::{
    BroadcastResponse, DnsUpdateRequest, PingRequest, SingleResponse, TargetQuery,
};
use crate::api::{classify_target, Resolved};
use crate::app::AppState;
use crate::dispatch::broadcast::aggregate_broadcast;
use crate::model::DnsConfig;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

pub(crate) async fn node_hostname(
    Query(params): Query<TargetQuery>,
    State(state): State<AppState>,
) -> Result<Response, ApiError> {
    match classify_target(&state, params.target.as_deref().unwrap_or("")).await? {
        Resolved::Single(host) => {
            let outcome = state
                .dispatcher
                .hostname(host.as_deref())
                .await
                .map_err(|err| api_dispatch_error(&err))?;
            Ok((
                StatusCode::OK,
                Json(SingleResponse {
                    job_id: outcome.job,
                    hostname: outcome.hostname,
                    result: outcome.payload,
                }),
            )
                .into_response())
        }
        Resolved::Broadcast(selector) => {
            let outcome = state
                .dispatcher
                .hostname_broadcast(&selector)
                .await
                .map_err(|err| api_dispatch_error(&err))?;
            Ok((
                StatusCode::OK,
                Json(BroadcastResponse {
                    job_id: outcome.job,
                    hosts: aggregate_broadcast(outcome.payloads, outcome.errors),
                }),
            )
                .into_response())
        }
    }
}

pub(crate) async fn node_status(
    Query(params): Query<TargetQuery>,
    State(state): State<AppState>,
) -> Result<Response, ApiError> {
    match classify_target(&state, params.target.as_deref().unwrap_or("")).await? {
        Resolved::Single(host) => {
            let outcome = state
                .dispatcher
                .system_status(host.as_deref())
                .await
                .map_err(|err| api_dispatch_error(&err))?;
            Ok((
                StatusCode::OK,
                Json(SingleResponse {
                    job_id: outcome.job,
                    hostname: outcome.hostname,
                    result: outcome.payload,
                }),
            )
                .into_response())
        }
        Resolved::Broadcast(selector) => {
            let outcome = state
                .dispatcher
                .system_status_broadcast(&selector)
                .await
                .map_err(|err| api_dispatch_error(&err))?;
            Ok((
                StatusCode::OK,
                Json(BroadcastResponse {
                    job_id: outcome.job,
                    hosts: aggregate_broadcast(outcome.payloads, outcome.errors),
                }),
            )
                .into_response())
        }
    }
}

pub(crate) async fn node_load(
    Query(params): Query<TargetQuery>,
    State(state): State<AppState>,
) -> Result<Response, ApiError> {
    match classify_target(&state, params.target.as_deref().unwrap_or("")).await? {
        Resolved::Single(host) => {
            let outcome = state
                .dispatcher
                .node_load(host.as_deref())
                .await
                .map_err(|err| api_dispatch_error(&err))?;
            Ok((
                StatusCode::OK,
                Json(SingleResponse {
                    job_id: outcome.job,
                    hostname: outcome.hostname,
                    result: outcome.payload,
                }),
            )
                .into_response())
        }
        Resolved::Broadcast(selector) => {
            let outcome = state
                .dispatcher
                .node_load_broadcast(&selector)
                .await
                .map_err(|err| api_dispatch_error(&err))?;
            Ok((
                StatusCode::OK,
                Json(BroadcastResponse {
                    job_id: outcome.job,
                    hosts: aggregate_broadcast(outcome.payloads, outcome.errors),
                }),
            )
                .into_response())
        }
    }
}

pub(crate) async fn node_dns_get(
    Query(params): Query<TargetQuery>,
    State(state): State<AppState>,
) -> Result<Response, ApiError> {
    match classify_target(&state, params.target.as_deref().unwrap_or("")).await? {
        Resolved::Single(host) => {
            let outcome = state
                .dispatcher
                .dns_config_get(host.as_deref())
                .await
                .map_err(|err| api_dispatch_error(&err))?;
            Ok((
                StatusCode::OK,
                Json(SingleResponse {
                    job_id: outcome.job,
                    hostname: outcome.hostname,
                    result: outcome.payload,
                }),
            )
                .into_response())
        }
        Resolved::Broadcast(selector) => {
            let outcome = state
                .dispatcher
                .dns_config_get_broadcast(&selector)
                .await
                .map_err(|err| api_dispatch_error(&err))?;
            Ok((
                StatusCode::OK,
                Json(BroadcastResponse {
                    job_id: outcome.job,
                    hosts: aggregate_broadcast(outcome.payloads, outcome.errors),
                }),
            )
                .into_response())
        }
    }
}

pub(crate) async fn node_dns_set(
    State(state): State<AppState>,
    Json(body): Json<DnsUpdateRequest>,
) -> Result<Response, ApiError> {
    if body.servers.is_empty() {
        return Err(api_validation_error("dns servers must not be empty"));
    }
    let config = DnsConfig {
        servers: body.servers,
        search_domains: body.search_domains,
    };
    match classify_target(&state, body.target.as_deref().unwrap_or("")).await? {
        Resolved::Single(host) => {
            let outcome = state
                .dispatcher
                .dns_config_set(host.as_deref(), config)
                .await
                .map_err(|err| api_dispatch_error(&err))?;
            Ok((
                StatusCode::ACCEPTED,
                Json(SingleResponse {
                    job_id: outcome.job,
                    hostname: outcome.hostname,
                    result: outcome.payload,
                }),
            )
                .into_response())
        }
        Resolved::Broadcast(selector) => {
            let outcome = state
                .dispatcher
                .dns_config_set_broadcast(&selector, config)
                .await
                .map_err(|err| api_dispatch_error(&err))?;
            Ok((
                StatusCode::ACCEPTED,
                Json(BroadcastResponse {
                    job_id: outcome.job,
                    hosts: aggregate_broadcast(outcome.payloads, outcome.errors),
                }),
            )
                .into_response())
        }
    }
}

pub(crate) async fn node_ping(
    State(state): State<AppState>,
    Json(body): Json<PingRequest>,
) -> Result<Response, ApiError> {
    if body.destination.trim().is_empty() {
        return Err(api_validation_error("ping destination must not be empty"));
    }
    match classify_target(&state, body.target.as_deref().unwrap_or("")).await? {
        Resolved::Single(host) => {
            let outcome = state
                .dispatcher
                .ping(host.as_deref(), &body.destination)
                .await
                .map_err(|err| api_dispatch_error(&err))?;
            Ok((
                StatusCode::OK,
                Json(SingleResponse {
                    job_id: outcome.job,
                    hostname: outcome.hostname,
                    result: outcome.payload,
                }),
            )
                .into_response())
        }
        Resolved::Broadcast(selector) => {
            let outcome = state
                .dispatcher
                .ping_broadcast(&selector, &body.destination)
                .await
                .map_err(|err| api_dispatch_error(&err))?;
            Ok((
                StatusCode::OK,
                Json(BroadcastResponse {
                    job_id: outcome.job,
                    hosts: aggregate_broadcast(outcome.payloads, outcome.errors),
                }),
            )
                .into_response())
        }
    }
}
