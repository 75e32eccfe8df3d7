//! Health API handlers.
//!
//! Liveness is unconditional: if the process answers, it is alive. Readiness
//! and the detailed report defer to the aggregator.
use crate::api::types::{LivenessResponse, ReadinessResponse};
use crate::app::AppState;
use crate::health::Readiness;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

pub(crate) async fn health_live() -> Response {
    (
        StatusCode::OK,
        Json(LivenessResponse {
            status: "alive".to_string(),
        }),
    )
        .into_response()
}

pub(crate) async fn health_ready(State(state): State<AppState>) -> Response {
    match state.health.check_ready().await {
        Readiness::Ready => (
            StatusCode::OK,
            Json(ReadinessResponse {
                status: "ready".to_string(),
                error: None,
            }),
        )
            .into_response(),
        Readiness::NotReady { error } => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadinessResponse {
                status: "not_ready".to_string(),
                error: Some(error),
            }),
        )
            .into_response(),
    }
}

/// Detailed dependency report. Always 200; degradation shows up in the
/// `status` field and per-component entries, not in the HTTP code.
pub(crate) async fn health_detail(State(state): State<AppState>) -> Response {
    let snapshot = state.health.snapshot().await;
    (StatusCode::OK, Json(snapshot)).into_response()
}
