//! API error types and helpers.
//!
//! # Purpose and responsibility
//! Centralizes HTTP error response construction so every endpoint returns the
//! same `{"error": "<message>"}` body shape.
//!
//! # Key invariants and assumptions
//! - Status codes follow the error taxonomy: 400 validation, 401 missing or
//!   invalid token, 403 insufficient scope, 500 dispatch-level failure,
//!   503 readiness failure.
//! - Per-host broadcast failures are not errors at this layer; they ride
//!   inside a success envelope.
use crate::auth::token::AuthError;
use crate::dispatch::DispatchError;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Structured API error returned by handlers and middleware.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorBody,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status, Json(self.body)).into_response()
    }
}

/// Build a 400 Bad Request validation error.
pub fn api_validation_error(message: &str) -> ApiError {
    ApiError {
        status: StatusCode::BAD_REQUEST,
        body: ErrorBody {
            error: message.to_string(),
        },
    }
}

/// Build a 401 Unauthorized error.
pub fn api_unauthorized(message: &str) -> ApiError {
    ApiError {
        status: StatusCode::UNAUTHORIZED,
        body: ErrorBody {
            error: message.to_string(),
        },
    }
}

/// Build a 403 Forbidden error.
pub fn api_forbidden(message: &str) -> ApiError {
    ApiError {
        status: StatusCode::FORBIDDEN,
        body: ErrorBody {
            error: message.to_string(),
        },
    }
}

/// Map an authentication or authorization failure onto its HTTP outcome.
pub fn api_auth_error(err: &AuthError) -> ApiError {
    match err {
        AuthError::MissingBearer | AuthError::InvalidToken(_) => api_unauthorized(&err.to_string()),
        AuthError::InsufficientScope { .. } => api_forbidden(&err.to_string()),
    }
}

/// Build a 500 without a dispatch error to log.
pub fn api_internal(message: &str) -> ApiError {
    ApiError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        body: ErrorBody {
            error: message.to_string(),
        },
    }
}

/// Build a 500 from a dispatch-level failure.
///
/// The collaborator error is surfaced verbatim; debuggability is worth the
/// information leak from an internal component here.
pub fn api_dispatch_error(err: &DispatchError) -> ApiError {
    metrics::counter!("fleetplane_dispatch_failures_total").increment(1);
    tracing::error!(error = %err, "dispatch failed");
    ApiError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        body: ErrorBody {
            error: err.to_string(),
        },
    }
}
