//! Per-route scope authorization middleware.
//!
//! # Purpose and responsibility
//! Guards protected routes: extracts the bearer token, verifies it, injects
//! the authenticated identity into the request, and enforces the route's
//! required scopes against the caller's effective permissions.
//!
//! # Where it fits in fleetplane
//! Every dispatch and detailed-health route is wrapped by this guard via
//! `axum::middleware::from_fn_with_state`. Liveness and readiness are wired
//! without it in `build_router`; that exemption is static, not configurable
//! at runtime.
//!
//! # Key invariants and assumptions
//! - Authorization failures are resolved entirely here and never reach the
//!   dispatch façade.
//! - A 403 names the required scopes and the resolved set so a denied
//!   operator can see what grant is missing.
use crate::api::error::api_auth_error;
use crate::auth::roles::RoleMapping;
use crate::auth::token::{validate_token, AuthError};
use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::sync::Arc;

/// Authenticated identity attached to the request for handlers and the audit
/// recorder. Propagated onto the response extensions after the handler runs
/// so response-side middleware can observe it.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub subject: String,
    pub roles: Vec<String>,
}

/// Shared verification inputs, built once at startup and never mutated.
#[derive(Debug)]
pub struct AuthConfig {
    pub signing_key: String,
    pub roles: RoleMapping,
}

/// Per-route guard state: the shared auth configuration plus the static list
/// of scopes that satisfy this route.
#[derive(Clone)]
pub struct ScopeGuard {
    auth: Arc<AuthConfig>,
    required: &'static [&'static str],
}

impl ScopeGuard {
    pub fn new(auth: Arc<AuthConfig>, required: &'static [&'static str]) -> Self {
        Self { auth, required }
    }
}

/// Middleware entry point for `axum::middleware::from_fn_with_state`.
pub async fn enforce_scope(
    State(guard): State<ScopeGuard>,
    mut request: Request,
    next: Next,
) -> Response {
    let claims = match bearer_token(&request).and_then(|token| {
        validate_token(token, &guard.auth.signing_key)
    }) {
        Ok(claims) => claims,
        Err(err) => return api_auth_error(&err).into_response(),
    };

    let context = AuthContext {
        subject: claims.sub.clone(),
        roles: claims.roles.clone(),
    };
    request.extensions_mut().insert(context.clone());

    if !guard.required.is_empty() {
        let effective = guard.auth.roles.resolve(&claims.roles, &claims.perms);
        if !RoleMapping::allows(&effective, guard.required) {
            let err = AuthError::InsufficientScope {
                required: guard.required.join(", "),
                resolved: effective.into_iter().collect::<Vec<_>>().join(", "),
            };
            tracing::debug!(subject = %claims.sub, error = %err, "request denied");
            let mut response = api_auth_error(&err).into_response();
            // A denial still happened to an authenticated caller; expose the
            // identity so the audit recorder can log the attempt.
            response.extensions_mut().insert(context);
            return response;
        }
    }

    let mut response = next.run(request).await;
    // Response-side middleware (the audit recorder) needs the identity after
    // the handler has produced its status code.
    response.extensions_mut().insert(context);
    response
}

fn bearer_token(request: &Request) -> Result<&str, AuthError> {
    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .filter(|token| !token.is_empty())
        .ok_or(AuthError::MissingBearer)
}
