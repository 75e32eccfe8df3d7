mod common;

use axum::http::StatusCode;
use common::read_json;
use fleetplane::app::{build_router, AppState};
use fleetplane::audit::{spawn_recorder, AuditLayer, InMemoryAuditStore};
use fleetplane::auth::middleware::AuthConfig;
use fleetplane::auth::roles::RoleMapping;
use fleetplane::auth::token::mint_token;
use fleetplane::dispatch::LoopbackDispatcher;
use fleetplane::fleet::registry::InMemoryRegistry;
use fleetplane::health::HealthAggregator;
use fleetplane::model::Worker;
use http_helpers::{get_request, json_request};
use std::collections::HashMap;
use std::sync::Arc;
use tower::ServiceExt;

const KEY: &str = "integration-signing-key";

fn build_app(custom_roles: HashMap<String, Vec<String>>) -> axum::Router {
    let registry = Arc::new(InMemoryRegistry::new(vec![
        Worker::new("server1").with_label("env", "prod"),
        Worker::new("server2").with_label("env", "staging"),
    ]));
    let dispatcher = Arc::new(LoopbackDispatcher::new(registry.clone()));
    let (audit_handle, _task) = spawn_recorder(Arc::new(InMemoryAuditStore::new()), 16);
    let state = AppState {
        auth: Arc::new(AuthConfig {
            signing_key: KEY.to_string(),
            roles: RoleMapping::new(custom_roles),
        }),
        registry,
        dispatcher,
        health: Arc::new(HealthAggregator::new(Vec::new())),
        audit: AuditLayer::new(audit_handle, Arc::new(vec!["/health".to_string()])),
    };
    build_router(state)
}

fn token(roles: &[&str], perms: &[&str]) -> String {
    mint_token(
        KEY,
        "alice",
        roles.iter().map(|s| s.to_string()).collect(),
        perms.iter().map(|s| s.to_string()).collect(),
        60,
    )
    .expect("mint")
}

#[tokio::test]
async fn missing_bearer_is_401() {
    let app = build_app(HashMap::new());
    let response = app
        .oneshot(get_request("/node/hostname", None))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = read_json(response).await;
    assert_eq!(body["error"], "Bearer token required");
}

#[tokio::test]
async fn garbage_token_is_401() {
    let app = build_app(HashMap::new());
    let response = app
        .oneshot(get_request("/node/hostname", Some("not-a-jwt")))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = read_json(response).await;
    let message = body["error"].as_str().expect("error message");
    assert!(message.starts_with("Invalid token:"), "got: {message}");
}

#[tokio::test]
async fn expired_token_is_401() {
    let app = build_app(HashMap::new());
    let expired = mint_token(KEY, "alice", vec!["admin".to_string()], vec![], -120).expect("mint");
    let response = app
        .oneshot(get_request("/node/hostname", Some(&expired)))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn read_role_covers_reads_but_not_writes() {
    let app = build_app(HashMap::new());
    let token = token(&["read"], &[]);

    for uri in ["/node/hostname", "/node/status", "/node/load", "/node/dns"] {
        let response = app
            .clone()
            .oneshot(get_request(uri, Some(&token)))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK, "GET {uri}");
    }

    let response = app
        .oneshot(json_request(
            "PUT",
            "/node/dns",
            Some(&token),
            serde_json::json!({"target": "server1", "servers": ["1.1.1.1"]}),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = read_json(response).await;
    let message = body["error"].as_str().expect("error message");
    // A denial names the missing grant so the operator can fix the token.
    assert!(message.contains("network:write"), "got: {message}");
}

#[tokio::test]
async fn write_role_covers_reads_and_writes() {
    let app = build_app(HashMap::new());
    let token = token(&["write"], &[]);

    let response = app
        .clone()
        .oneshot(get_request("/node/status", Some(&token)))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(json_request(
            "PUT",
            "/node/dns",
            Some(&token),
            serde_json::json!({"target": "server1", "servers": ["1.1.1.1"]}),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let response = app
        .oneshot(get_request("/health", Some(&token)))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn admin_role_covers_everything() {
    let app = build_app(HashMap::new());
    let token = token(&["admin"], &[]);

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/node/ping",
            Some(&token),
            serde_json::json!({"target": "server1", "destination": "10.0.0.1"}),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(get_request("/health", Some(&token)))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn unknown_role_grants_nothing() {
    let app = build_app(HashMap::new());
    let token = token(&["viewer"], &[]);
    let response = app
        .oneshot(get_request("/node/hostname", Some(&token)))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn direct_permissions_narrow_even_admin() {
    let app = build_app(HashMap::new());
    // The token holds admin, but its explicit grant list wins outright.
    let token = token(&["admin"], &["health:read"]);

    let response = app
        .clone()
        .oneshot(get_request("/health", Some(&token)))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(get_request("/node/status", Some(&token)))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn custom_role_shadows_builtin() {
    let custom = HashMap::from([("read".to_string(), vec!["network:read".to_string()])]);
    let app = build_app(custom);
    let token = token(&["read"], &[]);

    let response = app
        .clone()
        .oneshot(get_request("/node/dns", Some(&token)))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    // The built-in read expansion no longer applies once shadowed.
    let response = app
        .oneshot(get_request("/node/hostname", Some(&token)))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn custom_role_under_new_name() {
    let custom = HashMap::from([("auditor".to_string(), vec!["health:read".to_string()])]);
    let app = build_app(custom);
    let token = token(&["auditor"], &[]);

    let response = app
        .clone()
        .oneshot(get_request("/health", Some(&token)))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(get_request("/node/load", Some(&token)))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
