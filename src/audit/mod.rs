//! Best-effort audit trail for authenticated requests.
//!
//! # Purpose and responsibility
//! Builds one [`AuditEntry`] per authenticated, non-excluded request after
//! the handler has produced its response, and hands it to the audit store on
//! a detached path. The decision to audit is synchronous; the write is not.
//!
//! # Key invariants and assumptions
//! - The caller's response is never affected by audit outcome: a full queue
//!   drops the entry with a warning, a store failure is logged and ignored.
//! - Unauthenticated requests and excluded path prefixes (health and metrics
//!   always among them) are never recorded.
//! - The background writer is detached from request cancellation; it drains
//!   entries after the response has already been sent.
use crate::auth::middleware::AuthContext;
use async_trait::async_trait;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Queue depth used when configuration does not supply one.
pub const DEFAULT_QUEUE_DEPTH: usize = 256;

#[derive(Debug, Error)]
pub enum AuditError {
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

pub type AuditResult<T> = Result<T, AuditError>;

/// One immutable audit record. Written once, never mutated; this service has
/// no read path for it beyond the store itself.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub user: String,
    pub roles: Vec<String>,
    pub method: String,
    pub path: String,
    pub source_ip: String,
    pub response_code: u16,
    pub duration_ms: u64,
}

/// Storage collaborator for audit entries. The list operation exists for
/// operator tooling and tests; the request pipeline only writes.
#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn write(&self, entry: AuditEntry) -> AuditResult<()>;
    async fn list(&self) -> AuditResult<Vec<AuditEntry>>;
}

/// In-memory audit store for local development and tests.
pub struct InMemoryAuditStore {
    entries: RwLock<Vec<AuditEntry>>,
}

impl InMemoryAuditStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }
}

impl Default for InMemoryAuditStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuditStore for InMemoryAuditStore {
    async fn write(&self, entry: AuditEntry) -> AuditResult<()> {
        self.entries.write().await.push(entry);
        Ok(())
    }

    async fn list(&self) -> AuditResult<Vec<AuditEntry>> {
        Ok(self.entries.read().await.clone())
    }
}

/// Cheap handle for enqueueing entries from request middleware.
#[derive(Clone)]
pub struct AuditHandle {
    tx: mpsc::Sender<AuditEntry>,
}

impl AuditHandle {
    /// Enqueue an entry without blocking the request path.
    ///
    /// Bound policy is drop: when the queue is full the entry is discarded
    /// with a warning and a counter bump rather than applying backpressure.
    pub fn record(&self, entry: AuditEntry) {
        if let Err(err) = self.tx.try_send(entry) {
            metrics::counter!("fleetplane_audit_dropped_total").increment(1);
            tracing::warn!(error = %err, "audit entry dropped");
        }
    }
}

/// Start the bounded background writer and return its enqueue handle.
///
/// The returned task runs until every handle is dropped and the channel
/// drains; aborting it on shutdown is safe because audit is best-effort.
pub fn spawn_recorder(
    store: Arc<dyn AuditStore>,
    queue_depth: usize,
) -> (AuditHandle, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel::<AuditEntry>(queue_depth.max(1));
    let task = tokio::spawn(async move {
        while let Some(entry) = rx.recv().await {
            if let Err(err) = store.write(entry).await {
                tracing::warn!(error = %err, "audit write failed");
            }
        }
    });
    (AuditHandle { tx }, task)
}

/// Middleware state: the enqueue handle plus the configured exclusion list.
#[derive(Clone)]
pub struct AuditLayer {
    handle: AuditHandle,
    excluded_prefixes: Arc<Vec<String>>,
}

impl AuditLayer {
    pub fn new(handle: AuditHandle, excluded_prefixes: Arc<Vec<String>>) -> Self {
        Self {
            handle,
            excluded_prefixes,
        }
    }

    fn is_excluded(&self, path: &str) -> bool {
        self.excluded_prefixes
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
    }
}

/// Response-side middleware entry point.
///
/// Runs outside the scope guard, which propagates the authenticated identity
/// on the response extensions once the handler is done.
pub async fn record_request(
    State(layer): State<AuditLayer>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let source_ip = source_ip(&request);
    let started = Instant::now();

    let response = next.run(request).await;

    if layer.is_excluded(&path) {
        return response;
    }
    let Some(context) = response.extensions().get::<AuthContext>() else {
        // Unauthenticated requests are never audited.
        return response;
    };

    layer.handle.record(AuditEntry {
        id: Uuid::new_v4(),
        timestamp: Utc::now(),
        user: context.subject.clone(),
        roles: context.roles.clone(),
        method,
        path,
        source_ip,
        response_code: response.status().as_u16(),
        duration_ms: started.elapsed().as_millis() as u64,
    });
    response
}

fn source_ip(request: &Request) -> String {
    // Prefer the proxy-supplied address; fall back to the socket peer when
    // the listener was built with connect info.
    if let Some(forwarded) = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
    {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }
    request
        .extensions()
        .get::<axum::extract::ConnectInfo<std::net::SocketAddr>>()
        .map(|info| info.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
