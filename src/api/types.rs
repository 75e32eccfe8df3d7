//! HTTP API request/response types.
//!
//! # Purpose
//! Defines the shared payload shapes for dispatch endpoints. Single-target
//! and broadcast calls share one job correlation ID but differ in envelope:
//! a single response carries the resolved worker and its payload, a
//! broadcast response carries one entry per responding worker.
use crate::dispatch::broadcast::HostResult;
use crate::dispatch::JobId;
use serde::{Deserialize, Serialize};

/// Common query parameters for read dispatch endpoints.
#[derive(Debug, Deserialize)]
pub struct TargetQuery {
    #[serde(default)]
    pub target: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SingleResponse<T> {
    pub job_id: JobId,
    pub hostname: String,
    pub result: T,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BroadcastResponse<T> {
    pub job_id: JobId,
    pub hosts: Vec<HostResult<T>>,
}

/// Body of `PUT /node/dns`.
#[derive(Debug, Serialize, Deserialize)]
pub struct DnsUpdateRequest {
    #[serde(default)]
    pub target: Option<String>,
    pub servers: Vec<String>,
    #[serde(default)]
    pub search_domains: Vec<String>,
}

/// Body of `POST /node/ping`.
#[derive(Debug, Serialize, Deserialize)]
pub struct PingRequest {
    #[serde(default)]
    pub target: Option<String>,
    pub destination: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LivenessResponse {
    pub status: String,
}
