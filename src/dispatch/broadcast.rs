//! Broadcast result aggregation.
//!
//! Merges a façade's per-host payload and error maps into one ordered list of
//! entries. One unreachable worker must never fail the whole fleet query, so
//! the merged list always travels inside a success envelope.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One worker's slice of a broadcast response: either a payload or the
/// verbatim error string the façade reported for it, never both.
///
/// The payload serializes as `result`, matching the single-target envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostResult<T> {
    pub hostname: String,
    #[serde(rename = "result", skip_serializing_if = "Option::is_none")]
    pub payload: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Merge per-host payloads and errors into entries sorted by hostname.
///
/// Any host appearing in either map gets exactly one entry. Should a façade
/// ever report a host in both maps, the error wins and the payload is
/// dropped, preserving the disjointness invariant for callers.
pub fn aggregate_broadcast<T>(
    payloads: BTreeMap<String, T>,
    errors: BTreeMap<String, String>,
) -> Vec<HostResult<T>> {
    let mut merged: BTreeMap<String, HostResult<T>> = BTreeMap::new();
    for (hostname, payload) in payloads {
        merged.insert(
            hostname.clone(),
            HostResult {
                hostname,
                payload: Some(payload),
                error: None,
            },
        );
    }
    for (hostname, error) in errors {
        merged.insert(
            hostname.clone(),
            HostResult {
                hostname,
                payload: None,
                error: Some(error),
            },
        );
    }
    merged.into_values().collect()
}
