//! HTTP API module.
//!
//! # Purpose
//! Exposes route handler modules and the shared target-classification helper
//! every dispatch endpoint runs before touching the façade.
pub mod error;
pub mod health;
pub mod node;
pub mod types;

use crate::api::error::{api_internal, api_validation_error, ApiError};
use crate::app::AppState;
use crate::fleet::target::{validate_target, Target, ValidationError};

/// A validated destination, ready for the façade.
pub(crate) enum Resolved {
    /// Dispatch to one worker; `None` lets the dispatcher pick any host.
    Single(Option<String>),
    Broadcast(crate::fleet::target::BroadcastSelector),
}

/// Validate the raw target parameter and classify it as single or broadcast.
///
/// Unknown explicit hostnames and label selectors matching no worker are
/// rejected here with a 400 so they never reach the dispatch façade.
pub(crate) async fn classify_target(state: &AppState, raw: &str) -> Result<Resolved, ApiError> {
    match validate_target(state.registry.as_ref(), raw).await {
        Ok(Target::AnyHost) => Ok(Resolved::Single(None)),
        Ok(Target::Host(hostname)) => Ok(Resolved::Single(Some(hostname))),
        Ok(Target::Broadcast(selector)) => Ok(Resolved::Broadcast(selector)),
        Err(err @ ValidationError::TargetNotFound) => Err(api_validation_error(&err.to_string())),
        Err(err @ ValidationError::Invalid(_)) => Err(api_validation_error(&err.to_string())),
        // A registry read failure is a dependency problem, not caller error.
        Err(err @ ValidationError::Registry(_)) => Err(api_internal(&err.to_string())),
    }
}
