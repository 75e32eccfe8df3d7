//! Authentication and authorization modules.
//!
//! # Purpose
//! Groups bearer-token validation, the role-to-permission model, and the
//! per-route scope guard.
pub mod middleware;
pub mod roles;
pub mod token;
