//! Fleetplane library crate.
//!
//! # Purpose
//! Exposes the control-plane API surface, authorization helpers,
//! configuration, dispatch, audit, and health aggregation for use by the
//! binary and tests.
//!
//! # Notes
//! Module boundaries mirror the request pipeline: auth guards in front,
//! dispatch behind, audit and health on the side.
pub mod api;
pub mod app;
pub mod audit;
pub mod auth;
pub mod config;
pub mod dispatch;
pub mod fleet;
pub mod health;
pub mod model;
pub mod observability;
