//! Fleet inventory and target resolution.
//!
//! # Purpose
//! Groups the worker registry trait with the single-vs-broadcast target
//! classification used by every dispatch endpoint.
pub mod registry;
pub mod target;
