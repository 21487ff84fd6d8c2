//! loadlink — load-testing harness for inference-serving backends.
//!
//! Drives configurable request volume against one or more candidate
//! endpoints, aggregates per-user request telemetry under concurrent
//! writers, and adaptively routes traffic toward the empirically fastest
//! backend.

pub mod cli;
pub mod config;
pub mod errors;
pub mod metrics;
pub mod models;
pub mod routing;
pub mod store;
pub mod traffic;
