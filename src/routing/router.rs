//! Adaptive endpoint selection over the health registry.
//!
//! Workers ask `route()` for a target before every request and feed the
//! measured latency back through `report_outcome()` once it completes.
//!
//! Failure feedback policy: outcomes are reported for every completed call,
//! including non-200 responses and transport failures, using the elapsed
//! time up to failure. A timing-out endpoint therefore accumulates its full
//! timeout in the mean instead of coasting on a stale fast average.

use crate::errors::{HarnessError, Result};
use crate::routing::registry::EndpointRegistry;
use std::sync::Arc;

pub struct AdaptiveRouter {
    registry: Arc<EndpointRegistry>,
}

impl AdaptiveRouter {
    pub fn new(registry: Arc<EndpointRegistry>) -> Self {
        Self { registry }
    }

    /// Seed one candidate backend. Idempotent: re-registering a known
    /// address leaves its history untouched.
    pub fn register(&self, address: &str, region: &str) {
        self.registry.ensure_known(address);
        tracing::info!(address, region, "registered endpoint");
    }

    /// The historically fastest endpoint for the next request. Errors while
    /// no endpoint is registered; the caller decides whether to retry.
    pub fn route(&self) -> Result<String> {
        self.registry.fastest().ok_or(HarnessError::NoBackend)
    }

    /// Feed one observed latency back into the registry. Never fails: an
    /// unknown endpoint is registered on the spot.
    pub fn report_outcome(&self, address: &str, latency_secs: f64) {
        self.registry.record(address, latency_secs);
    }

    pub fn registry(&self) -> &EndpointRegistry {
        &self.registry
    }
}

// ── Tests ───────────────────────────────────────────────────────
