//! Per-endpoint latency health tracking.
//!
//! Each endpoint carries a running mean of every latency ever recorded for
//! it. Updates take the DashMap entry lock for the whole read-modify-write,
//! so recording against endpoint A never serializes with endpoint B.
//!
//! Cold-start bias is deliberate: `ensure_known` seeds an endpoint at
//! `avg_latency = 0.0`, so a never-used endpoint outranks every observed one
//! until its own first observation lands. This acts as a warm-up probe for
//! newly added backends.

use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone)]
struct EndpointHealth {
    avg_latency: f64,
    count: u64,
    /// Registration order, used for stable tie-breaking in `fastest()`.
    seq: u64,
}

/// Diagnostic view of one endpoint's health.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EndpointStatus {
    pub id: String,
    pub avg_latency: f64,
    pub count: u64,
}

#[derive(Debug, Default)]
pub struct EndpointRegistry {
    endpoints: DashMap<String, EndpointHealth>,
    next_seq: AtomicU64,
}

impl EndpointRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an endpoint with zero observations. No-op when already known.
    pub fn ensure_known(&self, id: &str) {
        self.endpoints
            .entry(id.to_string())
            .or_insert_with(|| EndpointHealth {
                avg_latency: 0.0,
                count: 0,
                seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
            });
    }

    /// Fold one observed latency (seconds) into the endpoint's running mean.
    /// Registers the endpoint first if it was unknown. The mean and the count
    /// move together under the entry lock.
    pub fn record(&self, id: &str, latency_secs: f64) {
        let mut entry = self
            .endpoints
            .entry(id.to_string())
            .or_insert_with(|| EndpointHealth {
                avg_latency: 0.0,
                count: 0,
                seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
            });
        let health = entry.value_mut();
        health.avg_latency =
            (health.avg_latency * health.count as f64 + latency_secs) / (health.count as f64 + 1.0);
        health.count += 1;
    }

    /// The endpoint with the smallest running mean; ties go to the earliest
    /// registered. `None` when the registry is empty.
    pub fn fastest(&self) -> Option<String> {
        let mut best: Option<(String, f64, u64)> = None;
        for entry in self.endpoints.iter() {
            let health = entry.value();
            let better = match &best {
                None => true,
                Some((_, avg, seq)) => {
                    health.avg_latency < *avg || (health.avg_latency == *avg && health.seq < *seq)
                }
            };
            if better {
                best = Some((entry.key().clone(), health.avg_latency, health.seq));
            }
        }
        best.map(|(id, _, _)| id)
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    /// `(avg_latency, count)` for one endpoint, if known.
    pub fn stats(&self, id: &str) -> Option<(f64, u64)> {
        self.endpoints
            .get(id)
            .map(|entry| (entry.avg_latency, entry.count))
    }

    /// Snapshot of all endpoints in registration order.
    pub fn snapshot(&self) -> Vec<EndpointStatus> {
        let mut all: Vec<(u64, EndpointStatus)> = self
            .endpoints
            .iter()
            .map(|entry| {
                (
                    entry.seq,
                    EndpointStatus {
                        id: entry.key().clone(),
                        avg_latency: entry.avg_latency,
                        count: entry.count,
                    },
                )
            })
            .collect();
        all.sort_by_key(|(seq, _)| *seq);
        all.into_iter().map(|(_, status)| status).collect()
    }
}

// ── Tests ───────────────────────────────────────────────────────
