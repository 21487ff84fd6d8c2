//! Persistence sinks for experiment exports.
//!
//! Writes are best-effort: each batch gets exactly one attempt and failures
//! are isolated per batch, so a bad metrics chunk neither aborts its
//! siblings nor invalidates the in-memory report.

use crate::errors::{HarnessError, Result};
use crate::models::report::{ExperimentRow, MetricRow, ReportExport};
use async_trait::async_trait;
use std::sync::Mutex;

pub mod jsonl;

/// Metric rows are written in chunks of this size so one rejected chunk
/// does not take the rest down with it.
const METRIC_BATCH_SIZE: usize = 500;

#[async_trait]
pub trait ReportSink: Send + Sync {
    async fn write_experiment(&self, row: &ExperimentRow) -> Result<()>;
    async fn write_metrics(&self, rows: &[MetricRow]) -> Result<()>;
}

/// Push a full export through a sink, one attempt per batch. Returns an
/// error naming every failed batch; successful batches stay written.
pub async fn persist(sink: &dyn ReportSink, export: &ReportExport) -> Result<()> {
    let mut failures: Vec<String> = Vec::new();

    if let Err(e) = sink.write_experiment(&export.experiment).await {
        tracing::error!(error = %e, "experiment row write failed");
        failures.push(format!("experiment row: {e}"));
    }

    for (i, chunk) in export.metrics.chunks(METRIC_BATCH_SIZE).enumerate() {
        if let Err(e) = sink.write_metrics(chunk).await {
            tracing::error!(batch = i, error = %e, "metric batch write failed");
            failures.push(format!("metric batch {i}: {e}"));
        }
    }

    if failures.is_empty() {
        Ok(())
    } else {
        Err(HarnessError::Sink(failures.join("; ")))
    }
}

/// In-memory sink for tests and diagnostics.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub experiments: Mutex<Vec<ExperimentRow>>,
    pub metrics: Mutex<Vec<MetricRow>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReportSink for MemorySink {
    async fn write_experiment(&self, row: &ExperimentRow) -> Result<()> {
        self.experiments
            .lock()
            .expect("memory sink poisoned")
            .push(row.clone());
        Ok(())
    }

    async fn write_metrics(&self, rows: &[MetricRow]) -> Result<()> {
        self.metrics
            .lock()
            .expect("memory sink poisoned")
            .extend_from_slice(rows);
        Ok(())
    }
}

// ── Tests ───────────────────────────────────────────────────────
