//! JSON Lines sink: one `experiments.jsonl` and one `metrics.jsonl` per
//! results directory, appended to across runs.

use crate::errors::{HarnessError, Result};
use crate::models::report::{ExperimentRow, MetricRow};
use crate::store::ReportSink;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

pub struct JsonlSink {
    dir: PathBuf,
}

impl JsonlSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    async fn append_lines(&self, file: &str, lines: Vec<String>) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let mut handle = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.dir.join(file))
            .await?;
        for line in lines {
            handle.write_all(line.as_bytes()).await?;
            handle.write_all(b"\n").await?;
        }
        handle.flush().await?;
        Ok(())
    }

    pub fn experiments_path(&self) -> PathBuf {
        self.dir.join("experiments.jsonl")
    }

    pub fn metrics_path(&self) -> PathBuf {
        self.dir.join("metrics.jsonl")
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl ReportSink for JsonlSink {
    async fn write_experiment(&self, row: &ExperimentRow) -> Result<()> {
        let line = serde_json::to_string(row)
            .map_err(|e| HarnessError::Sink(format!("experiment row encode: {e}")))?;
        self.append_lines("experiments.jsonl", vec![line]).await
    }

    async fn write_metrics(&self, rows: &[MetricRow]) -> Result<()> {
        let mut lines = Vec::with_capacity(rows.len());
        for row in rows {
            lines.push(
                serde_json::to_string(row)
                    .map_err(|e| HarnessError::Sink(format!("metric row encode: {e}")))?,
            );
        }
        self.append_lines("metrics.jsonl", lines).await
    }
}

// ── Tests ───────────────────────────────────────────────────────
