//! Experiment report types and the flat export rows handed to a sink.
//!
//! `ExperimentReport` is the in-memory summary produced by
//! `MetricCollector::report()`; `ExperimentRow`/`MetricRow` mirror the
//! persistence schema (`experiments` and `metrics` tables) one row each.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use uuid::Uuid;

/// Configuration snapshot attached to an experiment before traffic starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentConfig {
    pub users: u32,
    pub spawn_rate: u32,
    pub run_time: String,
    pub host: String,
    pub endpoint: String,
}

/// Per-user rollup of everything that user's workers recorded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserReport {
    pub user_id: String,
    pub total_requests: u64,
    /// Sum of response times across success and failure records, seconds.
    pub total_response_time: f64,
    pub average_response_time: f64,
    /// `total_requests / total_response_time`; 0 when no time elapsed.
    pub requests_per_second: f64,
    /// Token totals count successful records only.
    pub total_tokens: u64,
    pub average_tokens_per_request: f64,
    pub failure_count: u64,
    pub current_in_flight: u64,
    pub peak_in_flight: u64,
}

/// Immutable experiment summary: aggregate figures are sums and derived
/// means across all users, not user-averaged.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExperimentReport {
    pub experiment_id: Uuid,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub config: Option<ExperimentConfig>,
    /// Per-user rollups, ordered by user id.
    pub users: Vec<UserReport>,
    pub total_requests: u64,
    pub success_requests: u64,
    pub failure_requests: u64,
    pub total_response_time: f64,
    pub average_response_time: f64,
    pub average_rps: f64,
    pub total_tokens: u64,
    pub average_tokens_per_request: f64,
    pub total_prompt_tokens: u64,
    pub total_candidates_tokens: u64,
    pub peak_concurrent_requests: u64,
    pub current_concurrent_requests: u64,
}

impl ExperimentReport {
    /// Flatten the summary into one persistence row. `users`, `spawn_rate`,
    /// `run_time`, `host` and `endpoint` come from the config snapshot.
    pub fn experiment_row(&self, config: &ExperimentConfig) -> ExperimentRow {
        let avg = |tokens: u64| -> u64 {
            if self.total_requests > 0 {
                (tokens as f64 / self.total_requests as f64).round() as u64
            } else {
                0
            }
        };
        ExperimentRow {
            experiment_id: self.experiment_id,
            start_time: self.start_time,
            end_time: self.end_time,
            total_requests: self.total_requests,
            success_requests: self.success_requests,
            failure_requests: self.failure_requests,
            average_rps: self.average_rps,
            average_response_time: self.average_response_time,
            users: config.users,
            spawn_rate: config.spawn_rate,
            run_time: config.run_time.clone(),
            host: config.host.clone(),
            endpoint: config.endpoint.clone(),
            average_prompt_tokens: avg(self.total_prompt_tokens),
            average_response_tokens: avg(self.total_candidates_tokens),
            total_token_count: self.total_tokens,
        }
    }

    /// Human-readable summary printed at run end.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Experiment {}", self.experiment_id);
        for user in &self.users {
            let _ = writeln!(out, "\nUser {}:", user.user_id);
            let _ = writeln!(out, "  Total Requests: {}", user.total_requests);
            let _ = writeln!(
                out,
                "  Total Response Time: {:.4} s",
                user.total_response_time
            );
            let _ = writeln!(
                out,
                "  Average Response Time: {:.4} s",
                user.average_response_time
            );
            let _ = writeln!(
                out,
                "  Requests Per Second (RPS): {:.4}",
                user.requests_per_second
            );
            let _ = writeln!(out, "  Total Tokens: {}", user.total_tokens);
            let _ = writeln!(
                out,
                "  Average Tokens Per Request: {:.4}",
                user.average_tokens_per_request
            );
            let _ = writeln!(out, "  Total Failures: {}", user.failure_count);
            let _ = writeln!(out, "  Peak Concurrent Requests: {}", user.peak_in_flight);
        }
        let _ = writeln!(out, "\nOverall:");
        let _ = writeln!(out, "  Total Requests: {}", self.total_requests);
        let _ = writeln!(
            out,
            "  Total Response Time: {:.4} s",
            self.total_response_time
        );
        let _ = writeln!(
            out,
            "  Average Response Time: {:.4} s",
            self.average_response_time
        );
        let _ = writeln!(out, "  Requests Per Second (RPS): {:.4}", self.average_rps);
        let _ = writeln!(out, "  Total Tokens Processed: {}", self.total_tokens);
        let _ = writeln!(
            out,
            "  Average Tokens Per Request: {:.4}",
            self.average_tokens_per_request
        );
        let _ = writeln!(out, "  Total Failures: {}", self.failure_requests);
        let _ = writeln!(
            out,
            "  Peak Concurrent Requests: {}",
            self.peak_concurrent_requests
        );
        out
    }
}

/// One row in the `experiments` export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentRow {
    pub experiment_id: Uuid,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub total_requests: u64,
    pub success_requests: u64,
    pub failure_requests: u64,
    pub average_rps: f64,
    pub average_response_time: f64,
    pub users: u32,
    pub spawn_rate: u32,
    pub run_time: String,
    pub host: String,
    pub endpoint: String,
    pub average_prompt_tokens: u64,
    pub average_response_tokens: u64,
    pub total_token_count: u64,
}

/// One row per `RequestRecord` in the `metrics` export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRow {
    pub experiment_id: Uuid,
    pub user_id: String,
    pub prompt: String,
    pub status_code: u16,
    pub response_time: f64,
    pub prompt_token_count: u64,
    pub candidates_token_count: u64,
    pub total_token_count: u64,
    /// The user's in-flight count at export time.
    pub concurrent_requests: u64,
}

/// Full export handed to a `ReportSink`: one experiment row plus the flat
/// list of per-request rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportExport {
    pub experiment: ExperimentRow,
    pub metrics: Vec<MetricRow>,
}

// ── Tests ───────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> ExperimentReport {
        ExperimentReport {
            experiment_id: Uuid::new_v4(),
            start_time: Some(Utc::now()),
            end_time: Some(Utc::now()),
            config: None,
            users: vec![],
            total_requests: 4,
            success_requests: 3,
            failure_requests: 1,
            total_response_time: 2.0,
            average_response_time: 0.5,
            average_rps: 2.0,
            total_tokens: 60,
            average_tokens_per_request: 15.0,
            total_prompt_tokens: 21,
            total_candidates_tokens: 39,
            peak_concurrent_requests: 2,
            current_concurrent_requests: 0,
        }
    }

    fn config() -> ExperimentConfig {
        ExperimentConfig {
            users: 3,
            spawn_rate: 1,
            run_time: "60s".into(),
            host: "http://backend".into(),
            endpoint: "http://backend/generate-response".into(),
        }
    }

    #[test]
    fn test_experiment_row_rounds_token_averages() {
        let row = report().experiment_row(&config());
        // 21 / 4 = 5.25 → 5, 39 / 4 = 9.75 → 10
        assert_eq!(row.average_prompt_tokens, 5);
        assert_eq!(row.average_response_tokens, 10);
        assert_eq!(row.total_token_count, 60);
        assert_eq!(row.run_time, "60s");
    }

    #[test]
    fn test_experiment_row_zero_requests() {
        let mut rpt = report();
        rpt.total_requests = 0;
        let row = rpt.experiment_row(&config());
        assert_eq!(row.average_prompt_tokens, 0);
        assert_eq!(row.average_response_tokens, 0);
    }

    #[test]
    fn test_render_text_mentions_totals() {
        let text = report().render_text();
        assert!(text.contains("Total Requests: 4"));
        assert!(text.contains("Peak Concurrent Requests: 2"));
    }

    #[test]
    fn test_metric_row_serializes_schema_fields() {
        let row = MetricRow {
            experiment_id: Uuid::new_v4(),
            user_id: "user-1".into(),
            prompt: "hello".into(),
            status_code: 200,
            response_time: 0.25,
            prompt_token_count: 10,
            candidates_token_count: 5,
            total_token_count: 15,
            concurrent_requests: 1,
        };
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["status_code"], 200);
        assert_eq!(json["candidates_token_count"], 5);
        assert_eq!(json["concurrent_requests"], 1);
    }
}
