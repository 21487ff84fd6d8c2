//! Concurrent metrics aggregation for one experiment.
//!
//! Many workers append completed-request records at once; buckets are
//! sharded per user in a DashMap so appends for different users never
//! contend. Concurrency counting is delegated to `ConcurrencyTracker`.
//! `report()` is a pure read and may be called mid-run for progress output;
//! mid-run reads are a best-effort snapshot, not a consistent cut.

use crate::errors::{HarnessError, Result};
use crate::metrics::tracker::ConcurrencyTracker;
use crate::models::record::RequestRecord;
use crate::models::report::{
    ExperimentConfig, ExperimentReport, MetricRow, ReportExport, UserReport,
};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Mutex;
use uuid::Uuid;

/// Per-user record buckets, partitioned strictly by the status-code success
/// test. Appends for one user serialize on the bucket's entry lock.
#[derive(Debug, Default)]
struct UserBucket {
    success: Vec<RequestRecord>,
    failures: Vec<RequestRecord>,
}

#[derive(Debug, Default)]
struct ExperimentMeta {
    config: Option<ExperimentConfig>,
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
}

pub struct MetricCollector {
    experiment_id: Uuid,
    buckets: DashMap<String, UserBucket>,
    tracker: ConcurrencyTracker,
    meta: Mutex<ExperimentMeta>,
}

impl Default for MetricCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricCollector {
    pub fn new() -> Self {
        Self {
            experiment_id: Uuid::new_v4(),
            buckets: DashMap::new(),
            tracker: ConcurrencyTracker::new(),
            meta: Mutex::new(ExperimentMeta::default()),
        }
    }

    /// Stable for the collector's lifetime.
    pub fn experiment_id(&self) -> Uuid {
        self.experiment_id
    }

    pub fn tracker(&self) -> &ConcurrencyTracker {
        &self.tracker
    }

    /// Mark one request in flight for `user_id`.
    pub fn begin_request(&self, user_id: &str) {
        self.tracker.begin(user_id);
    }

    /// Mark one request completed for `user_id`.
    pub fn end_request(&self, user_id: &str) {
        self.tracker.end(user_id);
    }

    /// Append one completed-request record. Status 200 lands in the user's
    /// success bucket, anything else in the failure bucket. No deduplication.
    #[allow(clippy::too_many_arguments)]
    pub fn add_metric(
        &self,
        user_id: &str,
        prompt: &str,
        status_code: u16,
        response_time: f64,
        prompt_token_count: u64,
        candidates_token_count: u64,
        total_token_count: u64,
    ) {
        let record = RequestRecord {
            prompt: prompt.to_string(),
            status_code,
            response_time,
            prompt_token_count,
            candidates_token_count,
            total_token_count,
        };
        let mut bucket = self.buckets.entry(user_id.to_string()).or_default();
        if record.is_success() {
            bucket.success.push(record);
        } else {
            bucket.failures.push(record);
        }
    }

    /// Attach the experiment configuration. Later calls overwrite, but
    /// configuring after `stop()` is a usage error.
    pub fn configure(&self, config: ExperimentConfig) -> Result<()> {
        let mut meta = self.meta.lock().expect("experiment meta poisoned");
        if meta.end_time.is_some() {
            return Err(HarnessError::Config(
                "configure() called after stop()".into(),
            ));
        }
        meta.config = Some(config);
        Ok(())
    }

    pub fn start(&self) {
        let mut meta = self.meta.lock().expect("experiment meta poisoned");
        meta.start_time = Some(Utc::now());
        tracing::info!(experiment_id = %self.experiment_id, "experiment started");
    }

    /// Close the experiment. Rejected when `start()` was never called, so an
    /// elapsed duration can never be undefined or negative.
    pub fn stop(&self) -> Result<()> {
        let mut meta = self.meta.lock().expect("experiment meta poisoned");
        if meta.start_time.is_none() {
            return Err(HarnessError::StopBeforeStart);
        }
        meta.end_time = Some(Utc::now());
        tracing::info!(experiment_id = %self.experiment_id, "experiment stopped");
        Ok(())
    }

    /// Summarize everything recorded so far. Pure read: two calls without an
    /// intervening `add_metric` produce identical reports.
    pub fn report(&self) -> ExperimentReport {
        let concurrency = self.tracker.snapshot();

        let mut users: Vec<UserReport> = Vec::with_capacity(self.buckets.len());
        let mut total_requests = 0u64;
        let mut failure_requests = 0u64;
        let mut total_response_time = 0.0f64;
        let mut total_tokens = 0u64;
        let mut total_prompt_tokens = 0u64;
        let mut total_candidates_tokens = 0u64;

        for entry in self.buckets.iter() {
            let bucket = entry.value();
            let user_requests = (bucket.success.len() + bucket.failures.len()) as u64;
            let user_failures = bucket.failures.len() as u64;
            let user_response_time: f64 = bucket
                .success
                .iter()
                .chain(bucket.failures.iter())
                .map(|r| r.response_time)
                .sum();
            // Token totals come from successful records only; failures carry
            // no usable usage metadata.
            let user_tokens: u64 = bucket.success.iter().map(|r| r.total_token_count).sum();
            let user_prompt_tokens: u64 =
                bucket.success.iter().map(|r| r.prompt_token_count).sum();
            let user_candidates_tokens: u64 = bucket
                .success
                .iter()
                .map(|r| r.candidates_token_count)
                .sum();

            let in_flight = concurrency.per_user.get(entry.key()).cloned().unwrap_or_default();

            users.push(UserReport {
                user_id: entry.key().clone(),
                total_requests: user_requests,
                total_response_time: user_response_time,
                average_response_time: safe_div(user_response_time, user_requests as f64),
                requests_per_second: safe_div(user_requests as f64, user_response_time),
                total_tokens: user_tokens,
                average_tokens_per_request: safe_div(user_tokens as f64, user_requests as f64),
                failure_count: user_failures,
                current_in_flight: in_flight.current,
                peak_in_flight: in_flight.peak,
            });

            total_requests += user_requests;
            failure_requests += user_failures;
            total_response_time += user_response_time;
            total_tokens += user_tokens;
            total_prompt_tokens += user_prompt_tokens;
            total_candidates_tokens += user_candidates_tokens;
        }

        users.sort_by(|a, b| a.user_id.cmp(&b.user_id));

        let meta = self.meta.lock().expect("experiment meta poisoned");
        ExperimentReport {
            experiment_id: self.experiment_id,
            start_time: meta.start_time,
            end_time: meta.end_time,
            config: meta.config.clone(),
            users,
            total_requests,
            success_requests: total_requests - failure_requests,
            failure_requests,
            total_response_time,
            average_response_time: safe_div(total_response_time, total_requests as f64),
            average_rps: safe_div(total_requests as f64, total_response_time),
            total_tokens,
            average_tokens_per_request: safe_div(total_tokens as f64, total_requests as f64),
            total_prompt_tokens,
            total_candidates_tokens,
            peak_concurrent_requests: concurrency.peak,
            current_concurrent_requests: concurrency.current,
        }
    }

    /// Flatten the experiment into persistence rows. Requires a configured
    /// experiment; call after `stop()` for a complete export.
    pub fn export(&self) -> Result<ReportExport> {
        let report = self.report();
        let config = report
            .config
            .clone()
            .ok_or_else(|| HarnessError::Config("export() before configure()".into()))?;

        let concurrency = self.tracker.snapshot();
        let mut metrics: Vec<MetricRow> = Vec::new();
        for entry in self.buckets.iter() {
            let in_flight = concurrency
                .per_user
                .get(entry.key())
                .map(|u| u.current)
                .unwrap_or(0);
            for record in entry.success.iter().chain(entry.failures.iter()) {
                metrics.push(MetricRow {
                    experiment_id: self.experiment_id,
                    user_id: entry.key().clone(),
                    prompt: record.prompt.clone(),
                    status_code: record.status_code,
                    response_time: record.response_time,
                    prompt_token_count: record.prompt_token_count,
                    candidates_token_count: record.candidates_token_count,
                    total_token_count: record.total_token_count,
                    concurrent_requests: in_flight,
                });
            }
        }
        metrics.sort_by(|a, b| a.user_id.cmp(&b.user_id));

        Ok(ReportExport {
            experiment: report.experiment_row(&config),
            metrics,
        })
    }
}

fn safe_div(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

// ── Tests ───────────────────────────────────────────────────────
