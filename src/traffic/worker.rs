//! The traffic driver: simulated users firing prompts at routed backends.
//!
//! Each user is an async task, ramped in at `spawn_rate` users per second.
//! A user loops over the prompt list until the run-time budget (or an
//! iteration cap) is hit, asking the router for a target before every
//! request and reporting the outcome to both the collector and the router.

use crate::errors::Result;
use crate::metrics::MetricCollector;
use crate::models::record::TRANSPORT_FAILURE_STATUS;
use crate::routing::AdaptiveRouter;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct TrafficOptions {
    pub users: u32,
    pub spawn_rate: u32,
    pub run_time: Duration,
    /// Stop each user after this many passes over the prompt list, even if
    /// run time remains. Mainly for deterministic tests.
    pub iterations: Option<u64>,
    /// Random think-time range in seconds between requests; `None` disables.
    pub think_time: Option<(f64, f64)>,
    pub request_timeout: Duration,
}

impl Default for TrafficOptions {
    fn default() -> Self {
        Self {
            users: 1,
            spawn_rate: 1,
            run_time: Duration::from_secs(60),
            iterations: None,
            think_time: Some((0.5, 2.5)),
            request_timeout: Duration::from_secs(30),
        }
    }
}

struct WorkerContext {
    client: reqwest::Client,
    collector: Arc<MetricCollector>,
    router: Arc<AdaptiveRouter>,
    prompts: Vec<String>,
    options: TrafficOptions,
}

/// Drive the full load run: spawn `users` workers and wait for all of them
/// to finish their budget.
pub async fn run_load(
    collector: Arc<MetricCollector>,
    router: Arc<AdaptiveRouter>,
    prompts: Vec<String>,
    options: TrafficOptions,
) -> Result<()> {
    if prompts.is_empty() {
        return Err(crate::errors::HarnessError::Config(
            "no prompts to send".into(),
        ));
    }

    let client = reqwest::Client::builder()
        .timeout(options.request_timeout)
        .build()
        .map_err(|e| anyhow::anyhow!("http client: {e}"))?;

    let context = Arc::new(WorkerContext {
        client,
        collector,
        router,
        prompts,
        options: options.clone(),
    });

    let spawn_rate = options.spawn_rate.max(1);
    let deadline = Instant::now() + options.run_time;

    let mut handles = Vec::with_capacity(options.users as usize);
    for index in 0..options.users {
        let context = context.clone();
        let user_id = format!("user-{index}");
        let start_delay = Duration::from_secs_f64(index as f64 / spawn_rate as f64);
        handles.push(tokio::spawn(async move {
            tokio::time::sleep(start_delay).await;
            run_user(context, user_id, deadline).await;
        }));
    }

    for result in futures::future::join_all(handles).await {
        if let Err(e) = result {
            tracing::error!(error = %e, "worker task panicked");
        }
    }
    Ok(())
}

async fn run_user(context: Arc<WorkerContext>, user_id: String, deadline: Instant) {
    let mut iterations = 0u64;
    'run: loop {
        if let Some(cap) = context.options.iterations {
            if iterations >= cap {
                break;
            }
        }
        for prompt in &context.prompts {
            if Instant::now() >= deadline {
                break 'run;
            }
            let target = match context.router.route() {
                Ok(target) => target,
                Err(e) => {
                    tracing::warn!(user = %user_id, error = %e, "routing failed, worker exits");
                    break 'run;
                }
            };
            send_prompt(&context, &user_id, &target, prompt).await;

            if let Some((low, high)) = context.options.think_time {
                let wait = { rand::thread_rng().gen_range(low..high) };
                tokio::time::sleep(Duration::from_secs_f64(wait)).await;
            }
        }
        iterations += 1;
    }
}

async fn send_prompt(context: &WorkerContext, user_id: &str, target: &str, prompt: &str) {
    let url = request_url(target);
    context.collector.begin_request(user_id);
    let started = Instant::now();
    let outcome = context
        .client
        .post(&url)
        .json(&serde_json::json!({ "prompt": prompt }))
        .send()
        .await;
    let elapsed = started.elapsed().as_secs_f64();
    context.collector.end_request(user_id);

    match outcome {
        Ok(response) => {
            let status = response.status().as_u16();
            let (prompt_tokens, candidates_tokens, total_tokens) = if status == 200 {
                let body: serde_json::Value = response.json().await.unwrap_or_default();
                token_counts(&body)
            } else {
                (0, 0, 0)
            };
            context.collector.add_metric(
                user_id,
                prompt,
                status,
                elapsed,
                prompt_tokens,
                candidates_tokens,
                total_tokens,
            );
            context.router.report_outcome(target, elapsed);
            tracing::debug!(user = %user_id, status, elapsed, "request complete");
        }
        Err(e) => {
            // Transport failure: record it so request totals stay accurate,
            // and feed the elapsed time back so a dead backend cannot keep
            // a stale fast average.
            context.collector.add_metric(
                user_id,
                prompt,
                TRANSPORT_FAILURE_STATUS,
                elapsed,
                0,
                0,
                0,
            );
            context.router.report_outcome(target, elapsed);
            tracing::warn!(user = %user_id, error = %e, elapsed, "request failed");
        }
    }
}

/// A registry entry is either a full URL or a bare `host:port` address, in
/// which case the conventional generation path is appended.
pub fn request_url(target: &str) -> String {
    if target.starts_with("http://") || target.starts_with("https://") {
        target.to_string()
    } else {
        format!("http://{target}/generate-response")
    }
}

/// Token usage from a generation response body; 0 for anything absent.
pub fn token_counts(body: &serde_json::Value) -> (u64, u64, u64) {
    let usage = &body["response"];
    (
        usage["prompt_token_count"].as_u64().unwrap_or(0),
        usage["candidates_token_count"].as_u64().unwrap_or(0),
        usage["total_token_count"].as_u64().unwrap_or(0),
    )
}

// ── Tests ───────────────────────────────────────────────────────
