use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use loadlink::cli::{Cli, Commands};
use loadlink::config::{self, RunPlan};
use loadlink::metrics::MetricCollector;
use loadlink::models::report::ExperimentConfig;
use loadlink::routing::{AdaptiveRouter, EndpointRegistry};
use loadlink::store::{self, jsonl::JsonlSink};
use loadlink::traffic::{self, TrafficOptions};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "loadlink=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = config::load()?;
    let args = Cli::parse();

    match args.command {
        Commands::Run {
            plan,
            users,
            spawn_rate,
            run_time,
            out,
        } => {
            let users = users.unwrap_or(cfg.default_users);
            let spawn_rate = spawn_rate.unwrap_or(cfg.default_spawn_rate);
            let run_time = run_time.unwrap_or_else(|| cfg.default_run_time.clone());
            let out = out.unwrap_or_else(|| PathBuf::from(&cfg.results_dir));
            let timeout = std::time::Duration::from_secs(cfg.request_timeout_secs);

            run_experiment(plan, users, spawn_rate, run_time, out, timeout).await
        }
    }
}

async fn run_experiment(
    plan_path: PathBuf,
    users: u32,
    spawn_rate: u32,
    run_time: String,
    out: PathBuf,
    request_timeout: std::time::Duration,
) -> anyhow::Result<()> {
    let plan = RunPlan::load(&plan_path)?;
    let run_budget = config::parse_run_time(&run_time)?;

    let registry = Arc::new(EndpointRegistry::new());
    let router = Arc::new(AdaptiveRouter::new(registry));
    for candidate in plan.targets() {
        router.register(&candidate.address, &candidate.region);
    }

    let collector = Arc::new(MetricCollector::new());
    collector.configure(ExperimentConfig {
        users,
        spawn_rate,
        run_time: run_time.clone(),
        host: plan.host(),
        endpoint: plan.primary_endpoint(),
    })?;

    tracing::info!(
        experiment_id = %collector.experiment_id(),
        users,
        spawn_rate,
        run_time = %run_time,
        prompts = plan.prompts.len(),
        endpoints = plan.targets().len(),
        "starting load test"
    );

    collector.start();
    traffic::run_load(
        collector.clone(),
        router.clone(),
        plan.prompts.clone(),
        TrafficOptions {
            users,
            spawn_rate,
            run_time: run_budget,
            request_timeout,
            ..TrafficOptions::default()
        },
    )
    .await?;
    collector.stop()?;

    let report = collector.report();
    println!("{}", report.render_text());

    for status in router.registry().snapshot() {
        tracing::info!(
            endpoint = %status.id,
            avg_latency = status.avg_latency,
            observations = status.count,
            "endpoint health"
        );
    }

    // Persistence is best-effort: a failed write is reported but never
    // invalidates the in-memory report above.
    let export = collector.export()?;
    let sink = JsonlSink::new(&out);
    match store::persist(&sink, &export).await {
        Ok(()) => {
            tracing::info!(dir = %sink.dir().display(), "results exported");
        }
        Err(e) => {
            tracing::error!(error = %e, "export failed; results above remain valid");
        }
    }

    Ok(())
}
