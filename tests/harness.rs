//! End-to-end tests: simulated users driving traffic at mock backends
//! through the adaptive router, with the collector aggregating results.
//!
//! Requires nothing external; backends are wiremock servers.

use std::sync::Arc;
use std::time::Duration;

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use loadlink::metrics::MetricCollector;
use loadlink::models::report::ExperimentConfig;
use loadlink::routing::{AdaptiveRouter, EndpointRegistry};
use loadlink::store::{persist, MemorySink};
use loadlink::traffic::{run_load, TrafficOptions};

fn generation_response(prompt_tokens: u64, candidates_tokens: u64) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "response": {
            "prompt_token_count": prompt_tokens,
            "candidates_token_count": candidates_tokens,
            "total_token_count": prompt_tokens + candidates_tokens,
        }
    }))
}

fn router_with(targets: &[&str]) -> Arc<AdaptiveRouter> {
    let router = Arc::new(AdaptiveRouter::new(Arc::new(EndpointRegistry::new())));
    for target in targets {
        router.register(target, "local");
    }
    router
}

fn options(users: u32, iterations: u64) -> TrafficOptions {
    TrafficOptions {
        users,
        spawn_rate: users.max(1),
        run_time: Duration::from_secs(30),
        iterations: Some(iterations),
        think_time: None,
        request_timeout: Duration::from_secs(5),
    }
}

fn experiment_config(users: u32, endpoint: &str, host: &str) -> ExperimentConfig {
    ExperimentConfig {
        users,
        spawn_rate: users,
        run_time: "30s".into(),
        host: host.to_string(),
        endpoint: endpoint.to_string(),
    }
}

#[tokio::test]
async fn test_three_users_two_prompts_single_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/generate-response"))
        .respond_with(generation_response(10, 5))
        .mount(&server)
        .await;

    let endpoint = format!("{}/generate-response", server.uri());
    let router = router_with(&[&endpoint]);
    let collector = Arc::new(MetricCollector::new());
    collector
        .configure(experiment_config(3, &endpoint, &server.uri()))
        .unwrap();

    collector.start();
    run_load(
        collector.clone(),
        router.clone(),
        vec!["Hello, how are you?".into(), "Tell me a joke.".into()],
        options(3, 1),
    )
    .await
    .unwrap();
    collector.stop().unwrap();

    let report = collector.report();
    assert_eq!(report.users.len(), 3);
    for user in &report.users {
        assert_eq!(user.total_requests, 2);
        assert_eq!(user.total_tokens, 30);
        assert_eq!(user.failure_count, 0);
        assert!((user.average_tokens_per_request - 15.0).abs() < 1e-9);
    }
    assert_eq!(report.total_requests, 6);
    assert_eq!(report.success_requests, 6);
    assert_eq!(report.total_tokens, 90);
    assert!((report.average_tokens_per_request - 15.0).abs() < 1e-9);
    assert!(report.peak_concurrent_requests >= 1);
    assert_eq!(report.current_concurrent_requests, 0);

    // The router saw every request.
    let (_, count) = router.registry().stats(&endpoint).unwrap();
    assert_eq!(count, 6);

    // Full export lands in the sink with one row per request.
    let export = collector.export().unwrap();
    let sink = MemorySink::new();
    persist(&sink, &export).await.unwrap();
    assert_eq!(sink.experiments.lock().unwrap().len(), 1);
    assert_eq!(sink.metrics.lock().unwrap().len(), 6);
    let experiment = &sink.experiments.lock().unwrap()[0];
    assert_eq!(experiment.total_requests, 6);
    assert_eq!(experiment.total_token_count, 90);
    assert_eq!(experiment.average_prompt_tokens, 10);
    assert_eq!(experiment.average_response_tokens, 5);
}

#[tokio::test]
async fn test_non_200_responses_become_failure_records() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/generate-response"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let endpoint = format!("{}/generate-response", server.uri());
    let router = router_with(&[&endpoint]);
    let collector = Arc::new(MetricCollector::new());
    collector.start();

    run_load(
        collector.clone(),
        router.clone(),
        vec!["p".into()],
        options(1, 2),
    )
    .await
    .unwrap();
    collector.stop().unwrap();

    let report = collector.report();
    assert_eq!(report.total_requests, 2);
    assert_eq!(report.failure_requests, 2);
    assert_eq!(report.success_requests, 0);
    assert_eq!(report.total_tokens, 0);
    // Failure latencies still feed the router.
    let (_, count) = router.registry().stats(&endpoint).unwrap();
    assert_eq!(count, 2);
}

#[tokio::test]
async fn test_transport_failure_recorded_with_sentinel_status() {
    // Nothing listens here; connections fail outright.
    let endpoint = "http://127.0.0.1:1/generate-response".to_string();
    let router = router_with(&[&endpoint]);
    let collector = Arc::new(MetricCollector::new());
    collector
        .configure(experiment_config(1, &endpoint, "http://127.0.0.1:1"))
        .unwrap();
    collector.start();

    run_load(
        collector.clone(),
        router.clone(),
        vec!["p".into()],
        options(1, 1),
    )
    .await
    .unwrap();
    collector.stop().unwrap();

    let report = collector.report();
    assert_eq!(report.total_requests, 1);
    assert_eq!(report.failure_requests, 1);

    let export = collector.export().unwrap();
    assert_eq!(export.metrics.len(), 1);
    assert_eq!(export.metrics[0].status_code, 0);
    assert_eq!(export.metrics[0].total_token_count, 0);

    // The failed call's elapsed time was fed back to the registry.
    let (_, count) = router.registry().stats(&endpoint).unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn test_routing_converges_on_faster_backend() {
    let slow = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/generate-response"))
        .respond_with(generation_response(1, 1).set_delay(Duration::from_millis(250)))
        .mount(&slow)
        .await;

    let fast = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/generate-response"))
        .respond_with(generation_response(1, 1))
        .mount(&fast)
        .await;

    let slow_endpoint = format!("{}/generate-response", slow.uri());
    let fast_endpoint = format!("{}/generate-response", fast.uri());
    // Register the slow backend first so cold-start ties favor it.
    let router = router_with(&[&slow_endpoint, &fast_endpoint]);
    let collector = Arc::new(MetricCollector::new());
    collector.start();

    run_load(
        collector.clone(),
        router.clone(),
        vec!["p1".into(), "p2".into()],
        options(1, 4),
    )
    .await
    .unwrap();
    collector.stop().unwrap();

    // Both backends were probed (cold-start warm-up), then traffic settled
    // on the faster one.
    let (slow_avg, slow_count) = router.registry().stats(&slow_endpoint).unwrap();
    let (fast_avg, fast_count) = router.registry().stats(&fast_endpoint).unwrap();
    assert!(slow_count >= 1);
    assert!(fast_count >= 1);
    assert!(slow_count + fast_count == 8);
    assert!(fast_avg < slow_avg);
    assert!(fast_count > slow_count);
    assert_eq!(router.route().unwrap(), fast_endpoint);
}
