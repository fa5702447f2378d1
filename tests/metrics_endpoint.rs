//! `GET /metrics` under concurrent load and with requests parked mid-flight.

use std::{sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use tokio::sync::Semaphore;
use tower::ServiceExt;

use fake_llm_server::{
    AppConfig, CompletionService, Delay, MetricsRegistry, MetricsSnapshot, TimingSimulator,
    build_router, build_router_with,
};

/// Holds every phase until the test releases a permit.
struct GatedDelay {
    gate: Arc<Semaphore>,
}

#[async_trait]
impl Delay for GatedDelay {
    async fn hold(&self, _duration: Duration) {
        self.gate.acquire().await.expect("gate closed").forget();
    }
}

async fn scrape(app: &Router) -> Result<String> {
    let response = app
        .clone()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty())?)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/plain; version=0.0.4"
    );
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    Ok(String::from_utf8(bytes.to_vec())?)
}

fn sample<'a>(body: &'a str, name: &str) -> &'a str {
    body.lines()
        .find(|line| !line.starts_with('#') && line.split(['{', ' ']).next() == Some(name))
        .unwrap_or_else(|| panic!("missing sample {name}"))
}

fn value(body: &str, name: &str) -> f64 {
    sample(body, name)
        .rsplit(' ')
        .next()
        .and_then(|v| v.parse().ok())
        .unwrap_or_else(|| panic!("unparseable sample {name}"))
}

fn post_completion(body: &'static str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/v1/completions")
        .body(Body::from(body))
        .expect("request")
}

async fn wait_until(registry: &MetricsRegistry, check: impl Fn(&MetricsSnapshot) -> bool) {
    for _ in 0..1000 {
        if check(&registry.snapshot()) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    panic!("registry never reached expected state: {:?}", registry.snapshot());
}

#[tokio::test]
async fn fresh_server_reports_zeroes() -> Result<()> {
    let app = build_router(&AppConfig::instant(), Arc::new(MetricsRegistry::new()));
    let body = scrape(&app).await?;

    assert_eq!(value(&body, "vllm:num_requests_running"), 0.0);
    assert_eq!(value(&body, "vllm:num_requests_waiting"), 0.0);
    assert_eq!(value(&body, "vllm:gpu_cache_usage_perc"), 0.5);
    assert_eq!(value(&body, "vllm:request_success_total"), 0.0);
    assert!(body.contains("vllm:request_latency_seconds_avg 0.0000"));
    assert!(
        sample(&body, "vllm:lora_requests_info")
            .contains("{running_lora_adapters=\"\",max_lora=\"2\",waiting_lora_adapters=\"\"}")
    );
    assert!(value(&body, "vllm:lora_requests_info") > 1_600_000_000.0);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_completions_are_all_counted() -> Result<()> {
    const N: usize = 128;
    let registry = Arc::new(MetricsRegistry::new());
    let app = build_router(&AppConfig::default(), registry.clone());

    let handles: Vec<_> = (0..N)
        .map(|i| {
            let app = app.clone();
            let body = match i % 3 {
                0 => "{}",
                1 => r#"{"lora": "lora-a"}"#,
                _ => r#"{"lora": "lora-b"}"#,
            };
            tokio::spawn(async move { app.oneshot(post_completion(body)).await })
        })
        .collect();
    for handle in handles {
        let response = handle.await??;
        assert_eq!(response.status(), StatusCode::OK);
    }

    let body = scrape(&app).await?;
    assert_eq!(value(&body, "vllm:request_success_total"), N as f64);
    assert_eq!(value(&body, "vllm:num_requests_running"), 0.0);
    assert_eq!(value(&body, "vllm:num_requests_waiting"), 0.0);

    let snapshot = registry.snapshot();
    assert_eq!(snapshot.request_count, N as u64);
    // every request sat through the simulated queue and compute holds
    assert!(snapshot.total_latency_seconds >= N as f64 * 0.01);
    let expected_avg = snapshot.total_latency_seconds / N as f64;
    assert!((snapshot.average_latency_seconds() - expected_avg).abs() < 1e-9);
    assert!((value(&body, "vllm:request_latency_seconds_avg") - expected_avg).abs() < 1e-4);
    assert!(
        (value(&body, "vllm:request_latency_seconds_total") - snapshot.total_latency_seconds).abs()
            < 1e-4
    );
    Ok(())
}

#[tokio::test]
async fn gauges_are_live_during_simulated_phases() -> Result<()> {
    let gate = Arc::new(Semaphore::new(0));
    let registry = Arc::new(MetricsRegistry::new());
    let simulator = TimingSimulator::new(
        Duration::from_millis(5),
        Duration::from_millis(10),
        Arc::new(GatedDelay { gate: gate.clone() }),
    );
    let app = build_router_with(CompletionService::new(registry.clone(), simulator));

    let request = tokio::spawn({
        let app = app.clone();
        async move { app.oneshot(post_completion(r#"{"lora": "lora-a"}"#)).await }
    });

    wait_until(&registry, |s| s.waiting_requests == 1).await;
    let body = scrape(&app).await?;
    assert_eq!(value(&body, "vllm:num_requests_waiting"), 1.0);
    assert_eq!(value(&body, "vllm:num_requests_running"), 0.0);
    assert!(sample(&body, "vllm:lora_requests_info").contains("waiting_lora_adapters=\"lora-a\""));

    gate.add_permits(1);
    wait_until(&registry, |s| s.running_requests == 1).await;
    let body = scrape(&app).await?;
    assert_eq!(value(&body, "vllm:num_requests_waiting"), 0.0);
    assert_eq!(value(&body, "vllm:num_requests_running"), 1.0);
    assert!(sample(&body, "vllm:lora_requests_info").contains("running_lora_adapters=\"lora-a\""));
    assert_eq!(value(&body, "vllm:request_success_total"), 0.0);

    gate.add_permits(1);
    let response = request.await??;
    assert_eq!(response.status(), StatusCode::OK);

    let body = scrape(&app).await?;
    assert_eq!(value(&body, "vllm:num_requests_running"), 0.0);
    assert_eq!(value(&body, "vllm:request_success_total"), 1.0);
    Ok(())
}

#[tokio::test]
async fn cancelled_request_does_not_leak_gauges() -> Result<()> {
    let gate = Arc::new(Semaphore::new(0));
    let registry = Arc::new(MetricsRegistry::new());
    let simulator = TimingSimulator::new(
        Duration::ZERO,
        Duration::ZERO,
        Arc::new(GatedDelay { gate: gate.clone() }),
    );
    let app = build_router_with(CompletionService::new(registry.clone(), simulator));

    let request = tokio::spawn({
        let app = app.clone();
        async move { app.oneshot(post_completion("{}")).await }
    });
    wait_until(&registry, |s| s.waiting_requests == 1).await;

    request.abort();
    let _ = request.await;

    let snapshot = registry.snapshot();
    assert_eq!(snapshot.waiting_requests, 0);
    assert_eq!(snapshot.running_requests, 0);
    assert_eq!(snapshot.request_count, 0);
    Ok(())
}

#[tokio::test]
async fn every_sample_has_a_type_declaration() -> Result<()> {
    let app = build_router(&AppConfig::instant(), Arc::new(MetricsRegistry::new()));
    app.clone().oneshot(post_completion("{}")).await?;
    let body = scrape(&app).await?;

    let mut declared: Vec<&str> = Vec::new();
    for line in body.lines() {
        if let Some(rest) = line.strip_prefix("# TYPE ") {
            let mut parts = rest.split(' ');
            declared.push(parts.next().unwrap_or_default());
            assert!(matches!(parts.next(), Some("gauge" | "counter")), "{line}");
        } else if !line.starts_with('#') && !line.is_empty() {
            let name = line.split(['{', ' ']).next().unwrap_or_default();
            assert!(declared.contains(&name), "undeclared sample: {line}");
        }
    }
    Ok(())
}
