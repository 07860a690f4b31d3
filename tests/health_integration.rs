//! Integration tests for the health surface: per-service records,
//! aggregation, fan-out timing and breaker diagnostics.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use service_gateway::config::GatewayConfig;

mod common;

fn base_config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    // Checks are driven by the endpoints under test, not a timer.
    config.health_check.enabled = false;
    config.health_check.timeout_ms = 1000;
    config
}

#[tokio::test]
async fn services_endpoint_aggregates_degraded() {
    let healthy = common::start_mock_backend("{\"status\":\"ok\"}").await;
    let failing = common::start_programmable_backend(|_head| async move {
        (500, "not ok".to_string())
    })
    .await;

    let mut config = base_config();
    config.services.push(common::test_service("users", healthy));
    config.services.push(common::test_service("orders", failing));
    let (addr, _shutdown) = common::spawn_gateway(config).await;

    let res = common::test_client()
        .get(format!("http://{addr}/health/services"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);

    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["status"], "degraded");
    let services = body["services"].as_array().unwrap();
    assert_eq!(services.len(), 2);
    assert_eq!(services[0]["name"], "users");
    assert_eq!(services[0]["status"], "healthy");
    assert_eq!(services[0]["details"]["status"], "ok");
    assert_eq!(services[1]["name"], "orders");
    assert_eq!(services[1]["status"], "unhealthy");
    assert!(services[1]["error"].as_str().unwrap().contains("500"));
}

#[tokio::test]
async fn checks_fan_out_concurrently() {
    let a = common::start_mock_backend("ok").await;
    let hanging = common::start_hanging_backend().await;
    let c = common::start_mock_backend("ok").await;

    let mut config = base_config();
    config.health_check.timeout_ms = 1000;
    config.services.push(common::test_service("a", a));
    config.services.push(common::test_service("b", hanging));
    config.services.push(common::test_service("c", c));
    let (addr, _shutdown) = common::spawn_gateway(config).await;

    // Empty cache: this request runs the full sweep inline.
    let started = Instant::now();
    let res = common::test_client()
        .get(format!("http://{addr}/health/services"))
        .send()
        .await
        .unwrap();
    let elapsed = started.elapsed();

    let body: serde_json::Value = res.json().await.unwrap();
    let statuses: Vec<&str> = body["services"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["status"].as_str().unwrap())
        .collect();
    assert_eq!(statuses, vec!["healthy", "unhealthy", "healthy"]);

    // Wall time tracks the slowest probe, not the sum of all three.
    assert!(
        elapsed < Duration::from_millis(2500),
        "sweep took {elapsed:?}"
    );
}

#[tokio::test]
async fn single_service_endpoint_and_force_bypass() {
    let probe_count = Arc::new(AtomicU32::new(0));
    let pc = probe_count.clone();
    let backend = common::start_programmable_backend(move |_head| {
        let pc = pc.clone();
        async move {
            pc.fetch_add(1, Ordering::SeqCst);
            (200, "ok".to_string())
        }
    })
    .await;

    let mut config = base_config();
    config.services.push(common::test_service("users", backend));
    let (addr, _shutdown) = common::spawn_gateway(config).await;
    let client = common::test_client();

    // First read: nothing cached, so the service is checked once.
    let res = client
        .get(format!("http://{addr}/health/services/users"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["name"], "users");
    assert_eq!(body["status"], "healthy");
    assert!(body["responseTimeMs"].is_number());
    assert!(body["lastCheckedAt"].is_string());
    let after_first = probe_count.load(Ordering::SeqCst);
    assert_eq!(after_first, 1);

    // Cached read: no new probe.
    client
        .get(format!("http://{addr}/health/services/users"))
        .send()
        .await
        .unwrap();
    assert_eq!(probe_count.load(Ordering::SeqCst), 1);

    // Forced read bypasses the cache.
    client
        .get(format!("http://{addr}/health/services/users?force=true"))
        .send()
        .await
        .unwrap();
    assert_eq!(probe_count.load(Ordering::SeqCst), 2);

    // Unknown service name.
    let res = client
        .get(format!("http://{addr}/health/services/payments"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 404);
}

#[tokio::test]
async fn detailed_endpoint_and_breaker_reset() {
    let mut config = base_config();
    // Unreachable backend so proxied calls trip the breaker quickly.
    let mut svc = common::test_service("users", "127.0.0.1:1".parse().unwrap());
    svc.retries = 0;
    svc.circuit_breaker_threshold = 2;
    svc.circuit_breaker_reset_timeout_ms = 60_000;
    config.services.push(svc);
    let (addr, _shutdown) = common::spawn_gateway(config).await;
    let client = common::test_client();

    for _ in 0..2 {
        let res = client
            .get(format!("http://{addr}/api/v1/users"))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 503);
    }

    let res = client
        .get(format!("http://{addr}/health/detailed"))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = res.json().await.unwrap();
    assert!(body["uptimeSeconds"].is_number());
    assert!(body["memoryMb"].is_number());
    assert!(body["services"].is_array());
    let breaker = &body["circuitBreakers"]["users"];
    assert_eq!(breaker["state"], "OPEN");
    assert_eq!(breaker["failureCount"], 2);
    assert!(breaker["nextAttemptAt"].is_string());

    // Unknown breaker name is a 404; the real one resets to CLOSED.
    let res = client
        .post(format!("http://{addr}/health/circuit-breakers/payments/reset"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 404);

    let res = client
        .post(format!("http://{addr}/health/circuit-breakers/users/reset"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);

    let res = client
        .get(format!("http://{addr}/health/detailed"))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["circuitBreakers"]["users"]["state"], "CLOSED");
    assert_eq!(body["circuitBreakers"]["users"]["failureCount"], 0);
}

#[tokio::test]
async fn periodic_monitor_populates_cache() {
    let probe_count = Arc::new(AtomicU32::new(0));
    let pc = probe_count.clone();
    let backend = common::start_programmable_backend(move |_head| {
        let pc = pc.clone();
        async move {
            pc.fetch_add(1, Ordering::SeqCst);
            (200, "ok".to_string())
        }
    })
    .await;

    let mut config = base_config();
    config.health_check.enabled = true;
    config.health_check.interval_ms = 200;
    config.services.push(common::test_service("users", backend));
    let (addr, _shutdown) = common::spawn_gateway(config).await;

    // The monitor runs an immediate sweep and then keeps ticking.
    tokio::time::sleep(Duration::from_millis(700)).await;
    assert!(probe_count.load(Ordering::SeqCst) >= 2);

    let res = common::test_client()
        .get(format!("http://{addr}/health/services/users"))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
}
