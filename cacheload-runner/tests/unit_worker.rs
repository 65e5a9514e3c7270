use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cacheload_client::{CacheClient, ClientConfig};
use cacheload_runner::clock::RunClock;
use cacheload_runner::config::{KeySpace, RunConfig};
use cacheload_runner::metrics::{
    MetricsEngine, CACHE_HIT_RATE, CACHE_RESPONSE_TIME, DB_FALLBACK_COUNT, HTTP_REQS,
    HTTP_REQ_DURATION, HTTP_REQ_FAILED,
};
use cacheload_runner::phase::PhasePlan;
use cacheload_runner::scenario::{Scenario, ScenarioExecutor};
use cacheload_runner::worker::{
    draw_key, execute_pattern, record_outcome, worker_loop, Outcome, WorkerContext,
};
use cacheload_runner::workload::{
    CacheOp, Pause, RequestPattern, SleepPolicy, StatusRange, WorkloadMix, WorkloadSelector,
};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn keys() -> KeySpace {
    KeySpace { users: 100, products: 50, hot_items: 10 }
}

fn user_pattern() -> RequestPattern {
    RequestPattern {
        name: "fetch_user".to_string(),
        op: CacheOp::FetchUser,
        weight: 1.0,
        timeout: Duration::from_secs(2),
        accepted: StatusRange::ok(),
        key_limit: None,
        track_cache_hit: false,
    }
}

#[test]
fn test_draw_key_respects_space_and_limit() {
    let mut rng = StdRng::seed_from_u64(11);
    for _ in 0..200 {
        let id = draw_key("user", 100, None, &mut rng);
        let n: usize = id.strip_prefix("user").unwrap().parse().unwrap();
        assert!((1..=100).contains(&n), "{id} out of space");
    }
    for _ in 0..200 {
        let id = draw_key("user", 100, Some(5), &mut rng);
        let n: usize = id.strip_prefix("user").unwrap().parse().unwrap();
        assert!((1..=5).contains(&n), "{id} out of limit");
    }
    // A limit larger than the space clamps to the space.
    for _ in 0..200 {
        let id = draw_key("hotdata", 10, Some(50), &mut rng);
        let n: usize = id.strip_prefix("hotdata").unwrap().parse().unwrap();
        assert!((1..=10).contains(&n), "{id} out of space");
    }
}

#[tokio::test]
async fn test_execute_pattern_success() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", mockito::Matcher::Regex(r"^/api/cache/users/user\d+$".to_string()))
        .with_status(200)
        .create_async()
        .await;

    let client = CacheClient::new(ClientConfig { base_url: server.url() });
    let mut rng = StdRng::seed_from_u64(1);
    let outcome = execute_pattern(&client, &user_pattern(), &keys(), &mut rng).await;

    assert_eq!(outcome.status, 200);
    assert!(outcome.success);
    assert!(outcome.latency < Duration::from_secs(2));
    assert_eq!(outcome.pattern, "fetch_user");
}

#[tokio::test]
async fn test_execute_pattern_unexpected_status_fails() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", mockito::Matcher::Regex(r"^/api/cache/users/".to_string()))
        .with_status(500)
        .create_async()
        .await;

    let client = CacheClient::new(ClientConfig { base_url: server.url() });
    let mut rng = StdRng::seed_from_u64(2);
    let outcome = execute_pattern(&client, &user_pattern(), &keys(), &mut rng).await;

    assert_eq!(outcome.status, 500);
    assert!(!outcome.success);
}

#[tokio::test]
async fn test_execute_pattern_accepts_configured_range() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", mockito::Matcher::Regex(r"^/api/cache/users/".to_string()))
        .with_status(404)
        .create_async()
        .await;

    let client = CacheClient::new(ClientConfig { base_url: server.url() });
    let mut rng = StdRng::seed_from_u64(3);
    let pattern = RequestPattern {
        accepted: StatusRange { min: 200, max: 499 },
        ..user_pattern()
    };
    let outcome = execute_pattern(&client, &pattern, &keys(), &mut rng).await;

    assert_eq!(outcome.status, 404);
    assert!(outcome.success);
}

#[tokio::test]
async fn test_latency_covers_full_body_download() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", mockito::Matcher::Regex(r"^/api/cache/users/".to_string()))
        .with_status(200)
        .with_chunked_body(|writer| {
            use std::io::Write;
            writer.write_all(b"{\"id\":")?;
            std::thread::sleep(Duration::from_millis(400));
            writer.write_all(b"\"user1\"}")
        })
        .create_async()
        .await;

    let client = CacheClient::new(ClientConfig { base_url: server.url() });
    let mut rng = StdRng::seed_from_u64(9);
    let outcome = execute_pattern(&client, &user_pattern(), &keys(), &mut rng).await;

    // The headers arrive immediately; a slow body must not be counted as a
    // fast response.
    assert!(outcome.success);
    assert!(
        outcome.latency >= Duration::from_millis(400),
        "latency {:?} excludes the body download",
        outcome.latency
    );
}

#[tokio::test]
async fn test_stalled_body_yields_failed_outcome() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", mockito::Matcher::Regex(r"^/api/cache/users/".to_string()))
        .with_status(200)
        .with_chunked_body(|writer| {
            use std::io::Write;
            writer.write_all(b"partial")?;
            std::thread::sleep(Duration::from_millis(900));
            writer.write_all(b" body")
        })
        .create_async()
        .await;

    let client = CacheClient::new(ClientConfig { base_url: server.url() });
    let mut rng = StdRng::seed_from_u64(10);
    let pattern = RequestPattern {
        timeout: Duration::from_millis(250),
        ..user_pattern()
    };
    let outcome = execute_pattern(&client, &pattern, &keys(), &mut rng).await;

    assert_eq!(outcome.status, 0);
    assert!(!outcome.success);
    assert_eq!(outcome.latency, Duration::from_millis(250));
}

#[tokio::test]
async fn test_metrics_report_pattern_carries_real_status() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/api/cache/metrics/report")
        .with_status(503)
        .create_async()
        .await;

    let client = CacheClient::new(ClientConfig { base_url: server.url() });
    let mut rng = StdRng::seed_from_u64(12);
    let pattern = RequestPattern {
        name: "report".to_string(),
        op: CacheOp::MetricsReport,
        ..user_pattern()
    };
    let outcome = execute_pattern(&client, &pattern, &keys(), &mut rng).await;

    assert_eq!(outcome.status, 503);
    assert!(!outcome.success);
}

#[tokio::test]
async fn test_transport_failure_yields_failed_outcome_with_timeout_latency() {
    // Nothing listens here; the call must fail, not panic or error out.
    let client = CacheClient::new(ClientConfig {
        base_url: "http://127.0.0.1:1".to_string(),
    });
    let mut rng = StdRng::seed_from_u64(4);
    let pattern = RequestPattern {
        timeout: Duration::from_millis(250),
        ..user_pattern()
    };
    let outcome = execute_pattern(&client, &pattern, &keys(), &mut rng).await;

    assert_eq!(outcome.status, 0);
    assert!(!outcome.success);
    assert_eq!(outcome.latency, Duration::from_millis(250));
}

#[tokio::test]
async fn test_batch_pattern_posts_expected_batch() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/api/cache/users/batch")
        .with_status(200)
        .create_async()
        .await;

    let client = CacheClient::new(ClientConfig { base_url: server.url() });
    let mut rng = StdRng::seed_from_u64(5);
    let pattern = RequestPattern {
        name: "batch".to_string(),
        op: CacheOp::BatchUsers { batch_size: 5 },
        ..user_pattern()
    };
    let outcome = execute_pattern(&client, &pattern, &keys(), &mut rng).await;

    assert!(outcome.success);
    mock.assert_async().await;
}

#[test]
fn test_record_outcome_builtin_metrics() {
    let engine = MetricsEngine::new();
    let ok = Outcome {
        pattern: "fetch_user".to_string(),
        status: 200,
        latency: Duration::from_millis(30),
        success: true,
    };
    let failed = Outcome {
        pattern: "fetch_user".to_string(),
        status: 0,
        latency: Duration::from_secs(2),
        success: false,
    };

    record_outcome(&engine, &ok, &user_pattern(), 50.0);
    record_outcome(&engine, &failed, &user_pattern(), 50.0);

    let summary = engine.summarize();
    assert_eq!(summary.get(HTTP_REQS).unwrap().total(), Some(2.0));
    assert_eq!(summary.get(HTTP_REQ_DURATION).unwrap().sample_count(), 2);
    assert_eq!(summary.get(HTTP_REQ_FAILED).unwrap().rate(), Some(0.5));
    // Hit tracking is off for this pattern.
    assert!(summary.get(CACHE_HIT_RATE).is_none());
}

#[test]
fn test_record_outcome_cache_hit_heuristic() {
    let engine = MetricsEngine::new();
    let pattern = RequestPattern { track_cache_hit: true, ..user_pattern() };

    let hit = Outcome {
        pattern: "fetch_user".to_string(),
        status: 200,
        latency: Duration::from_millis(10),
        success: true,
    };
    let miss = Outcome {
        pattern: "fetch_user".to_string(),
        status: 200,
        latency: Duration::from_millis(120),
        success: true,
    };
    let failed = Outcome {
        pattern: "fetch_user".to_string(),
        status: 500,
        latency: Duration::from_millis(5),
        success: false,
    };

    record_outcome(&engine, &hit, &pattern, 50.0);
    record_outcome(&engine, &miss, &pattern, 50.0);
    // Failures carry no hit/miss information and must not skew the rate.
    record_outcome(&engine, &failed, &pattern, 50.0);

    let summary = engine.summarize();
    assert_eq!(summary.get(CACHE_HIT_RATE).unwrap().rate(), Some(0.5));
    assert_eq!(summary.get(CACHE_RESPONSE_TIME).unwrap().sample_count(), 2);
    assert_eq!(summary.get(DB_FALLBACK_COUNT).unwrap().total(), Some(1.0));
}

fn quick_config(base_url: &str) -> RunConfig {
    RunConfig {
        base_url: base_url.to_string(),
        setup_timeout: Duration::from_secs(5),
        teardown_timeout: Duration::from_secs(5),
        scenarios: vec![Scenario {
            name: "warmup".to_string(),
            executor: ScenarioExecutor::PerWorkerIterations { workers: 1, iterations: 3 },
            start_offset: Duration::ZERO,
        }],
        workload: WorkloadSelector::uniform(
            WorkloadMix::new(vec![user_pattern()]).unwrap(),
        ),
        sleep: SleepPolicy::Always(Pause::Fixed(Duration::ZERO)),
        phases: PhasePlan::single("default"),
        thresholds: vec![],
        keys: keys(),
        cache_hit_latency_ms: 50.0,
    }
}

#[tokio::test]
async fn test_worker_loop_honors_iteration_budget() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", mockito::Matcher::Regex(r"^/api/cache/users/".to_string()))
        .with_status(200)
        .create_async()
        .await;

    let engine = Arc::new(MetricsEngine::new());
    let ctx = Arc::new(WorkerContext {
        client: Arc::new(CacheClient::new(ClientConfig { base_url: server.url() })),
        engine: Arc::clone(&engine),
        config: Arc::new(quick_config(&server.url())),
        clock: RunClock::start(),
        cancel: Arc::new(AtomicBool::new(false)),
    });

    worker_loop(
        ctx,
        "warmup".to_string(),
        0,
        Arc::new(AtomicBool::new(false)),
        Some(7),
    )
    .await;

    let summary = engine.summarize();
    assert_eq!(summary.get(HTTP_REQS).unwrap().total(), Some(7.0));
    assert_eq!(summary.get(HTTP_REQ_DURATION).unwrap().sample_count(), 7);
}

#[tokio::test]
async fn test_worker_loop_stops_when_cancelled_before_start() {
    let engine = Arc::new(MetricsEngine::new());
    let cancel = Arc::new(AtomicBool::new(false));
    cancel.store(true, Ordering::Relaxed);

    let ctx = Arc::new(WorkerContext {
        client: Arc::new(CacheClient::new(ClientConfig {
            base_url: "http://127.0.0.1:1".to_string(),
        })),
        engine: Arc::clone(&engine),
        config: Arc::new(quick_config("http://127.0.0.1:1")),
        clock: RunClock::start(),
        cancel,
    });

    worker_loop(ctx, "warmup".to_string(), 0, Arc::new(AtomicBool::new(false)), None).await;

    // Already-cancelled workers never issue a request.
    assert!(engine.summarize().is_empty());
}

#[tokio::test]
async fn test_worker_loop_retires_gracefully() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", mockito::Matcher::Regex(r"^/api/cache/users/".to_string()))
        .with_status(200)
        .create_async()
        .await;

    let engine = Arc::new(MetricsEngine::new());
    let ctx = Arc::new(WorkerContext {
        client: Arc::new(CacheClient::new(ClientConfig { base_url: server.url() })),
        engine: Arc::clone(&engine),
        config: Arc::new(quick_config(&server.url())),
        clock: RunClock::start(),
        cancel: Arc::new(AtomicBool::new(false)),
    });

    let retire = Arc::new(AtomicBool::new(false));
    let handle = tokio::spawn(worker_loop(
        Arc::clone(&ctx),
        "warmup".to_string(),
        0,
        Arc::clone(&retire),
        None,
    ));

    tokio::time::sleep(Duration::from_millis(100)).await;
    retire.store(true, Ordering::Relaxed);
    handle.await.expect("worker should exit cleanly");

    // Whatever iterations completed were recorded whole; the counter and the
    // latency trend agree because retirement never interrupts an iteration.
    let summary = engine.summarize();
    let total = summary.get(HTTP_REQS).unwrap().total().unwrap();
    assert!(total >= 1.0);
    assert_eq!(
        summary.get(HTTP_REQ_DURATION).unwrap().sample_count() as f64,
        total
    );
}
