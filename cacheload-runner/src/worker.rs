use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use cacheload_client::CacheClient;
use cacheload_common::CacheLoadError;
use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::clock::RunClock;
use crate::config::{KeySpace, RunConfig};
use crate::metrics::{
    MetricKind, MetricsEngine, CACHE_HIT_RATE, CACHE_RESPONSE_TIME, DB_FALLBACK_COUNT,
    HTTP_REQS, HTTP_REQ_DURATION, HTTP_REQ_FAILED,
};
use crate::workload::{CacheOp, RequestPattern};

/// The immutable result of one request execution.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub pattern: String,
    /// HTTP status, or 0 for a transport failure / timeout.
    pub status: u16,
    pub latency: Duration,
    pub success: bool,
}

/// Everything a worker needs, shared across all workers of a run.
pub struct WorkerContext {
    pub client: Arc<CacheClient>,
    pub engine: Arc<MetricsEngine>,
    pub config: Arc<RunConfig>,
    pub clock: RunClock,
    /// Run-level cancellation: set once, checked between iterations.
    pub cancel: Arc<AtomicBool>,
}

/// One virtual worker's sequential iteration loop.
///
/// Each iteration resolves the current phase, draws a pattern from that
/// phase's mix, executes it, records the outcome, then sleeps. The retire
/// flag and the run-level cancel flag are checked between iterations only —
/// an in-flight request is always allowed to finish or time out. When a stop
/// is already requested after an iteration completes, the final sleep is
/// skipped so drains stay prompt.
pub async fn worker_loop(
    ctx: Arc<WorkerContext>,
    scenario: String,
    worker_id: u64,
    retire: Arc<AtomicBool>,
    iteration_budget: Option<u32>,
) {
    let mut rng = StdRng::from_entropy();
    let mut iterations: u32 = 0;
    debug!("worker {scenario}/{worker_id} starting");

    loop {
        if should_stop(&ctx, &retire, iterations, iteration_budget) {
            break;
        }

        let phase = ctx.config.phases.resolve(ctx.clock.elapsed()).to_string();
        let pattern = ctx.config.workload.mix_for(&phase).sample(&mut rng).clone();
        let outcome = execute_pattern(&ctx.client, &pattern, &ctx.config.keys, &mut rng).await;
        record_outcome(&ctx.engine, &outcome, &pattern, ctx.config.cache_hit_latency_ms);
        iterations += 1;

        if should_stop(&ctx, &retire, iterations, iteration_budget) {
            break;
        }
        let pause = ctx.config.sleep.duration_for(&phase, &mut rng);
        tokio::time::sleep(pause).await;
    }

    debug!("worker {scenario}/{worker_id} retiring after {iterations} iterations");
}

fn should_stop(
    ctx: &WorkerContext,
    retire: &AtomicBool,
    iterations: u32,
    budget: Option<u32>,
) -> bool {
    if ctx.cancel.load(Ordering::Relaxed) || retire.load(Ordering::Relaxed) {
        return true;
    }
    matches!(budget, Some(limit) if iterations >= limit)
}

/// Issue exactly one call for `pattern`, timing it from dispatch to full
/// response. A transport failure or timeout yields a failed outcome with
/// status 0 and the timeout bound as latency — never an error.
pub async fn execute_pattern(
    client: &CacheClient,
    pattern: &RequestPattern,
    keys: &KeySpace,
    rng: &mut impl Rng,
) -> Outcome {
    let timeout = pattern.timeout;
    let start = Instant::now();
    let result = match &pattern.op {
        CacheOp::WarmCache => client.warm_cache(timeout).await,
        CacheOp::FetchUser => {
            let id = draw_key("user", keys.users, pattern.key_limit, rng);
            client.fetch_user(&id, timeout).await
        }
        CacheOp::FetchProduct => {
            let id = draw_key("product", keys.products, pattern.key_limit, rng);
            client.fetch_product(&id, timeout).await
        }
        CacheOp::FetchHotItem => {
            let id = draw_key("hotdata", keys.hot_items, pattern.key_limit, rng);
            client.fetch_hot_item(&id, timeout).await
        }
        CacheOp::BatchUsers { batch_size } => {
            let ids: Vec<String> = (0..*batch_size)
                .map(|_| draw_key("user", keys.users, pattern.key_limit, rng))
                .collect();
            client.batch_users(&ids, timeout).await
        }
        CacheOp::MetricsReport => match client.metrics_report(timeout).await {
            Ok(_) => Ok(200),
            // The report call parses its body, so a non-2xx answer arrives as
            // an error; the outcome still carries the real status code.
            Err(CacheLoadError::HttpError(status, _)) => Ok(status),
            Err(e) => Err(e),
        },
    };

    match result {
        Ok(status) => {
            let latency = start.elapsed();
            Outcome {
                pattern: pattern.name.clone(),
                status,
                latency,
                success: pattern.accepted.contains(status) && latency < timeout,
            }
        }
        Err(_) => Outcome {
            pattern: pattern.name.clone(),
            status: 0,
            latency: timeout,
            success: false,
        },
    }
}

/// Draw a key ID like `user17` uniformly from the first `limit.min(space)`
/// entries of the pool. IDs start at 1, matching the service's data set.
pub fn draw_key(prefix: &str, space: usize, limit: Option<usize>, rng: &mut impl Rng) -> String {
    let upper = limit.unwrap_or(space).min(space).max(1);
    format!("{prefix}{}", rng.gen_range(0..upper) + 1)
}

/// Feed one outcome into the engine: the three built-in metrics always, the
/// cache-tracking metrics only for successful responses of patterns that opt
/// in (a failed call carries no hit/miss information).
pub fn record_outcome(
    engine: &MetricsEngine,
    outcome: &Outcome,
    pattern: &RequestPattern,
    hit_latency_ms: f64,
) {
    let latency_ms = outcome.latency.as_secs_f64() * 1000.0;
    engine.record(HTTP_REQS, MetricKind::Counter, 1.0);
    engine.record(HTTP_REQ_DURATION, MetricKind::Trend, latency_ms);
    engine.record_flag(HTTP_REQ_FAILED, !outcome.success);

    if pattern.track_cache_hit && outcome.success {
        engine.record(CACHE_RESPONSE_TIME, MetricKind::Trend, latency_ms);
        let hit = latency_ms < hit_latency_ms;
        engine.record_flag(CACHE_HIT_RATE, hit);
        if !hit {
            engine.record(DB_FALLBACK_COUNT, MetricKind::Counter, 1.0);
        }
    }
}
