use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use cacheload_client::{CacheClient, ClientConfig};
use cacheload_common::{CacheLoadError, CacheMetricsReport};
use log::{info, warn};

use crate::clock::RunClock;
use crate::config::RunConfig;
use crate::metrics::{MetricsEngine, Summary};
use crate::scheduler;
use crate::threshold::{evaluate, Verdict};
use crate::worker::WorkerContext;

/// Everything a finished run produces: the metric snapshot, the threshold
/// verdict, the service's own metrics report (when teardown could fetch it),
/// and the measured wall-clock span.
pub struct RunOutcome {
    pub summary: Summary,
    pub verdict: Verdict,
    pub report: Option<CacheMetricsReport>,
    pub elapsed: Duration,
}

/// Execute one complete run: setup, scenarios, summarize, evaluate, teardown.
///
/// Setup failure (warmup not returning 200) aborts before any scenario runs —
/// measurements after a cold, failed warmup would be incomparable. Teardown
/// failure is logged and leaves `report` empty without touching the verdict.
pub async fn run(
    config: RunConfig,
    cancel: Arc<AtomicBool>,
) -> Result<RunOutcome, CacheLoadError> {
    let config = Arc::new(config);
    let client = Arc::new(CacheClient::new(ClientConfig {
        base_url: config.base_url.clone(),
    }));

    info!("setup: warming cache at {}", config.base_url);
    let status = client
        .warm_cache(config.setup_timeout)
        .await
        .map_err(|e| CacheLoadError::SetupFailed(e.to_string()))?;
    if status != 200 {
        return Err(CacheLoadError::SetupFailed(format!(
            "warmup returned status {status}"
        )));
    }
    info!("setup: cache warmed");

    let engine = Arc::new(MetricsEngine::new());
    let clock = RunClock::start();
    let ctx = Arc::new(WorkerContext {
        client: Arc::clone(&client),
        engine: Arc::clone(&engine),
        config: Arc::clone(&config),
        clock,
        cancel,
    });

    scheduler::run_scenarios(ctx).await;
    let elapsed = clock.elapsed();

    // End-of-run sync point: every worker has drained, so the snapshot is
    // complete and stable.
    let summary = engine.summarize();
    let verdict = evaluate(&config.thresholds, &summary);

    let report = match client.metrics_report(config.teardown_timeout).await {
        Ok(report) => Some(report),
        Err(e) => {
            warn!("teardown: metrics report unavailable: {e}");
            None
        }
    };

    Ok(RunOutcome { summary, verdict, report, elapsed })
}
