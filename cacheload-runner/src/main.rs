use std::io::Write;
use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cacheload_runner::config::RunConfig;
use cacheload_runner::metrics::{
    Summary, HTTP_REQS, HTTP_REQ_DURATION, HTTP_REQ_FAILED,
};
use cacheload_runner::plans::Plan;
use cacheload_runner::runner::{self, RunOutcome};
use clap::Parser;

#[derive(Parser)]
#[command(name = "cacheload", about = "Cache API load-testing harness")]
struct Args {
    /// Built-in test plan: performance | stress | spike
    #[arg(long, default_value = "performance", conflicts_with = "config")]
    plan: String,

    /// Path to a JSON run configuration (overrides --plan)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Base URL of the cache service under test (overrides the config file's)
    #[arg(long)]
    base_url: Option<String>,

    /// Multiply every stage duration and start offset (e.g. 0.01 for a smoke run)
    #[arg(long, default_value_t = 1.0)]
    duration_scale: f64,
}

#[tokio::main]
async fn main() {
    env_logger::init();
    let args = Args::parse();

    let mut config = build_config(&args).unwrap_or_else(|e| {
        eprintln!("{e}");
        process::exit(3);
    });
    if args.duration_scale != 1.0 {
        if args.duration_scale <= 0.0 {
            eprintln!("--duration-scale must be positive");
            process::exit(3);
        }
        config.scale_durations(args.duration_scale);
    }

    let cancel = Arc::new(AtomicBool::new(false));
    let cancel_on_signal = Arc::clone(&cancel);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\ninterrupted, draining in-flight requests");
            cancel_on_signal.store(true, Ordering::Relaxed);
        }
    });

    print!("Running load test against {} ", config.base_url);
    std::io::stdout().flush().ok();

    let dot_handle = tokio::spawn(async {
        let mut interval = tokio::time::interval(Duration::from_secs(1));
        interval.tick().await; // consume the immediate first tick
        loop {
            interval.tick().await;
            print!(".");
            std::io::stdout().flush().ok();
        }
    });

    let result = runner::run(config, cancel).await;

    dot_handle.abort();
    println!();

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(e) => {
            eprintln!("Run aborted: {e}");
            process::exit(3);
        }
    };

    print_report(&outcome);
    process::exit(if outcome.verdict.passed { 0 } else { 1 });
}

const DEFAULT_BASE_URL: &str = "http://localhost:8080";

fn build_config(args: &Args) -> Result<RunConfig, String> {
    if let Some(path) = &args.config {
        let mut config = RunConfig::from_file(path).map_err(|e| e.to_string())?;
        if let Some(base_url) = &args.base_url {
            config.base_url = base_url.clone();
        }
        return Ok(config);
    }
    let plan = Plan::from_name(&args.plan).ok_or_else(|| {
        format!(
            "Unknown plan {:?}. Valid values: performance, stress, spike",
            args.plan
        )
    })?;
    let base_url = args.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
    plan.build(base_url).map_err(|e| e.to_string())
}

fn print_report(outcome: &RunOutcome) {
    let pass_fail = |ok: bool| if ok { "✓" } else { "✗" };

    println!("Cache Load Test Results");
    println!("=======================");
    println!("Elapsed:               {:.1} s", outcome.elapsed.as_secs_f64());
    println!("Requests:              {}", format_thousands(total_requests(&outcome.summary)));
    println!(
        "Throughput:            {:.1} rps",
        total_requests(&outcome.summary) as f64 / outcome.elapsed.as_secs_f64().max(f64::EPSILON)
    );
    if let Some(duration) = outcome.summary.get(HTTP_REQ_DURATION) {
        println!(
            "P50 latency:           {:.1} ms",
            duration.percentile(50.0).unwrap_or(0.0)
        );
        println!(
            "P95 latency:           {:.1} ms",
            duration.percentile(95.0).unwrap_or(0.0)
        );
        println!(
            "P99 latency:           {:.1} ms",
            duration.percentile(99.0).unwrap_or(0.0)
        );
    }
    if let Some(failed) = outcome.summary.get(HTTP_REQ_FAILED) {
        println!(
            "Failed requests:       {:.3}%",
            failed.rate().unwrap_or(0.0) * 100.0
        );
    }
    println!();
    println!("Thresholds:");
    for (label, ok) in &outcome.verdict.per_threshold {
        println!("  {}  {}", pass_fail(*ok), label);
    }
    if let Some(report) = &outcome.report {
        println!();
        println!("Service cache report:");
        println!(
            "  Redis hit rate:      {:.2}%",
            report.payload.redis_metrics.hit_rate * 100.0
        );
        println!(
            "  Overall hit rate:    {:.2}%",
            report.payload.summary.overall_hit_rate * 100.0
        );
    }
    println!();
    println!(
        "Result: {}",
        if outcome.verdict.passed { "PASS" } else { "FAIL" }
    );
}

fn total_requests(summary: &Summary) -> u64 {
    summary
        .get(HTTP_REQS)
        .and_then(|m| m.total())
        .unwrap_or(0.0) as u64
}

fn format_thousands(n: u64) -> String {
    if n >= 1_000_000 {
        format!("~{}M", n / 1_000_000)
    } else if n >= 1_000 {
        format!("~{}K", n / 1_000)
    } else {
        n.to_string()
    }
}
