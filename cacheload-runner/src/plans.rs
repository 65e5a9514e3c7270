use std::time::Duration;

use crate::config::{ConfigError, KeySpace, RunConfig};
use crate::phase::PhasePlan;
use crate::scenario::{Scenario, ScenarioExecutor, Stage};
use crate::threshold::Threshold;
use crate::workload::{
    CacheOp, Pause, RequestPattern, SleepPolicy, StatusRange, WorkloadMix, WorkloadSelector,
};

/// Built-in test plans.
///
/// | Plan        | Shape                                              |
/// |-------------|----------------------------------------------------|
/// | Performance | warmup + ramp + sustained stress + spike scenarios |
/// | Stress      | one extreme ramp to 2000 workers                   |
/// | Spike       | normal / spike / recovery phases                   |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plan {
    Performance,
    Stress,
    Spike,
}

impl Plan {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "performance" => Some(Plan::Performance),
            "stress" => Some(Plan::Stress),
            "spike" => Some(Plan::Spike),
            _ => None,
        }
    }

    pub fn as_name(&self) -> &'static str {
        match self {
            Plan::Performance => "performance",
            Plan::Stress => "stress",
            Plan::Spike => "spike",
        }
    }

    /// Build the plan's full run configuration against `base_url`.
    pub fn build(&self, base_url: &str) -> Result<RunConfig, ConfigError> {
        match self {
            Plan::Performance => performance(base_url),
            Plan::Stress => stress(base_url),
            Plan::Spike => spike(base_url),
        }
    }
}

fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}

fn mins(n: u64) -> Duration {
    Duration::from_secs(n * 60)
}

fn pattern(name: &str, op: CacheOp, weight: f64) -> RequestPattern {
    RequestPattern {
        name: name.to_string(),
        op,
        weight,
        timeout: secs(5),
        accepted: StatusRange::ok(),
        key_limit: None,
        track_cache_hit: false,
    }
}

/// Mixed everyday traffic with a warmup burst, a long ramp, a sustained
/// 300-worker plateau and a closing spike.
fn performance(base_url: &str) -> Result<RunConfig, ConfigError> {
    let scenarios = vec![
        Scenario {
            name: "warmup".to_string(),
            executor: ScenarioExecutor::PerWorkerIterations { workers: 5, iterations: 20 },
            start_offset: Duration::ZERO,
        },
        Scenario {
            name: "ramp_up".to_string(),
            executor: ScenarioExecutor::RampingWorkers {
                start_target: 10,
                stages: vec![
                    Stage { duration: secs(30), target: 50 },
                    Stage { duration: mins(1), target: 100 },
                    Stage { duration: mins(2), target: 200 },
                    Stage { duration: mins(1), target: 100 },
                    Stage { duration: secs(30), target: 0 },
                ],
            },
            start_offset: secs(30),
        },
        Scenario {
            name: "stress".to_string(),
            executor: ScenarioExecutor::ConstantWorkers { workers: 300, duration: mins(3) },
            start_offset: mins(5),
        },
        Scenario {
            name: "spike".to_string(),
            executor: ScenarioExecutor::RampingWorkers {
                start_target: 50,
                stages: vec![
                    Stage { duration: secs(10), target: 500 },
                    Stage { duration: secs(30), target: 500 },
                    Stage { duration: secs(10), target: 50 },
                ],
            },
            start_offset: mins(8) + secs(30),
        },
    ];

    let workload = WorkloadMix::new(vec![
        RequestPattern {
            track_cache_hit: true,
            ..pattern("fetch_user", CacheOp::FetchUser, 0.5)
        },
        RequestPattern {
            track_cache_hit: true,
            ..pattern("fetch_product", CacheOp::FetchProduct, 0.3)
        },
        RequestPattern {
            timeout: secs(1),
            ..pattern("fetch_hot_item", CacheOp::FetchHotItem, 0.15)
        },
        RequestPattern {
            timeout: secs(10),
            ..pattern("batch_users", CacheOp::BatchUsers { batch_size: 5 }, 0.05)
        },
    ])?;

    let thresholds = vec![
        Threshold::parse("http_req_duration", "p(95)<500")?,
        Threshold::parse("http_req_duration", "p(99)<1000")?,
        Threshold::parse("http_req_failed", "rate<0.01")?,
        Threshold::parse("cache_hit_rate", "rate>0.8")?,
        Threshold::parse("cache_response_time", "p(95)<100")?,
    ];

    Ok(RunConfig {
        base_url: base_url.to_string(),
        setup_timeout: secs(30),
        teardown_timeout: secs(10),
        scenarios,
        workload: WorkloadSelector::uniform(workload),
        sleep: SleepPolicy::Always(Pause::Uniform { min: secs(1), max: secs(3) }),
        phases: PhasePlan::single("default"),
        thresholds,
        keys: KeySpace { users: 1000, products: 500, hot_items: 100 },
        cache_hit_latency_ms: 50.0,
    })
}

/// One extreme ramp to 2000 workers over a wide key space, with relaxed
/// thresholds — the question is degradation, not SLO compliance.
fn stress(base_url: &str) -> Result<RunConfig, ConfigError> {
    let scenarios = vec![Scenario {
        name: "extreme_load".to_string(),
        executor: ScenarioExecutor::RampingWorkers {
            start_target: 0,
            stages: vec![
                Stage { duration: mins(2), target: 500 },
                Stage { duration: mins(5), target: 1000 },
                Stage { duration: mins(5), target: 1500 },
                Stage { duration: mins(3), target: 2000 },
                Stage { duration: mins(2), target: 500 },
                Stage { duration: mins(1), target: 0 },
            ],
        },
        start_offset: Duration::ZERO,
    }];

    let workload = WorkloadMix::new(vec![
        RequestPattern {
            timeout: secs(10),
            ..pattern("mass_user", CacheOp::FetchUser, 0.6)
        },
        RequestPattern {
            timeout: secs(10),
            ..pattern("mass_product", CacheOp::FetchProduct, 0.3)
        },
        RequestPattern {
            timeout: secs(15),
            ..pattern("batch_load", CacheOp::BatchUsers { batch_size: 15 }, 0.1)
        },
    ])?;

    let thresholds = vec![
        Threshold::parse("http_req_duration", "p(95)<2000")?,
        Threshold::parse("http_req_duration", "p(99)<5000")?,
        Threshold::parse("http_req_failed", "rate<0.05")?,
    ];

    Ok(RunConfig {
        base_url: base_url.to_string(),
        setup_timeout: secs(30),
        teardown_timeout: secs(10),
        scenarios,
        workload: WorkloadSelector::uniform(workload),
        sleep: SleepPolicy::Always(Pause::Fixed(Duration::from_millis(100))),
        phases: PhasePlan::single("default"),
        thresholds,
        keys: KeySpace { users: 10_000, products: 5_000, hot_items: 100 },
        cache_hit_latency_ms: 50.0,
    })
}

/// A sudden 10→1000→10 worker spike with phase-specific behaviour: normal
/// traffic, a hot-set hammering spike that tolerates any non-5xx answer, and
/// a recovery window watching response times come back down.
fn spike(base_url: &str) -> Result<RunConfig, ConfigError> {
    let scenarios = vec![Scenario {
        name: "traffic_spike".to_string(),
        executor: ScenarioExecutor::RampingWorkers {
            start_target: 10,
            stages: vec![
                Stage { duration: mins(1), target: 10 },
                Stage { duration: secs(30), target: 1000 },
                Stage { duration: mins(2), target: 1000 },
                Stage { duration: secs(30), target: 10 },
                Stage { duration: mins(2), target: 10 },
            ],
        },
        start_offset: Duration::ZERO,
    }];

    let normal = WorkloadMix::new(vec![
        RequestPattern {
            key_limit: Some(50),
            ..pattern("normal_user", CacheOp::FetchUser, 0.7)
        },
        RequestPattern {
            key_limit: Some(20),
            ..pattern("normal_product", CacheOp::FetchProduct, 0.3)
        },
    ])?;

    // The spike hammers the top few keys and tolerates any non-5xx answer.
    let spike_mix = WorkloadMix::new(vec![
        RequestPattern {
            timeout: secs(10),
            accepted: StatusRange { min: 200, max: 499 },
            key_limit: Some(5),
            ..pattern("spike_user", CacheOp::FetchUser, 0.8)
        },
        RequestPattern {
            timeout: secs(10),
            accepted: StatusRange { min: 200, max: 499 },
            key_limit: Some(3),
            ..pattern("spike_product", CacheOp::FetchProduct, 0.2)
        },
    ])?;

    let recovery = WorkloadMix::new(vec![RequestPattern {
        timeout: secs(8),
        key_limit: Some(50),
        ..pattern("recovery_user", CacheOp::FetchUser, 1.0)
    }])?;

    let phases = PhasePlan::new(
        vec![
            ("normal".to_string(), secs(60)),
            ("spike".to_string(), secs(240)),
        ],
        "recovery",
    )?;

    let thresholds = vec![
        Threshold::parse("http_req_duration", "p(95)<3000")?,
        Threshold::parse("http_req_failed", "rate<0.15")?,
    ];

    Ok(RunConfig {
        base_url: base_url.to_string(),
        setup_timeout: secs(30),
        teardown_timeout: secs(10),
        scenarios,
        workload: WorkloadSelector::with_phase_mixes(
            normal,
            vec![
                ("spike".to_string(), spike_mix),
                ("recovery".to_string(), recovery),
            ],
        ),
        sleep: SleepPolicy::ByPhase {
            phases: vec![
                (
                    "spike".to_string(),
                    Pause::Uniform { min: Duration::ZERO, max: Duration::from_millis(500) },
                ),
                (
                    "recovery".to_string(),
                    Pause::Uniform { min: secs(1), max: secs(3) },
                ),
            ],
            default: Pause::Uniform { min: secs(1), max: secs(4) },
        },
        phases,
        thresholds,
        keys: KeySpace { users: 50, products: 20, hot_items: 10 },
        cache_hit_latency_ms: 50.0,
    })
}
