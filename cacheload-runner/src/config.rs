use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::phase::PhasePlan;
use crate::scenario::{Scenario, ScenarioExecutor, Stage};
use crate::threshold::Threshold;
use crate::workload::{
    CacheOp, Pause, RequestPattern, SleepPolicy, StatusRange, WorkloadMix, WorkloadSelector,
};

/// Configuration rejected at construction time.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(String),

    #[error("Failed to parse config file: {0}")]
    Parse(String),

    #[error("Invalid duration {0:?}: expected forms like \"500ms\", \"30s\", \"1m\", \"8m30s\"")]
    InvalidDuration(String),

    #[error("Invalid scenario {scenario:?}: {reason}")]
    InvalidScenario { scenario: String, reason: String },

    #[error("Invalid workload weights: {0}")]
    InvalidWeights(String),

    #[error("Invalid threshold {expression:?} on metric {metric:?}: {reason}")]
    InvalidThreshold {
        metric: String,
        expression: String,
        reason: String,
    },

    #[error("Invalid phase table: {0}")]
    InvalidPhases(String),

    #[error("Invalid sleep policy: {0}")]
    InvalidSleep(String),

    #[error("Invalid key space: {0}")]
    InvalidKeys(String),
}

/// Sizes of the synthetic ID pools (`user1..userN`, `product1..productN`,
/// `hotdata1..hotdataN`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeySpace {
    pub users: usize,
    pub products: usize,
    pub hot_items: usize,
}

/// The complete, validated, immutable configuration of one run. Constructed
/// once at startup — from a built-in plan or a JSON file — and never mutated
/// mid-run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub base_url: String,
    /// Timeout for the one-time setup warmup call.
    pub setup_timeout: Duration,
    /// Timeout for the one-time teardown report fetch.
    pub teardown_timeout: Duration,
    pub scenarios: Vec<Scenario>,
    pub workload: WorkloadSelector,
    pub sleep: SleepPolicy,
    pub phases: PhasePlan,
    pub thresholds: Vec<Threshold>,
    pub keys: KeySpace,
    /// A successful response faster than this is counted as a cache hit by
    /// patterns that track hits. Best-effort heuristic; cross-check against
    /// the service's own report.
    pub cache_hit_latency_ms: f64,
}

impl RunConfig {
    /// Load and validate a JSON run configuration.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        let file: RunConfigFile =
            serde_json::from_str(&raw).map_err(|e| ConfigError::Parse(e.to_string()))?;
        file.into_config()
    }

    /// Multiply every scenario duration, start offset and phase boundary by
    /// `factor`. Sleeps and request timeouts are left alone: a scaled-down
    /// smoke run should still issue realistic requests.
    pub fn scale_durations(&mut self, factor: f64) {
        for scenario in &mut self.scenarios {
            scenario.start_offset = scenario.start_offset.mul_f64(factor);
            match &mut scenario.executor {
                ScenarioExecutor::RampingWorkers { stages, .. } => {
                    for stage in stages {
                        stage.duration = stage.duration.mul_f64(factor);
                    }
                }
                ScenarioExecutor::ConstantWorkers { duration, .. } => {
                    *duration = duration.mul_f64(factor);
                }
                ScenarioExecutor::PerWorkerIterations { .. } => {}
            }
        }
        self.phases.scale(factor);
    }

    /// Structural checks that hold regardless of how the config was built.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scenarios.is_empty() {
            return Err(ConfigError::InvalidScenario {
                scenario: "<none>".to_string(),
                reason: "at least one scenario is required".to_string(),
            });
        }
        let mut seen = BTreeMap::new();
        for scenario in &self.scenarios {
            if scenario.name.is_empty() {
                return Err(ConfigError::InvalidScenario {
                    scenario: scenario.name.clone(),
                    reason: "scenario name must not be empty".to_string(),
                });
            }
            if seen.insert(scenario.name.clone(), ()).is_some() {
                return Err(ConfigError::InvalidScenario {
                    scenario: scenario.name.clone(),
                    reason: "duplicate scenario name".to_string(),
                });
            }
            match &scenario.executor {
                ScenarioExecutor::PerWorkerIterations { workers, iterations } => {
                    if *workers == 0 || *iterations == 0 {
                        return Err(ConfigError::InvalidScenario {
                            scenario: scenario.name.clone(),
                            reason: "workers and iterations must be positive".to_string(),
                        });
                    }
                }
                ScenarioExecutor::RampingWorkers { stages, .. } => {
                    if stages.is_empty() {
                        return Err(ConfigError::InvalidScenario {
                            scenario: scenario.name.clone(),
                            reason: "ramping scenario needs at least one stage".to_string(),
                        });
                    }
                }
                ScenarioExecutor::ConstantWorkers { workers, duration } => {
                    if *workers == 0 || duration.is_zero() {
                        return Err(ConfigError::InvalidScenario {
                            scenario: scenario.name.clone(),
                            reason: "constant scenario needs workers and a duration".to_string(),
                        });
                    }
                }
            }
        }
        if self.keys.users == 0 || self.keys.products == 0 || self.keys.hot_items == 0 {
            return Err(ConfigError::InvalidKeys(format!(
                "every key pool must be non-empty (users {}, products {}, hot_items {})",
                self.keys.users, self.keys.products, self.keys.hot_items
            )));
        }
        Ok(())
    }
}

/// Parse a duration string: one or more `<number><unit>` groups, units
/// `ms`, `s`, `m`, `h` (compound forms like `"8m30s"` work).
pub fn parse_duration(s: &str) -> Result<Duration, ConfigError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(ConfigError::InvalidDuration(s.to_string()));
    }

    let mut total = Duration::ZERO;
    let mut rest = s;
    while !rest.is_empty() {
        let digits_end = rest
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| ConfigError::InvalidDuration(s.to_string()))?;
        if digits_end == 0 {
            return Err(ConfigError::InvalidDuration(s.to_string()));
        }
        let value: u64 = rest[..digits_end]
            .parse()
            .map_err(|_| ConfigError::InvalidDuration(s.to_string()))?;
        rest = &rest[digits_end..];

        let unit_end = rest
            .find(|c: char| c.is_ascii_digit())
            .unwrap_or(rest.len());
        let unit = &rest[..unit_end];
        rest = &rest[unit_end..];

        total += match unit {
            "ms" => Duration::from_millis(value),
            "s" => Duration::from_secs(value),
            "m" => Duration::from_secs(value * 60),
            "h" => Duration::from_secs(value * 3600),
            _ => return Err(ConfigError::InvalidDuration(s.to_string())),
        };
    }
    Ok(total)
}

// --- JSON file schema ---

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RunConfigFile {
    base_url: String,
    #[serde(default = "default_setup_timeout")]
    setup_timeout: String,
    #[serde(default = "default_teardown_timeout")]
    teardown_timeout: String,
    scenarios: Vec<ScenarioFile>,
    workload: Vec<PatternFile>,
    #[serde(default)]
    phase_workloads: BTreeMap<String, Vec<PatternFile>>,
    sleep: SleepFile,
    #[serde(default)]
    phases: Option<PhasesFile>,
    #[serde(default)]
    thresholds: Vec<ThresholdFile>,
    keys: KeySpaceFile,
    #[serde(default = "default_hit_latency")]
    cache_hit_latency_ms: f64,
}

fn default_setup_timeout() -> String {
    "30s".to_string()
}

fn default_teardown_timeout() -> String {
    "10s".to_string()
}

fn default_hit_latency() -> f64 {
    50.0
}

#[derive(Debug, Deserialize)]
#[serde(tag = "executor", rename_all = "kebab-case")]
enum ExecutorFile {
    PerWorkerIterations { workers: u32, iterations: u32 },
    RampingWorkers {
        #[serde(default)]
        start_target: u32,
        stages: Vec<StageFile>,
    },
    ConstantWorkers { workers: u32, duration: String },
}

#[derive(Debug, Deserialize)]
struct ScenarioFile {
    name: String,
    #[serde(flatten)]
    executor: ExecutorFile,
    #[serde(default)]
    start_offset: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StageFile {
    duration: String,
    target: u32,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
enum OpFile {
    WarmCache,
    FetchUser,
    FetchProduct,
    FetchHotItem,
    BatchUsers { batch_size: usize },
    MetricsReport,
}

#[derive(Debug, Deserialize)]
struct PatternFile {
    name: String,
    #[serde(flatten)]
    op: OpFile,
    weight: f64,
    #[serde(default = "default_pattern_timeout")]
    timeout: String,
    /// Inclusive `[min, max]` accepted status range; defaults to exactly 200.
    #[serde(default)]
    accepted: Option<(u16, u16)>,
    #[serde(default)]
    key_limit: Option<usize>,
    #[serde(default)]
    track_cache_hit: bool,
}

fn default_pattern_timeout() -> String {
    "5s".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
enum PauseFile {
    Fixed { duration: String },
    Uniform { min: String, max: String },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SleepFile {
    Always(PauseFile),
    ByPhase {
        default: PauseFile,
        phases: BTreeMap<String, PauseFile>,
    },
}

#[derive(Debug, Deserialize)]
struct PhasesFile {
    bounded: Vec<(String, String)>,
    terminal: String,
}

#[derive(Debug, Deserialize)]
struct ThresholdFile {
    metric: String,
    expression: String,
}

#[derive(Debug, Deserialize)]
struct KeySpaceFile {
    users: usize,
    products: usize,
    hot_items: usize,
}

impl RunConfigFile {
    fn into_config(self) -> Result<RunConfig, ConfigError> {
        let scenarios = self
            .scenarios
            .into_iter()
            .map(convert_scenario)
            .collect::<Result<Vec<_>, _>>()?;

        let default_mix = convert_mix(self.workload)?;
        let by_phase = self
            .phase_workloads
            .into_iter()
            .map(|(phase, patterns)| Ok((phase, convert_mix(patterns)?)))
            .collect::<Result<Vec<_>, ConfigError>>()?;
        let workload = WorkloadSelector::with_phase_mixes(default_mix, by_phase);

        let sleep = convert_sleep(self.sleep)?;

        let phases = match self.phases {
            Some(p) => {
                let bounded = p
                    .bounded
                    .into_iter()
                    .map(|(name, bound)| Ok((name, parse_duration(&bound)?)))
                    .collect::<Result<Vec<_>, ConfigError>>()?;
                PhasePlan::new(bounded, p.terminal)?
            }
            None => PhasePlan::single("default"),
        };

        let thresholds = self
            .thresholds
            .into_iter()
            .map(|t| Threshold::parse(&t.metric, &t.expression))
            .collect::<Result<Vec<_>, _>>()?;

        let config = RunConfig {
            base_url: self.base_url,
            setup_timeout: parse_duration(&self.setup_timeout)?,
            teardown_timeout: parse_duration(&self.teardown_timeout)?,
            scenarios,
            workload,
            sleep,
            phases,
            thresholds,
            keys: KeySpace {
                users: self.keys.users,
                products: self.keys.products,
                hot_items: self.keys.hot_items,
            },
            cache_hit_latency_ms: self.cache_hit_latency_ms,
        };
        config.validate()?;
        Ok(config)
    }
}

fn convert_scenario(file: ScenarioFile) -> Result<Scenario, ConfigError> {
    let start_offset = match file.start_offset {
        Some(s) => parse_duration(&s)?,
        None => Duration::ZERO,
    };
    let executor = match file.executor {
        ExecutorFile::PerWorkerIterations { workers, iterations } => {
            ScenarioExecutor::PerWorkerIterations { workers, iterations }
        }
        ExecutorFile::RampingWorkers { start_target, stages } => ScenarioExecutor::RampingWorkers {
            start_target,
            stages: stages
                .into_iter()
                .map(|s| {
                    Ok(Stage {
                        duration: parse_duration(&s.duration)?,
                        target: s.target,
                    })
                })
                .collect::<Result<Vec<_>, ConfigError>>()?,
        },
        ExecutorFile::ConstantWorkers { workers, duration } => ScenarioExecutor::ConstantWorkers {
            workers,
            duration: parse_duration(&duration)?,
        },
    };
    Ok(Scenario { name: file.name, executor, start_offset })
}

fn convert_mix(patterns: Vec<PatternFile>) -> Result<WorkloadMix, ConfigError> {
    let patterns = patterns
        .into_iter()
        .map(|p| {
            let accepted = match p.accepted {
                Some((min, max)) => StatusRange { min, max },
                None => StatusRange::ok(),
            };
            let op = match p.op {
                OpFile::WarmCache => CacheOp::WarmCache,
                OpFile::FetchUser => CacheOp::FetchUser,
                OpFile::FetchProduct => CacheOp::FetchProduct,
                OpFile::FetchHotItem => CacheOp::FetchHotItem,
                OpFile::BatchUsers { batch_size } => CacheOp::BatchUsers { batch_size },
                OpFile::MetricsReport => CacheOp::MetricsReport,
            };
            Ok(RequestPattern {
                name: p.name,
                op,
                weight: p.weight,
                timeout: parse_duration(&p.timeout)?,
                accepted,
                key_limit: p.key_limit,
                track_cache_hit: p.track_cache_hit,
            })
        })
        .collect::<Result<Vec<_>, ConfigError>>()?;
    WorkloadMix::new(patterns)
}

fn convert_pause(file: PauseFile) -> Result<Pause, ConfigError> {
    match file {
        PauseFile::Fixed { duration } => Ok(Pause::Fixed(parse_duration(&duration)?)),
        PauseFile::Uniform { min, max } => {
            let min = parse_duration(&min)?;
            let max = parse_duration(&max)?;
            if max < min {
                return Err(ConfigError::InvalidSleep(format!(
                    "uniform range inverted: min {min:?} > max {max:?}"
                )));
            }
            Ok(Pause::Uniform { min, max })
        }
    }
}

fn convert_sleep(file: SleepFile) -> Result<SleepPolicy, ConfigError> {
    match file {
        SleepFile::Always(pause) => Ok(SleepPolicy::Always(convert_pause(pause)?)),
        SleepFile::ByPhase { default, phases } => Ok(SleepPolicy::ByPhase {
            default: convert_pause(default)?,
            phases: phases
                .into_iter()
                .map(|(name, pause)| Ok((name, convert_pause(pause)?)))
                .collect::<Result<Vec<_>, ConfigError>>()?,
        }),
    }
}
