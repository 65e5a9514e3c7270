use std::time::Duration;

/// One time-bounded segment of a ramping scenario: over `duration`, the
/// concurrency target moves linearly from the previous stage's end value to
/// `target`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stage {
    pub duration: Duration,
    pub target: u32,
}

/// How a scenario drives its worker count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScenarioExecutor {
    /// Spawn `workers` once at scenario start; each runs `iterations`
    /// iterations and retires. Concurrency is iteration-driven, not
    /// time-driven.
    PerWorkerIterations { workers: u32, iterations: u32 },
    /// Ramp through `stages`, starting from `start_target` at the scenario's
    /// first instant.
    RampingWorkers { start_target: u32, stages: Vec<Stage> },
    /// Hold `workers` for the full `duration`.
    ConstantWorkers { workers: u32, duration: Duration },
}

/// A declarative load scenario. Multiple scenarios run concurrently, each
/// reconciled against its own `start_offset`-shifted view of the run clock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scenario {
    pub name: String,
    pub executor: ScenarioExecutor,
    pub start_offset: Duration,
}

impl Scenario {
    /// The scenario's time span measured from its own start (excluding
    /// `start_offset`). `None` for iteration-driven scenarios, whose end is
    /// determined by workers finishing their budgets.
    pub fn span(&self) -> Option<Duration> {
        match &self.executor {
            ScenarioExecutor::PerWorkerIterations { .. } => None,
            ScenarioExecutor::RampingWorkers { stages, .. } => {
                Some(stages.iter().map(|s| s.duration).sum())
            }
            ScenarioExecutor::ConstantWorkers { duration, .. } => Some(*duration),
        }
    }

    /// Target concurrency at `run_elapsed` (time since the whole run started).
    ///
    /// Pure function: 0 before `start_offset` and at or past the scenario's
    /// end; linear interpolation inside ramping stages. For
    /// `per-worker-iterations` this returns the nominal worker count — the
    /// scheduler spawns that set exactly once and lets the workers retire
    /// themselves.
    pub fn target_at(&self, run_elapsed: Duration) -> u32 {
        if run_elapsed < self.start_offset {
            return 0;
        }
        let t = run_elapsed - self.start_offset;

        match &self.executor {
            ScenarioExecutor::PerWorkerIterations { workers, .. } => *workers,
            ScenarioExecutor::ConstantWorkers { workers, duration } => {
                if t < *duration {
                    *workers
                } else {
                    0
                }
            }
            ScenarioExecutor::RampingWorkers { start_target, stages } => {
                ramp_target(*start_target, stages, t)
            }
        }
    }
}

/// Interpolated target `t` into a stage list: the first stage ramps from
/// `start_target`, each subsequent stage from its predecessor's end target.
/// Past the last stage the target is 0.
fn ramp_target(start_target: u32, stages: &[Stage], t: Duration) -> u32 {
    let mut stage_start = Duration::ZERO;
    let mut prev_target = start_target;

    for stage in stages {
        let stage_end = stage_start + stage.duration;
        if t < stage_end {
            let frac = if stage.duration.is_zero() {
                1.0
            } else {
                (t - stage_start).as_secs_f64() / stage.duration.as_secs_f64()
            };
            let from = prev_target as f64;
            let to = stage.target as f64;
            return (from + (to - from) * frac.clamp(0.0, 1.0)).round() as u32;
        }
        stage_start = stage_end;
        prev_target = stage.target;
    }

    0
}
