use std::time::Duration;

use rand::Rng;

use crate::config::ConfigError;

/// One operation against the cache API, as issued by a request pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheOp {
    WarmCache,
    FetchUser,
    FetchProduct,
    FetchHotItem,
    BatchUsers { batch_size: usize },
    MetricsReport,
}

/// Inclusive status-code range a pattern accepts as success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusRange {
    pub min: u16,
    pub max: u16,
}

impl StatusRange {
    /// The common case: exactly 200.
    pub fn ok() -> Self {
        Self { min: 200, max: 200 }
    }

    pub fn contains(&self, status: u16) -> bool {
        status >= self.min && status <= self.max
    }
}

/// A named request pattern with a selection weight.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestPattern {
    pub name: String,
    pub op: CacheOp,
    pub weight: f64,
    /// Per-request timeout; exceeding it ends the call as a failed outcome.
    pub timeout: Duration,
    pub accepted: StatusRange,
    /// Restrict key draws to the first N keys of the space (hot-set focus).
    pub key_limit: Option<usize>,
    /// Record cache-hit metrics for this pattern's responses.
    pub track_cache_hit: bool,
}

/// A weighted set of request patterns with precomputed cumulative bounds.
///
/// Pattern `i` owns the draw interval `(c_{i-1}, c_i]` in declaration order;
/// a draw landing exactly on a boundary selects the earlier-declared pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkloadMix {
    patterns: Vec<RequestPattern>,
    cumulative: Vec<f64>,
}

impl WorkloadMix {
    /// Normalize the weights to sum 1.0 and build the cumulative table.
    /// Rejects an empty pattern list, negative weights, and a zero weight sum.
    pub fn new(patterns: Vec<RequestPattern>) -> Result<Self, ConfigError> {
        if patterns.is_empty() {
            return Err(ConfigError::InvalidWeights(
                "workload must declare at least one pattern".to_string(),
            ));
        }
        if let Some(p) = patterns.iter().find(|p| p.weight < 0.0 || !p.weight.is_finite()) {
            return Err(ConfigError::InvalidWeights(format!(
                "pattern {:?} has invalid weight {}",
                p.name, p.weight
            )));
        }
        let total: f64 = patterns.iter().map(|p| p.weight).sum();
        if total <= 0.0 {
            return Err(ConfigError::InvalidWeights(
                "pattern weights must sum to a positive value".to_string(),
            ));
        }

        let mut cumulative = Vec::with_capacity(patterns.len());
        let mut acc = 0.0;
        for p in &patterns {
            acc += p.weight / total;
            cumulative.push(acc);
        }
        // Float summation drift must not leave the final interval open.
        if let Some(last) = cumulative.last_mut() {
            *last = 1.0;
        }

        Ok(Self { patterns, cumulative })
    }

    /// Select the pattern owning `draw` (expected in `[0, 1)`): the first one
    /// whose cumulative bound is `>= draw`. Exposed for deterministic testing.
    pub fn pick(&self, draw: f64) -> &RequestPattern {
        let idx = self
            .cumulative
            .iter()
            .position(|c| draw <= *c)
            .unwrap_or(self.patterns.len() - 1);
        &self.patterns[idx]
    }

    /// Draw a uniform value in `[0, 1)` and pick.
    pub fn sample(&self, rng: &mut impl Rng) -> &RequestPattern {
        self.pick(rng.gen::<f64>())
    }

    pub fn patterns(&self) -> &[RequestPattern] {
        &self.patterns
    }
}

/// Selects the workload mix for the current phase, falling back to the
/// default mix for phases without an override.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkloadSelector {
    default: WorkloadMix,
    by_phase: Vec<(String, WorkloadMix)>,
}

impl WorkloadSelector {
    pub fn uniform(mix: WorkloadMix) -> Self {
        Self { default: mix, by_phase: Vec::new() }
    }

    pub fn with_phase_mixes(default: WorkloadMix, by_phase: Vec<(String, WorkloadMix)>) -> Self {
        Self { default, by_phase }
    }

    pub fn mix_for(&self, phase: &str) -> &WorkloadMix {
        self.by_phase
            .iter()
            .find(|(name, _)| name == phase)
            .map(|(_, mix)| mix)
            .unwrap_or(&self.default)
    }

    /// Every mix in the selector (default first), for validation sweeps.
    pub fn mixes(&self) -> impl Iterator<Item = &WorkloadMix> {
        std::iter::once(&self.default).chain(self.by_phase.iter().map(|(_, m)| m))
    }
}

/// A single inter-iteration pause specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pause {
    Fixed(Duration),
    Uniform { min: Duration, max: Duration },
}

impl Pause {
    fn duration(&self, rng: &mut impl Rng) -> Duration {
        match self {
            Pause::Fixed(d) => *d,
            Pause::Uniform { min, max } => {
                if max <= min {
                    return *min;
                }
                let spread = (*max - *min).as_secs_f64();
                *min + Duration::from_secs_f64(rng.gen::<f64>() * spread)
            }
        }
    }
}

/// How long a worker sleeps between iterations: one pause for the whole run,
/// or a per-phase table with a default.
#[derive(Debug, Clone, PartialEq)]
pub enum SleepPolicy {
    Always(Pause),
    ByPhase { phases: Vec<(String, Pause)>, default: Pause },
}

impl SleepPolicy {
    pub fn duration_for(&self, phase: &str, rng: &mut impl Rng) -> Duration {
        match self {
            SleepPolicy::Always(pause) => pause.duration(rng),
            SleepPolicy::ByPhase { phases, default } => phases
                .iter()
                .find(|(name, _)| name == phase)
                .map(|(_, pause)| pause)
                .unwrap_or(default)
                .duration(rng),
        }
    }
}
