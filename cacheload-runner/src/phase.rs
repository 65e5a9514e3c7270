use std::time::Duration;

use crate::config::ConfigError;

/// Ordered phase-boundary table: each entry names a phase and the elapsed
/// time at which it ends; the terminal phase is open-ended.
///
/// `resolve` is a pure function of elapsed time, so phase behaviour is
/// testable by supplying an elapsed value — no wall-clock mocking needed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhasePlan {
    bounded: Vec<(String, Duration)>,
    terminal: String,
}

impl PhasePlan {
    /// Build a plan from `(name, upper_bound)` pairs plus the open-ended
    /// terminal phase. Bounds must be strictly ascending, which guarantees
    /// the phase sequence never regresses as elapsed time grows.
    pub fn new(
        bounded: Vec<(String, Duration)>,
        terminal: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        for window in bounded.windows(2) {
            if window[1].1 <= window[0].1 {
                return Err(ConfigError::InvalidPhases(format!(
                    "boundary for {:?} ({:?}) does not exceed boundary for {:?} ({:?})",
                    window[1].0, window[1].1, window[0].0, window[0].1
                )));
            }
        }
        Ok(Self { bounded, terminal: terminal.into() })
    }

    /// A plan with a single open-ended phase, for runs without phase logic.
    pub fn single(name: impl Into<String>) -> Self {
        Self { bounded: Vec::new(), terminal: name.into() }
    }

    /// The phase active at `elapsed`: the first entry whose upper bound
    /// exceeds elapsed, else the terminal phase.
    pub fn resolve(&self, elapsed: Duration) -> &str {
        for (name, upper_bound) in &self.bounded {
            if elapsed < *upper_bound {
                return name;
            }
        }
        &self.terminal
    }

    /// All phase names, bounded first, terminal last.
    pub fn phase_names(&self) -> Vec<&str> {
        self.bounded
            .iter()
            .map(|(name, _)| name.as_str())
            .chain(std::iter::once(self.terminal.as_str()))
            .collect()
    }

    /// Scale every boundary by `factor` (used by `--duration-scale`).
    pub fn scale(&mut self, factor: f64) {
        for (_, bound) in &mut self.bounded {
            *bound = bound.mul_f64(factor);
        }
    }
}
