use std::time::{Duration, Instant};

/// Monotonic run clock shared by every component of a run.
///
/// The start instant is fixed at construction; all scheduling, phase
/// resolution and scenario interpolation is a pure function of `elapsed()`.
#[derive(Debug, Clone, Copy)]
pub struct RunClock {
    start: Instant,
}

impl RunClock {
    pub fn start() -> Self {
        Self { start: Instant::now() }
    }

    /// Time elapsed since the run started.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}
