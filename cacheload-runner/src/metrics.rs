use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, RwLock};

use log::warn;

// Metric names recorded for every outcome.
pub const HTTP_REQS: &str = "http_reqs";
pub const HTTP_REQ_DURATION: &str = "http_req_duration";
pub const HTTP_REQ_FAILED: &str = "http_req_failed";

// Cache-tracking metrics, recorded only for patterns that opt in.
pub const CACHE_RESPONSE_TIME: &str = "cache_response_time";
pub const CACHE_HIT_RATE: &str = "cache_hit_rate";
pub const DB_FALLBACK_COUNT: &str = "db_fallback_count";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// Sums numeric increments.
    Counter,
    /// Tracks `(hits, total)`; every record increments total, truthy values
    /// increment hits.
    Rate,
    /// Retains every sample for percentile/mean computation.
    Trend,
}

#[derive(Debug, Default)]
struct RateState {
    hits: u64,
    total: u64,
}

enum MetricCell {
    Counter(Mutex<f64>),
    Rate(Mutex<RateState>),
    Trend(Mutex<Vec<f64>>),
}

impl MetricCell {
    fn new(kind: MetricKind) -> Self {
        match kind {
            MetricKind::Counter => MetricCell::Counter(Mutex::new(0.0)),
            MetricKind::Rate => MetricCell::Rate(Mutex::new(RateState::default())),
            MetricKind::Trend => MetricCell::Trend(Mutex::new(Vec::new())),
        }
    }

    fn kind(&self) -> MetricKind {
        match self {
            MetricCell::Counter(_) => MetricKind::Counter,
            MetricCell::Rate(_) => MetricKind::Rate,
            MetricCell::Trend(_) => MetricKind::Trend,
        }
    }
}

/// Per-run metrics registry, safe for concurrent recorders.
///
/// One engine instance is created per run and handed to every worker — there
/// is no process-wide registry. Each metric sits behind its own lock, so
/// recording into unrelated metrics never serializes; the registry map itself
/// takes a write lock only when a name is first seen.
pub struct MetricsEngine {
    metrics: RwLock<HashMap<String, Arc<MetricCell>>>,
}

impl Default for MetricsEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsEngine {
    pub fn new() -> Self {
        Self { metrics: RwLock::new(HashMap::new()) }
    }

    /// Record one sample. For a `Rate` metric any non-zero value is truthy.
    /// A kind conflict with an existing metric of the same name is logged and
    /// the sample dropped; recording never panics mid-run.
    pub fn record(&self, name: &str, kind: MetricKind, value: f64) {
        let cell = self.cell(name, kind);
        if cell.kind() != kind {
            warn!(
                "metric {name:?} already registered as {:?}, dropping {kind:?} sample",
                cell.kind()
            );
            return;
        }
        match &*cell {
            MetricCell::Counter(total) => {
                let mut total = total.lock().unwrap_or_else(|e| e.into_inner());
                *total += value;
            }
            MetricCell::Rate(state) => {
                let mut state = state.lock().unwrap_or_else(|e| e.into_inner());
                state.total += 1;
                if value != 0.0 {
                    state.hits += 1;
                }
            }
            MetricCell::Trend(samples) => {
                let mut samples = samples.lock().unwrap_or_else(|e| e.into_inner());
                samples.push(value);
            }
        }
    }

    /// Convenience for `Rate` metrics fed booleans.
    pub fn record_flag(&self, name: &str, hit: bool) {
        self.record(name, MetricKind::Rate, if hit { 1.0 } else { 0.0 });
    }

    /// Immutable snapshot of every metric. Intended for the end-of-run sync
    /// point: each cell is locked independently while copied, so the snapshot
    /// is per-metric consistent. Calling it twice without intervening records
    /// yields identical snapshots.
    pub fn summarize(&self) -> Summary {
        let metrics = self.metrics.read().unwrap_or_else(|e| e.into_inner());
        let mut snapshot = BTreeMap::new();
        for (name, cell) in metrics.iter() {
            let summary = match &**cell {
                MetricCell::Counter(total) => MetricSummary::Counter {
                    total: *total.lock().unwrap_or_else(|e| e.into_inner()),
                },
                MetricCell::Rate(state) => {
                    let state = state.lock().unwrap_or_else(|e| e.into_inner());
                    MetricSummary::Rate { hits: state.hits, total: state.total }
                }
                MetricCell::Trend(samples) => {
                    let mut samples = samples.lock().unwrap_or_else(|e| e.into_inner()).clone();
                    samples.sort_by(f64::total_cmp);
                    MetricSummary::Trend { samples }
                }
            };
            snapshot.insert(name.clone(), summary);
        }
        Summary { metrics: snapshot }
    }

    /// Fetch the cell for `name`, registering it with `kind` on first use.
    fn cell(&self, name: &str, kind: MetricKind) -> Arc<MetricCell> {
        if let Some(cell) = self
            .metrics
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
        {
            return Arc::clone(cell);
        }
        let mut metrics = self.metrics.write().unwrap_or_else(|e| e.into_inner());
        Arc::clone(
            metrics
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(MetricCell::new(kind))),
        )
    }
}

/// Immutable end-of-run snapshot of all metrics, keyed by name.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    metrics: BTreeMap<String, MetricSummary>,
}

impl Summary {
    pub fn get(&self, name: &str) -> Option<&MetricSummary> {
        self.metrics.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetricSummary)> {
        self.metrics.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }
}

/// Final aggregate of one metric. Trend samples are stored sorted ascending,
/// which makes percentile lookups deterministic regardless of arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricSummary {
    Counter { total: f64 },
    Rate { hits: u64, total: u64 },
    Trend { samples: Vec<f64> },
}

impl MetricSummary {
    pub fn kind(&self) -> MetricKind {
        match self {
            MetricSummary::Counter { .. } => MetricKind::Counter,
            MetricSummary::Rate { .. } => MetricKind::Rate,
            MetricSummary::Trend { .. } => MetricKind::Trend,
        }
    }

    /// Number of recorded samples. Counters do not track a sample count, but
    /// a counter only appears in the snapshot once something recorded into
    /// it, so it is never empty.
    pub fn sample_count(&self) -> u64 {
        match self {
            MetricSummary::Counter { .. } => 1,
            MetricSummary::Rate { total, .. } => *total,
            MetricSummary::Trend { samples } => samples.len() as u64,
        }
    }

    /// `hits / total` for a Rate; 0 when no samples were recorded.
    pub fn rate(&self) -> Option<f64> {
        match self {
            MetricSummary::Rate { hits, total } => {
                if *total == 0 {
                    Some(0.0)
                } else {
                    Some(*hits as f64 / *total as f64)
                }
            }
            _ => None,
        }
    }

    /// Counter total.
    pub fn total(&self) -> Option<f64> {
        match self {
            MetricSummary::Counter { total } => Some(*total),
            _ => None,
        }
    }

    /// Arithmetic mean of a Trend's samples.
    pub fn mean(&self) -> Option<f64> {
        match self {
            MetricSummary::Trend { samples } if !samples.is_empty() => {
                Some(samples.iter().sum::<f64>() / samples.len() as f64)
            }
            _ => None,
        }
    }

    /// Nearest-rank percentile of a Trend: the value at rank
    /// `ceil(p/100 * n)` (1-based) of the sorted samples.
    pub fn percentile(&self, p: f64) -> Option<f64> {
        match self {
            MetricSummary::Trend { samples } if !samples.is_empty() => {
                let n = samples.len();
                let rank = ((p / 100.0) * n as f64).ceil() as usize;
                let idx = rank.saturating_sub(1).min(n - 1);
                Some(samples[idx])
            }
            _ => None,
        }
    }
}
