use log::warn;

use crate::config::ConfigError;
use crate::metrics::{MetricSummary, Summary};

/// Which aggregate of the metric the expression compares against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Selector {
    /// `rate` — a Rate metric's hits/total fraction.
    Rate,
    /// `count` — a Counter's total.
    Count,
    /// `avg` — a Trend's arithmetic mean.
    Avg,
    /// `p(N)` — a Trend's nearest-rank percentile.
    Percentile(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
}

impl CmpOp {
    fn apply(&self, value: f64, bound: f64) -> bool {
        match self {
            CmpOp::Lt => value < bound,
            CmpOp::Le => value <= bound,
            CmpOp::Gt => value > bound,
            CmpOp::Ge => value >= bound,
            CmpOp::Eq => value == bound,
        }
    }
}

/// A parsed pass/fail rule such as `http_req_duration: p(95)<500` or
/// `http_req_failed: rate<0.01`, evaluated once against the final summary.
#[derive(Debug, Clone, PartialEq)]
pub struct Threshold {
    pub metric: String,
    pub expression: String,
    selector: Selector,
    op: CmpOp,
    bound: f64,
}

impl Threshold {
    /// Parse `expression` (`selector op bound`). Whitespace around tokens is
    /// ignored. Fails at construction, never at evaluation.
    pub fn parse(metric: &str, expression: &str) -> Result<Self, ConfigError> {
        let compact: String = expression.chars().filter(|c| !c.is_whitespace()).collect();

        // Selector names never contain operator characters, so the first
        // `<`, `>` or `=` starts the operator.
        let op_at = compact
            .find(['<', '>', '='])
            .ok_or_else(|| invalid(metric, expression, "no comparison operator"))?;

        let selector_str = &compact[..op_at];
        let rest = &compact[op_at..];

        let (op, bound_str) = if let Some(b) = rest.strip_prefix("<=") {
            (CmpOp::Le, b)
        } else if let Some(b) = rest.strip_prefix(">=") {
            (CmpOp::Ge, b)
        } else if let Some(b) = rest.strip_prefix("==") {
            (CmpOp::Eq, b)
        } else if let Some(b) = rest.strip_prefix('<') {
            (CmpOp::Lt, b)
        } else if let Some(b) = rest.strip_prefix('>') {
            (CmpOp::Gt, b)
        } else {
            return Err(invalid(metric, expression, "unsupported operator"));
        };

        let selector = parse_selector(selector_str)
            .ok_or_else(|| invalid(metric, expression, "unknown selector"))?;

        let bound: f64 = bound_str
            .parse()
            .map_err(|_| invalid(metric, expression, "bound is not a number"))?;

        Ok(Self {
            metric: metric.to_string(),
            expression: expression.to_string(),
            selector,
            op,
            bound,
        })
    }

    /// `"metric: expression"`, for reports and verdict maps.
    pub fn label(&self) -> String {
        format!("{}: {}", self.metric, self.expression)
    }

    /// Check this threshold against the summary. A metric that is absent or
    /// recorded zero samples fails; so does a selector/kind mismatch.
    pub fn check(&self, summary: &Summary) -> bool {
        let Some(metric) = summary.get(&self.metric) else {
            warn!("threshold on absent metric {:?} fails", self.metric);
            return false;
        };
        if metric.sample_count() == 0 {
            return false;
        }
        let Some(value) = self.observed(metric) else {
            warn!(
                "selector {:?} does not apply to {:?} metric {:?}",
                self.selector,
                metric.kind(),
                self.metric
            );
            return false;
        };
        self.op.apply(value, self.bound)
    }

    fn observed(&self, metric: &MetricSummary) -> Option<f64> {
        match self.selector {
            Selector::Rate => metric.rate(),
            Selector::Count => metric.total(),
            Selector::Avg => metric.mean(),
            Selector::Percentile(p) => metric.percentile(p),
        }
    }
}

/// Outcome of evaluating every threshold: per-threshold booleans keyed by
/// label, and their logical AND.
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub passed: bool,
    pub per_threshold: Vec<(String, bool)>,
}

/// Evaluate all thresholds against the final summary. An empty threshold
/// list passes vacuously.
pub fn evaluate(thresholds: &[Threshold], summary: &Summary) -> Verdict {
    let per_threshold: Vec<(String, bool)> = thresholds
        .iter()
        .map(|t| (t.label(), t.check(summary)))
        .collect();
    let passed = per_threshold.iter().all(|(_, ok)| *ok);
    Verdict { passed, per_threshold }
}

fn parse_selector(s: &str) -> Option<Selector> {
    match s {
        "rate" => Some(Selector::Rate),
        "count" => Some(Selector::Count),
        "avg" => Some(Selector::Avg),
        _ => {
            let inner = s.strip_prefix("p(")?.strip_suffix(')')?;
            let p: f64 = inner.parse().ok()?;
            if (0.0..=100.0).contains(&p) {
                Some(Selector::Percentile(p))
            } else {
                None
            }
        }
    }
}

fn invalid(metric: &str, expression: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidThreshold {
        metric: metric.to_string(),
        expression: expression.to_string(),
        reason: reason.to_string(),
    }
}
