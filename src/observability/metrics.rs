// Metrics for judge operations
//
// Counters for run outcomes, session verdicts, ambiguity retries and checker
// failures, plus execution and session latency histograms. Exported in
// Prometheus text format.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::config::types::{ExecutionStatus, Verdict};

/// Counter metric (monotonically increasing)
#[derive(Debug)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    pub fn new() -> Self {
        Self {
            value: AtomicU64::new(0),
        }
    }

    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

impl Default for Counter {
    fn default() -> Self {
        Self::new()
    }
}

/// Gauge metric (can go up or down)
#[derive(Debug)]
pub struct Gauge {
    value: AtomicU64,
}

impl Gauge {
    pub fn new() -> Self {
        Self {
            value: AtomicU64::new(0),
        }
    }

    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dec(&self) {
        self.value.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

impl Default for Gauge {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
struct HistogramBucket {
    le: f64, // upper bound in seconds
    count: AtomicU64,
}

/// Histogram metric for latency tracking
#[derive(Debug)]
pub struct Histogram {
    buckets: Vec<HistogramBucket>,
    sum: AtomicU64, // microseconds
    count: AtomicU64,
}

impl Histogram {
    /// Buckets sized for program runs: 10ms up to two minutes
    pub fn new_latency() -> Self {
        let bucket_bounds = [0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 120.0];

        let buckets = bucket_bounds
            .into_iter()
            .map(|le| HistogramBucket {
                le,
                count: AtomicU64::new(0),
            })
            .collect();

        Self {
            buckets,
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    pub fn observe(&self, value: Duration) {
        let seconds = value.as_secs_f64();

        self.sum.fetch_add(value.as_micros() as u64, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);

        for bucket in &self.buckets {
            if seconds <= bucket.le {
                bucket.count.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn get_count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn get_bucket_count(&self, le: f64) -> u64 {
        self.buckets
            .iter()
            .find(|b| (b.le - le).abs() < 0.0001)
            .map(|b| b.count.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    fn render(&self, name: &str, help: &str, output: &mut String) {
        output.push_str(&format!("# HELP {} {}\n", name, help));
        output.push_str(&format!("# TYPE {} histogram\n", name));
        for bucket in &self.buckets {
            output.push_str(&format!(
                "{}_bucket{{le=\"{}\"}} {}\n",
                name,
                bucket.le,
                bucket.count.load(Ordering::Relaxed)
            ));
        }
        output.push_str(&format!(
            "{}_sum {}\n",
            name,
            self.sum.load(Ordering::Relaxed) as f64 / 1_000_000.0
        ));
        output.push_str(&format!("{}_count {}\n", name, self.get_count()));
    }
}

/// Global metrics registry
#[derive(Debug)]
pub struct MetricsRegistry {
    // Single-run outcomes
    pub executions_total: Counter,
    pub executions_ok: Counter,
    pub executions_ce: Counter,
    pub executions_tle: Counter,
    pub executions_mle: Counter,
    pub executions_re: Counter,
    pub executions_ie: Counter,

    // Session verdicts, indexed like `Verdict::ALL`
    verdicts: [Counter; 8],

    pub ambiguity_retries: Counter,
    pub checker_failures: Counter,
    pub toolchain_missing: Counter,

    pub active_sessions: Gauge,

    pub execution_duration: Histogram,
    pub session_duration: Histogram,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self {
            executions_total: Counter::new(),
            executions_ok: Counter::new(),
            executions_ce: Counter::new(),
            executions_tle: Counter::new(),
            executions_mle: Counter::new(),
            executions_re: Counter::new(),
            executions_ie: Counter::new(),

            verdicts: Default::default(),

            ambiguity_retries: Counter::new(),
            checker_failures: Counter::new(),
            toolchain_missing: Counter::new(),

            active_sessions: Gauge::new(),

            execution_duration: Histogram::new_latency(),
            session_duration: Histogram::new_latency(),
        }
    }

    /// Record one classified run
    pub fn record_execution(&self, status: &ExecutionStatus, duration: Duration) {
        self.executions_total.inc();
        self.execution_duration.observe(duration);

        match status {
            ExecutionStatus::Ok => self.executions_ok.inc(),
            ExecutionStatus::CompilationError => self.executions_ce.inc(),
            ExecutionStatus::TimeLimit => self.executions_tle.inc(),
            ExecutionStatus::MemoryLimit => self.executions_mle.inc(),
            ExecutionStatus::RuntimeError => self.executions_re.inc(),
            ExecutionStatus::InternalError => self.executions_ie.inc(),
        }
    }

    /// Record the terminal verdict of a grading session
    pub fn record_verdict(&self, verdict: Verdict, duration: Duration) {
        self.session_duration.observe(duration);
        if let Some(index) = Verdict::ALL.iter().position(|v| *v == verdict) {
            self.verdicts[index].inc();
        }
    }

    pub fn verdict_count(&self, verdict: Verdict) -> u64 {
        Verdict::ALL
            .iter()
            .position(|v| *v == verdict)
            .map(|index| self.verdicts[index].get())
            .unwrap_or(0)
    }

    /// Export metrics in Prometheus text format
    pub fn export_prometheus(&self) -> String {
        let mut output = String::new();

        output.push_str("# HELP judgebox_executions_total Total number of program runs\n");
        output.push_str("# TYPE judgebox_executions_total counter\n");
        output.push_str(&format!(
            "judgebox_executions_total {}\n",
            self.executions_total.get()
        ));

        output.push_str("# HELP judgebox_executions_by_status Program runs by status\n");
        output.push_str("# TYPE judgebox_executions_by_status counter\n");
        for (status, counter) in [
            ("OK", &self.executions_ok),
            ("CE", &self.executions_ce),
            ("TLE", &self.executions_tle),
            ("MLE", &self.executions_mle),
            ("RE", &self.executions_re),
            ("IE", &self.executions_ie),
        ] {
            output.push_str(&format!(
                "judgebox_executions_by_status{{status=\"{}\"}} {}\n",
                status,
                counter.get()
            ));
        }

        output.push_str("# HELP judgebox_sessions_by_verdict Grading sessions by verdict\n");
        output.push_str("# TYPE judgebox_sessions_by_verdict counter\n");
        for (verdict, counter) in Verdict::ALL.iter().zip(self.verdicts.iter()) {
            output.push_str(&format!(
                "judgebox_sessions_by_verdict{{verdict=\"{}\"}} {}\n",
                verdict,
                counter.get()
            ));
        }

        for (name, help, counter) in [
            (
                "judgebox_ambiguity_retries_total",
                "Tests replayed after an ambiguous failure",
                &self.ambiguity_retries,
            ),
            (
                "judgebox_checker_failures_total",
                "Checker runs that crashed or timed out",
                &self.checker_failures,
            ),
            (
                "judgebox_toolchain_missing_total",
                "Runs aborted by a missing compiler or runtime",
                &self.toolchain_missing,
            ),
        ] {
            output.push_str(&format!("# HELP {} {}\n", name, help));
            output.push_str(&format!("# TYPE {} counter\n", name));
            output.push_str(&format!("{} {}\n", name, counter.get()));
        }

        output.push_str("# HELP judgebox_active_sessions Grading sessions in progress\n");
        output.push_str("# TYPE judgebox_active_sessions gauge\n");
        output.push_str(&format!(
            "judgebox_active_sessions {}\n",
            self.active_sessions.get()
        ));

        self.execution_duration.render(
            "judgebox_execution_duration_seconds",
            "Wall time of one engine run including compilation",
            &mut output,
        );
        self.session_duration.render(
            "judgebox_session_duration_seconds",
            "Wall time of one grading session",
            &mut output,
        );

        output
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Global metrics instance
static METRICS: once_cell::sync::Lazy<Arc<MetricsRegistry>> =
    once_cell::sync::Lazy::new(|| Arc::new(MetricsRegistry::new()));

/// Get global metrics registry
pub fn get_metrics() -> Arc<MetricsRegistry> {
    Arc::clone(&METRICS)
}
