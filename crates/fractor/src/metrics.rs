//! Metrics export: Prometheus text format and JSON

use crate::result::{ErrorCategory, ErrorSeverity};
use crate::supervisor::{ErrorStats, PerformanceMetrics};
use serde_json::json;
use std::collections::HashMap;
use std::fmt::Write as _;

/// Point-in-time metrics snapshot assembled from the error reporter and
/// the performance monitor
#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    pub jobs_processed: u64,
    pub jobs_succeeded: u64,
    pub jobs_failed: u64,
    pub errors_total: u64,
    pub successes_total: u64,
    pub error_rate: f64,
    pub workers_total: usize,
    pub workers_active: usize,
    pub worker_utilization: f64,
    /// Latency quantiles in seconds: (quantile, value)
    pub latency_quantiles: Vec<(f64, f64)>,
    pub latency_sum_seconds: f64,
    pub latency_count: u64,
    pub errors_by_severity: HashMap<ErrorSeverity, u64>,
    pub errors_by_category: HashMap<ErrorCategory, u64>,
}

impl MetricsSnapshot {
    /// Assemble a snapshot from reporter stats and an optional
    /// performance snapshot
    pub fn assemble(stats: &ErrorStats, performance: Option<&PerformanceMetrics>) -> Self {
        let mut snapshot = Self {
            errors_total: stats.errors_total,
            successes_total: stats.successes_total,
            error_rate: stats.error_rate,
            errors_by_severity: stats.by_severity.clone(),
            errors_by_category: stats.by_category.clone(),
            ..Default::default()
        };

        if let Some(perf) = performance {
            snapshot.jobs_processed = perf.jobs_processed;
            snapshot.jobs_succeeded = perf.jobs_succeeded;
            snapshot.jobs_failed = perf.jobs_failed;
            snapshot.workers_total = perf.workers_total;
            snapshot.workers_active = perf.workers_active;
            snapshot.worker_utilization = perf.worker_utilization;
            snapshot.latency_quantiles = vec![
                (0.5, perf.p50_latency_ms / 1000.0),
                (0.95, perf.p95_latency_ms / 1000.0),
                (0.99, perf.p99_latency_ms / 1000.0),
            ];
            snapshot.latency_sum_seconds =
                perf.avg_latency_ms / 1000.0 * perf.jobs_processed as f64;
            snapshot.latency_count = perf.jobs_processed;
        } else {
            snapshot.jobs_processed = stats.errors_total + stats.successes_total;
            snapshot.jobs_succeeded = stats.successes_total;
            snapshot.jobs_failed = stats.errors_total;
            snapshot.latency_quantiles = vec![(0.5, 0.0), (0.95, 0.0), (0.99, 0.0)];
        }

        snapshot
    }

    /// Render the Prometheus text exposition format
    pub fn to_prometheus(&self) -> String {
        let mut out = String::new();

        counter(
            &mut out,
            "fractor_jobs_processed_total",
            "Total work items processed",
            self.jobs_processed,
        );
        counter(
            &mut out,
            "fractor_jobs_succeeded_total",
            "Work items that succeeded",
            self.jobs_succeeded,
        );
        counter(
            &mut out,
            "fractor_jobs_failed_total",
            "Work items that failed",
            self.jobs_failed,
        );
        counter(
            &mut out,
            "fractor_errors_total",
            "Errors recorded by the reporter",
            self.errors_total,
        );
        counter(
            &mut out,
            "fractor_successes_total",
            "Successes recorded by the reporter",
            self.successes_total,
        );

        gauge(
            &mut out,
            "fractor_error_rate",
            "Errors over total completions",
            self.error_rate,
        );
        gauge(
            &mut out,
            "fractor_workers_total",
            "Configured workers",
            self.workers_total as f64,
        );
        gauge(
            &mut out,
            "fractor_workers_active",
            "Workers currently processing",
            self.workers_active as f64,
        );
        gauge(
            &mut out,
            "fractor_worker_utilization",
            "Active workers over total workers",
            self.worker_utilization,
        );

        let _ = writeln!(
            out,
            "# HELP fractor_latency_seconds Work processing latency"
        );
        let _ = writeln!(out, "# TYPE fractor_latency_seconds summary");
        for (quantile, value) in &self.latency_quantiles {
            let _ = writeln!(
                out,
                "fractor_latency_seconds{{quantile=\"{}\"}} {}",
                quantile, value
            );
        }
        let _ = writeln!(
            out,
            "fractor_latency_seconds_sum {}",
            self.latency_sum_seconds
        );
        let _ = writeln!(out, "fractor_latency_seconds_count {}", self.latency_count);

        let _ = writeln!(
            out,
            "# HELP fractor_errors_by_severity Errors grouped by severity"
        );
        let _ = writeln!(out, "# TYPE fractor_errors_by_severity counter");
        for severity in ErrorSeverity::all() {
            let count = self.errors_by_severity.get(&severity).copied().unwrap_or(0);
            let _ = writeln!(
                out,
                "fractor_errors_by_severity{{severity=\"{}\"}} {}",
                severity, count
            );
        }

        let _ = writeln!(
            out,
            "# HELP fractor_errors_by_category Errors grouped by category"
        );
        let _ = writeln!(out, "# TYPE fractor_errors_by_category counter");
        for category in ErrorCategory::all() {
            let count = self.errors_by_category.get(&category).copied().unwrap_or(0);
            let _ = writeln!(
                out,
                "fractor_errors_by_category{{category=\"{}\"}} {}",
                category, count
            );
        }

        out
    }

    /// Render as a JSON document
    pub fn to_json(&self) -> serde_json::Value {
        let by_severity: HashMap<String, u64> = self
            .errors_by_severity
            .iter()
            .map(|(k, v)| (k.to_string(), *v))
            .collect();
        let by_category: HashMap<String, u64> = self
            .errors_by_category
            .iter()
            .map(|(k, v)| (k.to_string(), *v))
            .collect();
        let quantiles: HashMap<String, f64> = self
            .latency_quantiles
            .iter()
            .map(|(q, v)| (q.to_string(), *v))
            .collect();

        json!({
            "jobs": {
                "processed": self.jobs_processed,
                "succeeded": self.jobs_succeeded,
                "failed": self.jobs_failed,
            },
            "errors": {
                "total": self.errors_total,
                "rate": self.error_rate,
                "by_severity": by_severity,
                "by_category": by_category,
            },
            "successes_total": self.successes_total,
            "workers": {
                "total": self.workers_total,
                "active": self.workers_active,
                "utilization": self.worker_utilization,
            },
            "latency_seconds": {
                "quantiles": quantiles,
                "sum": self.latency_sum_seconds,
                "count": self.latency_count,
            },
        })
    }
}

fn counter(out: &mut String, name: &str, help: &str, value: u64) {
    let _ = writeln!(out, "# HELP {} {}", name, help);
    let _ = writeln!(out, "# TYPE {} counter", name);
    let _ = writeln!(out, "{} {}", name, value);
}

fn gauge(out: &mut String, name: &str, help: &str, value: f64) {
    let _ = writeln!(out, "# HELP {} {}", name, help);
    let _ = writeln!(out, "# TYPE {} gauge", name);
    let _ = writeln!(out, "{} {}", name, value);
}
