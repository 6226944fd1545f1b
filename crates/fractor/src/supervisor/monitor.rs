//! Performance monitoring for supervisor runs

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use sysinfo::System;

/// Collects dispatch latencies and process resource usage.
///
/// Enabled with `Config::enable_performance_monitoring`; all recording
/// paths are cheap no-ops when the supervisor runs without one.
pub struct PerformanceMonitor {
    in_flight: Mutex<HashMap<String, Instant>>,
    latencies_ms: Mutex<Vec<f64>>,
    jobs_processed: AtomicU64,
    jobs_succeeded: AtomicU64,
    jobs_failed: AtomicU64,
    started_at: Instant,
    system: Mutex<System>,
    pid: Option<sysinfo::Pid>,
}

impl PerformanceMonitor {
    pub fn new() -> Self {
        Self {
            in_flight: Mutex::new(HashMap::new()),
            latencies_ms: Mutex::new(Vec::new()),
            jobs_processed: AtomicU64::new(0),
            jobs_succeeded: AtomicU64::new(0),
            jobs_failed: AtomicU64::new(0),
            started_at: Instant::now(),
            system: Mutex::new(System::new()),
            pid: sysinfo::get_current_pid().ok(),
        }
    }

    /// Record a work item being handed to an actor
    pub fn record_dispatch(&self, actor_name: &str) {
        self.in_flight
            .lock()
            .unwrap()
            .insert(actor_name.to_string(), Instant::now());
    }

    /// Record a completion envelope from an actor, returning the measured
    /// latency when the dispatch was seen
    pub fn record_completion(&self, actor_name: &str, success: bool) -> Option<Duration> {
        self.jobs_processed.fetch_add(1, Ordering::Relaxed);
        if success {
            self.jobs_succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.jobs_failed.fetch_add(1, Ordering::Relaxed);
        }

        let started = self.in_flight.lock().unwrap().remove(actor_name)?;
        let latency = started.elapsed();
        self.latencies_ms
            .lock()
            .unwrap()
            .push(latency.as_secs_f64() * 1000.0);
        Some(latency)
    }

    /// Latency quantile in milliseconds (q in 0.0..=1.0)
    pub fn latency_quantile(&self, q: f64) -> f64 {
        let mut samples = self.latencies_ms.lock().unwrap().clone();
        if samples.is_empty() {
            return 0.0;
        }
        samples.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let rank = ((samples.len() as f64 - 1.0) * q.clamp(0.0, 1.0)).round() as usize;
        samples[rank]
    }

    /// Snapshot current metrics
    pub fn snapshot(&self, workers_total: usize, workers_active: usize) -> PerformanceMetrics {
        let processed = self.jobs_processed.load(Ordering::Relaxed);
        let uptime = self.started_at.elapsed();

        let (avg_latency_ms, p50, p95, p99) = {
            let samples = self.latencies_ms.lock().unwrap();
            let avg = if samples.is_empty() {
                0.0
            } else {
                samples.iter().sum::<f64>() / samples.len() as f64
            };
            drop(samples);
            (
                avg,
                self.latency_quantile(0.5),
                self.latency_quantile(0.95),
                self.latency_quantile(0.99),
            )
        };

        let (cpu_usage_percent, memory_usage_bytes) = self.process_usage();

        PerformanceMetrics {
            jobs_processed: processed,
            jobs_succeeded: self.jobs_succeeded.load(Ordering::Relaxed),
            jobs_failed: self.jobs_failed.load(Ordering::Relaxed),
            avg_latency_ms,
            p50_latency_ms: p50,
            p95_latency_ms: p95,
            p99_latency_ms: p99,
            throughput_per_sec: if uptime.as_secs_f64() > 0.0 {
                processed as f64 / uptime.as_secs_f64()
            } else {
                0.0
            },
            uptime,
            cpu_usage_percent,
            memory_usage_bytes,
            workers_total,
            workers_active,
            worker_utilization: if workers_total > 0 {
                workers_active as f64 / workers_total as f64
            } else {
                0.0
            },
        }
    }

    fn process_usage(&self) -> (f64, u64) {
        let Some(pid) = self.pid else {
            return (0.0, 0);
        };
        let mut system = self.system.lock().unwrap();
        system.refresh_processes();
        match system.process(pid) {
            Some(process) => (process.cpu_usage() as f64, process.memory()),
            None => (0.0, 0),
        }
    }
}

impl Default for PerformanceMonitor {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of supervisor performance
#[derive(Debug, Clone)]
pub struct PerformanceMetrics {
    /// Total work items completed (success + error)
    pub jobs_processed: u64,

    /// Successful completions
    pub jobs_succeeded: u64,

    /// Failed completions
    pub jobs_failed: u64,

    /// Average dispatch-to-completion latency (ms)
    pub avg_latency_ms: f64,

    pub p50_latency_ms: f64,
    pub p95_latency_ms: f64,
    pub p99_latency_ms: f64,

    /// Completions per second since monitor start
    pub throughput_per_sec: f64,

    /// Time since monitor start
    pub uptime: Duration,

    /// Process CPU usage (%)
    pub cpu_usage_percent: f64,

    /// Process memory usage (bytes)
    pub memory_usage_bytes: u64,

    /// Configured worker count
    pub workers_total: usize,

    /// Workers currently processing
    pub workers_active: usize,

    /// active / total
    pub worker_utilization: f64,
}

impl PerformanceMetrics {
    /// Format as human-readable
    pub fn format(&self) -> String {
        format!(
            "Performance: processed={} ok={} failed={} | latency avg={:.1}ms p95={:.1}ms | \
             throughput={:.1}/s | workers {}/{} ({:.0}% busy) | cpu={:.1}% mem={}KB",
            self.jobs_processed,
            self.jobs_succeeded,
            self.jobs_failed,
            self.avg_latency_ms,
            self.p95_latency_ms,
            self.throughput_per_sec,
            self.workers_active,
            self.workers_total,
            self.worker_utilization * 100.0,
            self.cpu_usage_percent,
            self.memory_usage_bytes / 1024,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latency_recording() {
        let monitor = PerformanceMonitor::new();
        monitor.record_dispatch("w-0");
        std::thread::sleep(Duration::from_millis(5));
        let latency = monitor.record_completion("w-0", true).unwrap();
        assert!(latency >= Duration::from_millis(5));

        let snapshot = monitor.snapshot(2, 1);
        assert_eq!(snapshot.jobs_processed, 1);
        assert_eq!(snapshot.jobs_succeeded, 1);
        assert!(snapshot.avg_latency_ms >= 5.0);
        assert_eq!(snapshot.workers_total, 2);
        assert!((snapshot.worker_utilization - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_completion_without_dispatch() {
        let monitor = PerformanceMonitor::new();
        // No dispatch recorded: counted, but no latency sample
        assert!(monitor.record_completion("ghost", false).is_none());
        let snapshot = monitor.snapshot(1, 0);
        assert_eq!(snapshot.jobs_processed, 1);
        assert_eq!(snapshot.jobs_failed, 1);
        assert_eq!(snapshot.avg_latency_ms, 0.0);
    }

    #[test]
    fn test_quantiles() {
        let monitor = PerformanceMonitor::new();
        {
            let mut samples = monitor.latencies_ms.lock().unwrap();
            samples.extend((1..=100).map(|i| i as f64));
        }
        assert!((monitor.latency_quantile(0.5) - 50.0).abs() <= 1.0);
        assert!((monitor.latency_quantile(0.99) - 99.0).abs() <= 1.0);
        assert_eq!(monitor.latency_quantile(1.0), 100.0);
    }
}
