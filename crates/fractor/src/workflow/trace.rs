//! Execution traces: structured records of workflow runs

use crate::workflow::job::JobState;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Length of the hex digest prefix kept in traces
const FINGERPRINT_LEN: usize = 12;

/// Short content fingerprint of a payload (sha256 prefix)
pub fn fingerprint(value: &Value) -> String {
    let rendered = value.to_string();
    let digest = Sha256::digest(rendered.as_bytes());
    hex::encode(digest)[..FINGERPRINT_LEN].to_string()
}

/// Trace of one job within a run
#[derive(Debug, Clone)]
pub struct JobTrace {
    pub job: String,
    pub status: JobState,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<u64>,
    pub input_fingerprint: Option<String>,
    pub output_fingerprint: Option<String>,
    pub error: Option<String>,
    pub attempts: u32,
    pub fallback_used: bool,
}

impl JobTrace {
    /// Begin tracing a job with its built input
    pub fn start(job: impl Into<String>, input: Option<&Value>) -> Self {
        Self {
            job: job.into(),
            status: JobState::Running,
            started_at: Utc::now(),
            finished_at: None,
            duration_ms: None,
            input_fingerprint: input.map(fingerprint),
            output_fingerprint: None,
            error: None,
            attempts: 0,
            fallback_used: false,
        }
    }

    /// A trace entry for a skipped job
    pub fn skipped(job: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            job: job.into(),
            status: JobState::Skipped,
            started_at: now,
            finished_at: Some(now),
            duration_ms: Some(0),
            input_fingerprint: None,
            output_fingerprint: None,
            error: None,
            attempts: 0,
            fallback_used: false,
        }
    }

    /// Mark completion with the produced output
    pub fn complete(&mut self, output: &Value) {
        self.status = JobState::Completed;
        self.output_fingerprint = Some(fingerprint(output));
        self.finish();
    }

    /// Mark failure with the final error message
    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = JobState::Failed;
        self.error = Some(error.into());
        self.finish();
    }

    fn finish(&mut self) {
        let now = Utc::now();
        self.duration_ms = Some((now - self.started_at).num_milliseconds().max(0) as u64);
        self.finished_at = Some(now);
    }
}

/// Structured trace of one workflow run
#[derive(Debug, Clone)]
pub struct ExecutionTrace {
    pub workflow_name: String,
    pub correlation_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub jobs: Vec<JobTrace>,
}

impl ExecutionTrace {
    pub fn new(workflow_name: impl Into<String>, correlation_id: impl Into<String>) -> Self {
        Self {
            workflow_name: workflow_name.into(),
            correlation_id: correlation_id.into(),
            started_at: Utc::now(),
            finished_at: None,
            jobs: Vec::new(),
        }
    }

    /// Append a job trace
    pub fn record(&mut self, trace: JobTrace) {
        self.jobs.push(trace);
    }

    /// Mark the run finished
    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Total run duration so far
    pub fn duration_ms(&self) -> u64 {
        let end = self.finished_at.unwrap_or_else(Utc::now);
        (end - self.started_at).num_milliseconds().max(0) as u64
    }

    /// Find the trace of a named job
    pub fn job(&self, name: &str) -> Option<&JobTrace> {
        self.jobs.iter().find(|t| t.job == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fingerprint_stable_and_short() {
        let a = fingerprint(&json!({"k": 1}));
        let b = fingerprint(&json!({"k": 1}));
        let c = fingerprint(&json!({"k": 2}));

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), FINGERPRINT_LEN);
        assert!(a.chars().all(|ch| ch.is_ascii_hexdigit()));
    }

    #[test]
    fn test_job_trace_lifecycle() {
        let mut trace = JobTrace::start("parse", Some(&json!("input")));
        assert_eq!(trace.status, JobState::Running);
        assert!(trace.input_fingerprint.is_some());

        trace.complete(&json!("output"));
        assert_eq!(trace.status, JobState::Completed);
        assert!(trace.output_fingerprint.is_some());
        assert!(trace.finished_at.is_some());
        assert!(trace.duration_ms.is_some());
    }

    #[test]
    fn test_job_trace_failure() {
        let mut trace = JobTrace::start("parse", None);
        trace.fail("boom");
        assert_eq!(trace.status, JobState::Failed);
        assert_eq!(trace.error.as_deref(), Some("boom"));
        assert!(trace.output_fingerprint.is_none());
    }

    #[test]
    fn test_execution_trace() {
        let mut trace = ExecutionTrace::new("etl", "run-1");
        trace.record(JobTrace::skipped("optional"));
        let mut job = JobTrace::start("main", None);
        job.complete(&json!(1));
        trace.record(job);
        trace.finish();

        assert_eq!(trace.jobs.len(), 2);
        assert_eq!(trace.job("optional").unwrap().status, JobState::Skipped);
        assert_eq!(trace.job("main").unwrap().status, JobState::Completed);
        assert!(trace.finished_at.is_some());
    }
}
