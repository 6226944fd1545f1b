//! Workflow lifecycle hooks

use crate::result::ErrorInfo;
use std::sync::Arc;

/// Hook invoked with the workflow name
pub type WorkflowHook = Arc<dyn Fn(&str) + Send + Sync>;

/// Hook invoked with a job name
pub type JobHook = Arc<dyn Fn(&str) + Send + Sync>;

/// Hook invoked with a job name and its error
pub type JobErrorHook = Arc<dyn Fn(&str, &ErrorInfo) + Send + Sync>;

/// Registry of lifecycle hooks fired at well-defined points of a run:
/// workflow start/complete, job start/complete/error.
#[derive(Clone, Default)]
pub struct WorkflowHooks {
    workflow_start: Vec<WorkflowHook>,
    workflow_complete: Vec<WorkflowHook>,
    job_start: Vec<JobHook>,
    job_complete: Vec<JobHook>,
    job_error: Vec<JobErrorHook>,
}

impl WorkflowHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_workflow_start(&mut self, hook: WorkflowHook) -> &mut Self {
        self.workflow_start.push(hook);
        self
    }

    pub fn on_workflow_complete(&mut self, hook: WorkflowHook) -> &mut Self {
        self.workflow_complete.push(hook);
        self
    }

    pub fn on_job_start(&mut self, hook: JobHook) -> &mut Self {
        self.job_start.push(hook);
        self
    }

    pub fn on_job_complete(&mut self, hook: JobHook) -> &mut Self {
        self.job_complete.push(hook);
        self
    }

    pub fn on_job_error(&mut self, hook: JobErrorHook) -> &mut Self {
        self.job_error.push(hook);
        self
    }

    pub(crate) fn fire_workflow_start(&self, workflow: &str) {
        for hook in &self.workflow_start {
            hook(workflow);
        }
    }

    pub(crate) fn fire_workflow_complete(&self, workflow: &str) {
        for hook in &self.workflow_complete {
            hook(workflow);
        }
    }

    pub(crate) fn fire_job_start(&self, job: &str) {
        for hook in &self.job_start {
            hook(job);
        }
    }

    pub(crate) fn fire_job_complete(&self, job: &str) {
        for hook in &self.job_complete {
            hook(job);
        }
    }

    pub(crate) fn fire_job_error(&self, job: &str, error: &ErrorInfo) {
        for hook in &self.job_error {
            hook(job, error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_hooks_fire_in_registration_order() {
        let mut hooks = WorkflowHooks::new();
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let counter = counter.clone();
            hooks.on_job_complete(Arc::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }));
        }

        hooks.fire_job_complete("a");
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_error_hook_receives_error() {
        let mut hooks = WorkflowHooks::new();
        let seen = Arc::new(std::sync::Mutex::new(String::new()));
        {
            let seen = seen.clone();
            hooks.on_job_error(Arc::new(move |job, error| {
                *seen.lock().unwrap() = format!("{}: {}", job, error.message);
            }));
        }

        hooks.fire_job_error("fetch", &ErrorInfo::message("boom"));
        assert_eq!(&*seen.lock().unwrap(), "fetch: boom");
    }
}
