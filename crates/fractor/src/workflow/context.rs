//! Workflow execution context

use crate::workflow::job::{Job, MappingRule, MappingSource};
use crate::workflow::WorkflowError;
use serde_json::{Map, Value};
use std::collections::HashMap;
use uuid::Uuid;

/// Per-run workflow state: the workflow input plus the outputs of
/// completed jobs. `job_outputs` grows monotonically through execution.
#[derive(Debug, Clone)]
pub struct WorkflowContext {
    workflow_input: Value,
    job_outputs: HashMap<String, Value>,
    correlation_id: String,
}

impl WorkflowContext {
    pub fn new(workflow_input: Value) -> Self {
        Self {
            workflow_input,
            job_outputs: HashMap::new(),
            correlation_id: Uuid::new_v4().to_string(),
        }
    }

    /// The workflow input
    pub fn workflow_input(&self) -> &Value {
        &self.workflow_input
    }

    /// Per-execution identifier propagated across logs, traces, and DLQ
    /// entries
    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    /// Store a completed job's output
    pub fn store_output(&mut self, job_name: impl Into<String>, output: Value) {
        self.job_outputs.insert(job_name.into(), output);
    }

    /// A completed job's output, if stored
    pub fn output_of(&self, job_name: &str) -> Option<&Value> {
        self.job_outputs.get(job_name)
    }

    /// All stored outputs
    pub fn job_outputs(&self) -> &HashMap<String, Value> {
        &self.job_outputs
    }

    /// Build a job's input from its mapping declarations.
    ///
    /// Without mappings, a root job receives the workflow input and a
    /// single-dependency job its predecessor's output. A workflow-source
    /// mapping with the `All` rule passes the workflow input through
    /// unchanged. Field rules copy `target <- source` attributes; a
    /// missing source output or attribute fails the build.
    pub fn build_job_input(&self, job: &Job) -> Result<Value, WorkflowError> {
        if job.input_mappings.is_empty() {
            return self.default_input(job);
        }

        // The workflow input passes through directly when mapped whole
        let direct = job.input_mappings.iter().any(|m| {
            m.source == MappingSource::Workflow && matches!(m.rule, MappingRule::All)
        });
        if direct && job.input_mappings.len() == 1 {
            return Ok(self.workflow_input.clone());
        }

        let mut assembled = Map::new();
        for mapping in &job.input_mappings {
            let source_value = match &mapping.source {
                MappingSource::Workflow => &self.workflow_input,
                MappingSource::Job(name) => self.output_of(name).ok_or_else(|| {
                    WorkflowError::Definition(format!(
                        "job '{}' maps input from '{}', whose output is missing",
                        job.name, name
                    ))
                })?,
            };

            match &mapping.rule {
                MappingRule::All => match source_value {
                    Value::Object(fields) => {
                        for (key, value) in fields {
                            assembled.insert(key.clone(), value.clone());
                        }
                    }
                    other => {
                        // A lone non-object source passes through whole
                        if job.input_mappings.len() == 1 {
                            return Ok(other.clone());
                        }
                        return Err(WorkflowError::Definition(format!(
                            "job '{}' merges a non-object payload from {:?}",
                            job.name, mapping.source
                        )));
                    }
                },
                MappingRule::Fields(fields) => {
                    let source_obj = source_value.as_object().ok_or_else(|| {
                        WorkflowError::Definition(format!(
                            "job '{}' maps attributes from a non-object payload",
                            job.name
                        ))
                    })?;
                    for (target, source_attr) in fields {
                        let value = source_obj.get(source_attr).ok_or_else(|| {
                            WorkflowError::Definition(format!(
                                "job '{}' maps attribute '{}' which is not present on the source",
                                job.name, source_attr
                            ))
                        })?;
                        assembled.insert(target.clone(), value.clone());
                    }
                }
            }
        }

        Ok(Value::Object(assembled))
    }

    fn default_input(&self, job: &Job) -> Result<Value, WorkflowError> {
        match job.dependencies.len() {
            0 => Ok(self.workflow_input.clone()),
            1 => {
                let dep = &job.dependencies[0];
                self.output_of(dep).cloned().ok_or_else(|| {
                    WorkflowError::Definition(format!(
                        "job '{}' depends on '{}', whose output is missing",
                        job.name, dep
                    ))
                })
            }
            _ => Err(WorkflowError::Definition(format!(
                "job '{}' has multiple dependencies and needs explicit input mappings",
                job.name
            ))),
        }
    }
}
