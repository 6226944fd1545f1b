//! Workflow validation: dependency graph, cycles, reachability, and soft
//! type compatibility

use crate::workflow::job::Job;
use std::collections::{HashMap, HashSet, VecDeque};

/// Aggregated validation outcome. Errors are fatal before execution;
/// warnings are reported but do not block.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    fn warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }
}

/// Validate a workflow definition: duplicate names, missing
/// dependencies, cycles, unmappable inputs, dangling fallbacks, type
/// compatibility, and (for pipelines) reachability from the start job.
pub fn validate_workflow(jobs: &[Job], pipeline_start: Option<&str>) -> ValidationReport {
    let mut report = ValidationReport::default();

    let mut seen = HashSet::new();
    for job in jobs {
        if !seen.insert(job.name.as_str()) {
            report.error(format!("duplicate job name '{}'", job.name));
        }
    }

    let by_name: HashMap<&str, &Job> = jobs.iter().map(|j| (j.name.as_str(), j)).collect();

    check_missing_dependencies(jobs, &by_name, &mut report);
    if let Some(cycle) = detect_cycle(jobs, &by_name) {
        report.error(format!("dependency cycle: {}", cycle.join(" -> ")));
    }
    check_input_mappings(jobs, &mut report);
    check_fallbacks(jobs, &by_name, &mut report);
    check_type_compatibility(jobs, &by_name, &mut report);

    if let Some(start) = pipeline_start {
        check_reachability(jobs, &by_name, start, &mut report);
    }

    report
}

/// Every named dependency must resolve to a defined job
fn check_missing_dependencies(
    jobs: &[Job],
    by_name: &HashMap<&str, &Job>,
    report: &mut ValidationReport,
) {
    for job in jobs {
        for dep in &job.dependencies {
            if !by_name.contains_key(dep.as_str()) {
                report.error(format!(
                    "job '{}' depends on '{}', which is not defined",
                    job.name, dep
                ));
            }
        }
    }
}

/// DFS with an explicit path stack; returns the cycle path on re-entry
pub fn detect_cycle(jobs: &[Job], by_name: &HashMap<&str, &Job>) -> Option<Vec<String>> {
    let mut visited: HashSet<&str> = HashSet::new();

    for job in jobs {
        if visited.contains(job.name.as_str()) {
            continue;
        }
        let mut path: Vec<&str> = Vec::new();
        let mut on_path: HashSet<&str> = HashSet::new();
        if let Some(cycle) = dfs(job.name.as_str(), by_name, &mut visited, &mut path, &mut on_path)
        {
            return Some(cycle);
        }
    }
    None
}

fn dfs<'a>(
    node: &'a str,
    by_name: &HashMap<&str, &'a Job>,
    visited: &mut HashSet<&'a str>,
    path: &mut Vec<&'a str>,
    on_path: &mut HashSet<&'a str>,
) -> Option<Vec<String>> {
    if on_path.contains(node) {
        // Close the loop at the re-entered node
        let start = path.iter().position(|n| *n == node).unwrap_or(0);
        let mut cycle: Vec<String> = path[start..].iter().map(|s| s.to_string()).collect();
        cycle.push(node.to_string());
        return Some(cycle);
    }
    if visited.contains(node) {
        return None;
    }

    path.push(node);
    on_path.insert(node);

    if let Some(job) = by_name.get(node) {
        for dep in &job.dependencies {
            if let Some(found) =
                by_name.get(dep.as_str()).map(|j| j.name.as_str()).and_then(|d| {
                    dfs(d, by_name, visited, path, on_path)
                })
            {
                return Some(found);
            }
        }
    }

    path.pop();
    on_path.remove(node);
    visited.insert(node);
    None
}

/// Jobs with several dependencies need explicit input mappings
fn check_input_mappings(jobs: &[Job], report: &mut ValidationReport) {
    for job in jobs {
        if job.input_mappings.is_empty() && job.dependencies.len() > 1 {
            report.error(format!(
                "job '{}' has {} dependencies and no input mappings",
                job.name,
                job.dependencies.len()
            ));
        }
    }
}

/// Fallback references must resolve to defined jobs
fn check_fallbacks(jobs: &[Job], by_name: &HashMap<&str, &Job>, report: &mut ValidationReport) {
    for job in jobs {
        if let Some(fallback) = &job.fallback_job {
            if !by_name.contains_key(fallback.as_str()) {
                report.error(format!(
                    "job '{}' falls back to '{}', which is not defined",
                    job.name, fallback
                ));
            }
        }
    }
}

/// Soft producer/consumer type check.
///
/// Applies only to single-dependency jobs that do not read the workflow
/// input; incompatibilities are reported as warnings, not errors.
fn check_type_compatibility(
    jobs: &[Job],
    by_name: &HashMap<&str, &Job>,
    report: &mut ValidationReport,
) {
    use crate::workflow::job::MappingSource;

    for job in jobs {
        if job.dependencies.len() != 1 {
            continue;
        }
        let reads_workflow = job
            .input_mappings
            .iter()
            .any(|m| m.source == MappingSource::Workflow);
        if reads_workflow {
            continue;
        }

        let Some(consumer) = job.factory.input_tag() else {
            continue;
        };
        let Some(producer_job) = by_name.get(job.dependencies[0].as_str()) else {
            continue;
        };
        let Some(producer) = producer_job.factory.output_tag() else {
            continue;
        };

        if !consumer.accepts(producer) {
            report.warning(format!(
                "job '{}' declares input type {} but '{}' produces {}",
                job.name, consumer, producer_job.name, producer
            ));
        }
    }
}

/// Pipeline mode: every job must be reachable from the start job through
/// "dependency -> dependent" edges
fn check_reachability(
    jobs: &[Job],
    by_name: &HashMap<&str, &Job>,
    start: &str,
    report: &mut ValidationReport,
) {
    if !by_name.contains_key(start) {
        report.error(format!("pipeline start job '{}' is not defined", start));
        return;
    }

    // dependency -> dependents adjacency
    let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();
    for job in jobs {
        for dep in &job.dependencies {
            dependents
                .entry(dep.as_str())
                .or_default()
                .push(job.name.as_str());
        }
    }

    let mut reached: HashSet<&str> = HashSet::new();
    let mut frontier: VecDeque<&str> = VecDeque::new();
    reached.insert(start);
    frontier.push_back(start);
    while let Some(node) = frontier.pop_front() {
        for dependent in dependents.get(node).into_iter().flatten() {
            if reached.insert(dependent) {
                frontier.push_back(dependent);
            }
        }
    }

    for job in jobs {
        if !reached.contains(job.name.as_str()) {
            report.error(format!(
                "job '{}' is not reachable from pipeline start '{}'",
                job.name, start
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::WorkResult;
    use crate::work::Work;
    use crate::worker::{SharedWorkerFactory, TypeTag, Worker, WorkerFactory};
    use std::sync::Arc;

    struct Noop;

    #[async_trait::async_trait]
    impl Worker for Noop {
        async fn process(&self, work: Work) -> WorkResult {
            WorkResult::success(work, serde_json::Value::Null)
        }
    }

    fn factory() -> Arc<dyn WorkerFactory> {
        Arc::new(SharedWorkerFactory::new("noop", Arc::new(Noop)))
    }

    fn typed_factory(input: TypeTag, output: TypeTag) -> Arc<dyn WorkerFactory> {
        Arc::new(
            SharedWorkerFactory::new("typed", Arc::new(Noop))
                .with_input_tag(input)
                .with_output_tag(output),
        )
    }

    #[test]
    fn test_valid_chain_passes() {
        let jobs = vec![
            Job::new("a", factory()),
            Job::new("b", factory()).depends_on(["a"]),
            Job::new("c", factory()).depends_on(["b"]),
        ];
        let report = validate_workflow(&jobs, None);
        assert!(report.is_ok(), "unexpected errors: {:?}", report.errors);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_missing_dependency() {
        let jobs = vec![Job::new("b", factory()).depends_on(["ghost"])];
        let report = validate_workflow(&jobs, None);
        assert!(!report.is_ok());
        assert!(report.errors[0].contains("ghost"));
    }

    #[test]
    fn test_cycle_detection_reports_path() {
        let jobs = vec![
            Job::new("a", factory()).depends_on(["c"]),
            Job::new("b", factory()).depends_on(["a"]),
            Job::new("c", factory()).depends_on(["b"]),
        ];
        let report = validate_workflow(&jobs, None);
        assert!(!report.is_ok());

        let cycle_error = report
            .errors
            .iter()
            .find(|e| e.contains("cycle"))
            .expect("cycle error");
        for name in ["a", "b", "c"] {
            assert!(cycle_error.contains(name), "missing {} in {}", name, cycle_error);
        }
    }

    #[test]
    fn test_self_cycle() {
        let jobs = vec![Job::new("a", factory()).depends_on(["a"])];
        let report = validate_workflow(&jobs, None);
        assert!(report.errors.iter().any(|e| e.contains("cycle")));
    }

    #[test]
    fn test_duplicate_names() {
        let jobs = vec![Job::new("a", factory()), Job::new("a", factory())];
        let report = validate_workflow(&jobs, None);
        assert!(report.errors.iter().any(|e| e.contains("duplicate")));
    }

    #[test]
    fn test_multi_dep_without_mappings() {
        let jobs = vec![
            Job::new("a", factory()),
            Job::new("b", factory()),
            Job::new("c", factory()).depends_on(["a", "b"]),
        ];
        let report = validate_workflow(&jobs, None);
        assert!(report.errors.iter().any(|e| e.contains("input mappings")));
    }

    #[test]
    fn test_dangling_fallback() {
        let jobs = vec![Job::new("a", factory()).with_fallback("rescue")];
        let report = validate_workflow(&jobs, None);
        assert!(report.errors.iter().any(|e| e.contains("rescue")));
    }

    #[test]
    fn test_type_mismatch_is_warning() {
        let jobs = vec![
            Job::new("produce", typed_factory(TypeTag::Any, TypeTag::Text)),
            Job::new("consume", typed_factory(TypeTag::Integer, TypeTag::Any))
                .depends_on(["produce"]),
        ];
        let report = validate_workflow(&jobs, None);
        assert!(report.is_ok());
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("consume"));
    }

    #[test]
    fn test_numeric_promotion_accepted() {
        let jobs = vec![
            Job::new("count", typed_factory(TypeTag::Any, TypeTag::Integer)),
            Job::new("scale", typed_factory(TypeTag::Float, TypeTag::Float))
                .depends_on(["count"]),
        ];
        let report = validate_workflow(&jobs, None);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_reachability_for_pipelines() {
        let jobs = vec![
            Job::new("a", factory()),
            Job::new("b", factory()).depends_on(["a"]),
            Job::new("orphan", factory()),
        ];
        let report = validate_workflow(&jobs, Some("a"));
        assert!(report
            .errors
            .iter()
            .any(|e| e.contains("orphan") && e.contains("reachable")));
    }
}
