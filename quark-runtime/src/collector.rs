//! Task Collector
//!
//! Discovers task files under a directory, parses and plans them, and runs
//! each planned task with its own [`Runner`]. A failing task is reported in
//! its outcome and does not stop the rest.

use crate::planner::{ExecutionPlan, PlannedTask, build_plan};
use crate::runner::{Runner, RunnerOptions};
use indicatif::{ProgressBar, ProgressStyle};
use quark_config::{ConfigBuilder, Format};
use quark_core::QuarkError;
use quark_report::ResultRecord;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Result of one task file
#[derive(Debug)]
pub struct TaskOutcome {
    /// Task file
    pub path: PathBuf,
    /// Label, when the file parsed
    pub label: Option<String>,
    /// Persisted record or the error that stopped the task
    pub result: Result<ResultRecord, QuarkError>,
}

impl TaskOutcome {
    /// Whether the task produced a record
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Tasks ready to run plus files that failed to load
#[derive(Debug, Default)]
pub struct Prepared {
    /// Validated, filtered, ordered tasks
    pub plan: ExecutionPlan,
    /// Files rejected while loading
    pub failures: Vec<TaskOutcome>,
}

/// Recursively list task files under `root`, sorted
///
/// A file root is returned as the only task.
pub fn discover_tasks(root: &Path) -> std::io::Result<Vec<PathBuf>> {
    if root.is_file() {
        return Ok(vec![root.to_path_buf()]);
    }
    let mut found = Vec::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
            } else if Format::is_task_file(&path) {
                found.push(path);
            }
        }
    }
    found.sort();
    Ok(found)
}

/// Remove tasks whose label was already planned; they would share an artifact
///
/// The plan is label-ordered, so the first path for each label is kept.
fn take_duplicate_labels(plan: &mut ExecutionPlan) -> Vec<TaskOutcome> {
    let mut rejected = Vec::new();
    let mut kept: Vec<PlannedTask> = Vec::with_capacity(plan.tasks.len());
    for task in plan.tasks.drain(..) {
        match kept.last() {
            Some(prev) if prev.label() == task.label() => {
                let reason = format!(
                    "label {:?} already used by {}",
                    task.label(),
                    prev.path.display()
                );
                warn!(path = %task.path.display(), "skipping task: {reason}");
                rejected.push(TaskOutcome {
                    path: task.path,
                    label: Some(task.config.label),
                    result: Err(QuarkError::invalid("task", reason)),
                });
            }
            _ => kept.push(task),
        }
    }
    plan.tasks = kept;
    rejected
}

/// Runs every task under a directory
#[derive(Debug, Clone, Default)]
pub struct Collector {
    options: RunnerOptions,
    filter: Option<Regex>,
    progress: bool,
}

impl Collector {
    /// Collector with the given runner options
    pub fn new(options: RunnerOptions) -> Self {
        Self {
            options,
            filter: None,
            progress: false,
        }
    }

    /// Only run tasks whose label matches `filter`
    pub fn with_filter(mut self, filter: Regex) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Show a progress bar while running
    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    /// Runner options applied to each task
    pub fn options(&self) -> &RunnerOptions {
        &self.options
    }

    /// Load and plan every task file under `root`
    pub fn prepare(&self, root: &Path) -> std::io::Result<Prepared> {
        let mut tasks = Vec::new();
        let mut failures = Vec::new();
        for path in discover_tasks(root)? {
            match ConfigBuilder::load(&path) {
                Ok(config) => tasks.push(PlannedTask { path, config }),
                Err(e) => {
                    warn!(path = %path.display(), "skipping task: {e}");
                    failures.push(TaskOutcome {
                        path,
                        label: None,
                        result: Err(e.into()),
                    });
                }
            }
        }
        let mut plan = build_plan(tasks, self.filter.as_ref());
        failures.extend(take_duplicate_labels(&mut plan));
        Ok(Prepared { plan, failures })
    }

    /// Run every planned task; load failures are carried into the output
    pub fn run(&self, prepared: Prepared) -> Vec<TaskOutcome> {
        let Prepared { plan, failures } = prepared;
        let pb = self.progress.then(|| {
            let pb = ProgressBar::new(plan.len() as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template(
                        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
                    )
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("#>-"),
            );
            pb
        });

        let mut outcomes = failures;
        for task in plan.tasks {
            if let Some(pb) = &pb {
                pb.set_message(task.config.label.clone());
            }
            let label = task.config.label.clone();
            let result = Runner::with_options(task.config, self.options.clone())
                .and_then(|mut runner| runner.run().cloned());
            match &result {
                Ok(record) => info!(
                    label = %label,
                    mean = record.summary.mean_time,
                    unit = %self.options.unit,
                    "task complete"
                ),
                Err(e) => warn!(label = %label, "task failed: {e}"),
            }
            outcomes.push(TaskOutcome {
                path: task.path,
                label: Some(label),
                result,
            });
            if let Some(pb) = &pb {
                pb.inc(1);
            }
        }

        if let Some(pb) = pb {
            pb.finish_with_message("Complete");
        }
        outcomes
    }

    /// Discover, plan and run everything under `root`
    pub fn collect(&self, root: &Path) -> std::io::Result<Vec<TaskOutcome>> {
        let prepared = self.prepare(root)?;
        Ok(self.run(prepared))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn task_yaml(label: &str, device: &str) -> String {
        format!(
            "label: {label}
workload:
  framework: native
  granularity: operator
  operator: relu
experiment:
  run_mode: inference
  executor:
    framework: native
    device: {device}
  timer: generic
  repeat: 3
  warmup: 0
dataset:
  source: synthetic
  input_shape: [8]
  batch_size: 2
  dtype: float32
"
        )
    }

    #[test]
    fn test_discover_recurses_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("b.yml"), "").unwrap();
        fs::write(dir.path().join("nested/a.toml"), "").unwrap();
        fs::write(dir.path().join("notes.txt"), "").unwrap();

        let found = discover_tasks(dir.path()).unwrap();
        assert_eq!(found, vec![dir.path().join("b.yml"), dir.path().join("nested/a.toml")]);
    }

    #[test]
    fn test_discover_single_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("only.yaml");
        fs::write(&file, "").unwrap();
        assert_eq!(discover_tasks(&file).unwrap(), vec![file]);
    }

    #[test]
    fn test_failures_do_not_stop_other_tasks() {
        let tasks = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        fs::write(tasks.path().join("ok.yml"), task_yaml("ok", "cpu")).unwrap();
        fs::write(tasks.path().join("gpu.yml"), task_yaml("gpu", "gpu")).unwrap();
        fs::write(tasks.path().join("broken.yml"), "label: [").unwrap();

        let collector = Collector::new(RunnerOptions {
            results_dir: out.path().to_path_buf(),
            ..RunnerOptions::default()
        });
        let outcomes = collector.collect(tasks.path()).unwrap();
        assert_eq!(outcomes.len(), 3);

        let broken = &outcomes[0];
        assert!(broken.label.is_none());
        assert!(!broken.is_success());

        let gpu = outcomes.iter().find(|o| o.label.as_deref() == Some("gpu")).unwrap();
        assert!(matches!(gpu.result, Err(QuarkError::Unsupported(_))));

        let ok = outcomes.iter().find(|o| o.label.as_deref() == Some("ok")).unwrap();
        assert_eq!(ok.result.as_ref().unwrap().summary.samples, 3);
        assert!(out.path().join("ok.json").is_file());
        assert!(!out.path().join("gpu.json").exists());
    }

    #[test]
    fn test_duplicate_labels_run_once() {
        let tasks = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        fs::write(tasks.path().join("a.yml"), task_yaml("shared", "cpu")).unwrap();
        fs::write(tasks.path().join("b.yml"), task_yaml("shared", "cpu")).unwrap();

        let collector = Collector::new(RunnerOptions {
            results_dir: out.path().to_path_buf(),
            ..RunnerOptions::default()
        });
        let prepared = collector.prepare(tasks.path()).unwrap();
        assert_eq!(prepared.plan.len(), 1);
        assert_eq!(prepared.plan.tasks[0].path, tasks.path().join("a.yml"));
        assert_eq!(prepared.failures.len(), 1);
        assert_eq!(prepared.failures[0].path, tasks.path().join("b.yml"));
        assert!(matches!(
            prepared.failures[0].result,
            Err(QuarkError::InvalidComponent { .. })
        ));

        let outcomes = collector.run(prepared);
        assert_eq!(outcomes.iter().filter(|o| o.is_success()).count(), 1);
    }

    #[test]
    fn test_filter_applies_to_labels() {
        let tasks = tempfile::tempdir().unwrap();
        fs::write(tasks.path().join("a.yml"), task_yaml("keep_me", "cpu")).unwrap();
        fs::write(tasks.path().join("b.yml"), task_yaml("drop_me", "cpu")).unwrap();

        let prepared = Collector::default()
            .with_filter(Regex::new("^keep").unwrap())
            .prepare(tasks.path())
            .unwrap();
        assert_eq!(prepared.plan.labels().collect::<Vec<_>>(), ["keep_me"]);
        assert!(prepared.failures.is_empty());
    }
}
