//! Task Planner
//!
//! Builds the execution plan by filtering and ordering validated tasks.
//!
//! Filtering: regex match on the task label.
//! Ordering: tasks are sorted by label, then path, for deterministic runs.

use quark_config::BenchmarkConfig;
use regex::Regex;
use std::path::PathBuf;

/// One validated task and the file it came from
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedTask {
    /// Task file
    pub path: PathBuf,
    /// Validated configuration
    pub config: BenchmarkConfig,
}

impl PlannedTask {
    /// Task label
    pub fn label(&self) -> &str {
        &self.config.label
    }
}

/// Execution plan for tasks
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionPlan {
    /// Ordered list of tasks to run
    pub tasks: Vec<PlannedTask>,
}

impl ExecutionPlan {
    /// Number of planned tasks
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether nothing survived filtering
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Labels in run order
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.tasks.iter().map(PlannedTask::label)
    }
}

/// Build the execution plan from parsed tasks
pub fn build_plan(
    tasks: impl IntoIterator<Item = PlannedTask>,
    filter: Option<&Regex>,
) -> ExecutionPlan {
    let mut selected: Vec<_> = tasks
        .into_iter()
        .filter(|t| filter.map_or(true, |re| re.is_match(t.label())))
        .collect();

    selected.sort_by(|a, b| a.label().cmp(b.label()).then_with(|| a.path.cmp(&b.path)));

    ExecutionPlan { tasks: selected }
}
