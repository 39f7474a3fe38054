//! Human-readable run summary

use quark_runtime::{ExecutionPlan, TaskOutcome};
use quark_stats::TimeUnit;
use std::path::Path;

/// Render outcomes as a plain-text table
pub fn format_human_output(outcomes: &[TaskOutcome], unit: TimeUnit, results_dir: &Path) -> String {
    let mut output = String::new();

    output.push('\n');
    output.push_str("Quark Results\n");
    output.push_str(&"=".repeat(60));
    output.push_str("\n\n");

    for outcome in outcomes {
        let name = outcome
            .label
            .clone()
            .unwrap_or_else(|| outcome.path.display().to_string());
        match &outcome.result {
            Ok(record) => {
                let s = &record.summary;
                output.push_str(&format!("  ✓ {}\n", name));
                output.push_str(&format!(
                    "      mean: {:.6} {unit}  median: {:.6} {unit}  stddev: {:.6} {unit}\n",
                    s.mean_time, s.median_time, s.std_dev
                ));
                output.push_str(&format!(
                    "      min: {:.6} {unit}  max: {:.6} {unit}  samples: {}\n",
                    s.min_time, s.max_time, s.samples
                ));
                output.push_str(&format!(
                    "      ci: [{:.6}, {:.6}] {unit}  -> {}\n",
                    s.confidence_interval.0,
                    s.confidence_interval.1,
                    quark_report::artifact_path(results_dir, record.label()).display()
                ));
            }
            Err(e) => {
                output.push_str(&format!("  ✗ {}\n", name));
                for line in e.to_string().lines() {
                    output.push_str(&format!("      {}\n", line));
                }
            }
        }
    }

    let passed = outcomes.iter().filter(|o| o.is_success()).count();
    output.push('\n');
    output.push_str(&format!(
        "Summary: {} passed, {} failed\n",
        passed,
        outcomes.len() - passed
    ));
    output
}

/// Render a plan for `--dry-run`
pub fn format_plan(plan: &ExecutionPlan) -> String {
    let mut output = format!("Planned {} task(s):\n", plan.len());
    for task in &plan.tasks {
        output.push_str(&format!("  {}  ({})\n", task.label(), task.path.display()));
    }
    output
}
