#![warn(missing_docs)]
//! Quark Runtime
//!
//! Turns a validated [`quark_config::BenchmarkConfig`] into running components:
//! - One capability trait per pluggable role ([`Workload`], [`ExecutorBackend`],
//!   [`DataProvider`]) plus the statistical [`quark_core::Timer`]
//! - Builders selecting implementations by categorical tag
//! - Framework plugins discovered through `inventory`
//! - The `native` reference backend (plain-Rust CPU kernels)
//! - [`Runner`] for one task, [`Collector`] for a directory of tasks

mod builders;
mod collector;
mod component;
pub mod native;
mod planner;
mod plugin;
mod runner;

pub use builders::{TimerSettings, build_data_provider, build_executor, build_timer, build_workload};
pub use collector::{Collector, Prepared, TaskOutcome, discover_tasks};
pub use component::{DataProvider, ExecutorBackend, Pass, Workload};
pub use planner::{ExecutionPlan, PlannedTask, build_plan};
pub use plugin::{FrameworkPlugin, find_plugin, register_plugins};
pub use runner::{DEFAULT_RESULTS_DIR, Runner, RunnerOptions};

/// Learning rate of the optimizer step in training mode
pub const LEARNING_RATE: f32 = 0.01;
