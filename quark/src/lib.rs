#![warn(missing_docs)]
//! # Quark
//!
//! Benchmark orchestration for machine-learning workloads.
//!
//! A benchmark task is a declarative file naming a workload (an operator, a
//! fused chain of operators, or a whole model), the framework and device that
//! execute it, the dataset feeding it, and the timer measuring it:
//! - **Tagged registry**: every categorical field decodes case-insensitively
//!   against an extensible registry, unknown values becoming `UNKNOWN`
//! - **Validated configuration**: every invalid field is reported in one error
//! - **Statistical timer**: warmup, repeated measurement, mean/median/min/max,
//!   sample standard deviation and a normal confidence interval
//! - **Pluggable frameworks**: integrations submit factories through `inventory`
//! - **Native backend**: plain-Rust CPU kernels for operators and model proxies
//!
//! ## Quick Start
//!
//! ```ignore
//! use quark::prelude::*;
//!
//! let config = ConfigBuilder::load("experiments/t1.yml")?;
//! let mut runner = Runner::new(config)?;
//! let record = runner.run()?;
//! println!("mean: {} s", record.summary.mean_time);
//! ```
//!
//! ## Adding a framework
//!
//! ```ignore
//! quark::internal::inventory::submit! {
//!     quark::FrameworkPlugin {
//!         name: "ONNX",
//!         tag: "onnx",
//!         workload: Some(build_workload),
//!         executor: Some(build_executor),
//!         data_provider: None,
//!         clock: None,
//!     }
//! }
//! ```

// Re-export core types
pub use quark_core::{
    Batch, CategoricalRegistry, CategoricalValue, Clock, DeviceTimeline, Domain,
    DuplicateDefinitionError, EventClock, ExhaustedError, FieldError, HostTimeline, PluginDef,
    QuarkError, Result, Tensor, Timer, TimerState, UnsupportedComponentError, ValidationError,
    WallClock, categorical, tags,
};

// Re-export configuration
pub use quark_config::{
    BenchmarkConfig, ConfigBuilder, ConfigError, DatasetConfig, ExperimentConfig, Format,
    WorkloadConfig, WorkloadKind, parse, parse_with,
};

// Re-export runtime
pub use quark_runtime::{
    Collector, DataProvider, ExecutorBackend, FrameworkPlugin, Pass, Runner, RunnerOptions,
    TaskOutcome, Workload, build_data_provider, build_executor, build_timer, build_workload,
    find_plugin, native, register_plugins,
};

// Re-export reporting and statistics
pub use quark_report::{ResultRecord, load_summary};
pub use quark_stats::{Summary, TimeUnit, compute_summary};

/// Internal re-exports for plugin submission
#[doc(hidden)]
pub mod internal {
    pub use inventory;
}

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        BenchmarkConfig, ConfigBuilder, DataProvider, ExecutorBackend, QuarkError, Runner,
        RunnerOptions, Summary, TimeUnit, Workload,
    };
}

/// Run the Quark CLI harness.
///
/// ```ignore
/// fn main() {
///     quark::run().unwrap();
/// }
/// ```
pub use quark_cli::run;
