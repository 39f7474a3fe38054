#![warn(missing_docs)]
//! Quark Task Configuration
//!
//! A benchmark task is described by a [`BenchmarkConfig`]. Task files are
//! read as YAML, TOML or JSON, normalised to a [`serde_json::Value`] and run
//! through an ordered validation pipeline ([`parse`]) that reports every
//! problem it finds at once.

mod loader;
mod schema;
mod validate;

pub use loader::{ConfigBuilder, ConfigError, Format, LoadStrError};
pub use schema::{
    BenchmarkConfig, DatasetConfig, ExecutorConfig, ExperimentConfig, NamedDataset, RngPolicy,
    SyntheticDataset, WorkloadConfig, WorkloadKind,
};
pub use validate::{parse, parse_with};

/// Default root directory for named datasets
pub const DEFAULT_DATA_ROOT: &str = "data";
