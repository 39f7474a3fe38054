//! Task schema.

use quark_core::{CategoricalValue, tags};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Root description of one benchmark task
///
/// Serialises to the same raw shape [`crate::parse`] accepts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenchmarkConfig {
    /// Result key and artifact file stem
    pub label: String,
    /// What to run
    pub workload: WorkloadConfig,
    /// How to run it
    pub experiment: ExperimentConfig,
    /// What to feed it
    pub dataset: DatasetConfig,
}

impl BenchmarkConfig {
    /// Render back to the raw form
    pub fn to_value(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

/// Workload selection
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkloadConfig {
    /// Framework providing the workload
    pub framework: CategoricalValue,
    /// Granularity tag; agrees with `kind`
    pub granularity: CategoricalValue,
    /// Operator, fused operator list or model
    #[serde(flatten)]
    pub kind: WorkloadKind,
}

/// The three mutually exclusive workload shapes
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum WorkloadKind {
    /// A single operator
    #[serde(rename = "operator")]
    Operator(CategoricalValue),
    /// A sequence of operators run back to back
    #[serde(rename = "operators")]
    FusedOperator(Vec<CategoricalValue>),
    /// A named model
    #[serde(rename = "model")]
    Model(CategoricalValue),
}

impl WorkloadKind {
    /// Granularity tag this shape corresponds to
    pub fn granularity_tag(&self) -> &'static str {
        match self {
            WorkloadKind::Operator(_) => tags::OPERATOR,
            WorkloadKind::FusedOperator(_) => tags::FUSED_OPERATOR,
            WorkloadKind::Model(_) => tags::MODEL,
        }
    }

    /// Human-readable identifier, e.g. `conv2d+relu`
    pub fn describe(&self) -> String {
        match self {
            WorkloadKind::Operator(op) => op.tag().to_string(),
            WorkloadKind::FusedOperator(ops) => ops
                .iter()
                .map(|op| op.tag())
                .collect::<Vec<_>>()
                .join("+"),
            WorkloadKind::Model(model) => model.tag().to_string(),
        }
    }
}

/// Run mode, executor and timing strategy
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExperimentConfig {
    /// `inference` or `training`
    pub run_mode: CategoricalValue,
    /// Execution backend and device
    pub executor: ExecutorConfig,
    /// Timing strategy tag
    pub timer: CategoricalValue,
    /// Measured repetitions override
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repeat: Option<usize>,
    /// Warmup repetitions override
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warmup: Option<usize>,
}

/// Execution backend selection
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutorConfig {
    /// Framework providing the executor and data provider
    pub framework: CategoricalValue,
    /// Target device
    pub device: CategoricalValue,
}

/// Input data selection
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DatasetConfig {
    /// Generated inputs of an explicit shape
    Synthetic(SyntheticDataset),
    /// A named dataset whose shape follows from its source
    Named(NamedDataset),
}

/// Generated inputs
///
/// Synthetic data is never read from disk; a `root` key in the task is
/// accepted and ignored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyntheticDataset {
    /// Always the `synthetic` source
    pub source: CategoricalValue,
    /// Per-sample shape, without the batch dimension
    pub input_shape: Vec<usize>,
    /// Samples per batch
    pub batch_size: usize,
    /// Element type
    pub dtype: CategoricalValue,
    /// Random generator policy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rng: Option<RngPolicy>,
}

/// Seeding for synthetic data
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RngPolicy {
    /// Fixed seed; entropy-seeded when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

/// Named dataset read from disk
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NamedDataset {
    /// Dataset identifier, e.g. `cifar10`
    pub source: CategoricalValue,
    /// Samples per batch
    pub batch_size: usize,
    /// Element type
    pub dtype: CategoricalValue,
    /// Directory holding the dataset files
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,
}

impl DatasetConfig {
    /// Data source
    pub fn source(&self) -> &CategoricalValue {
        match self {
            DatasetConfig::Synthetic(d) => &d.source,
            DatasetConfig::Named(d) => &d.source,
        }
    }

    /// Samples per batch
    pub fn batch_size(&self) -> usize {
        match self {
            DatasetConfig::Synthetic(d) => d.batch_size,
            DatasetConfig::Named(d) => d.batch_size,
        }
    }

    /// Element type
    pub fn dtype(&self) -> &CategoricalValue {
        match self {
            DatasetConfig::Synthetic(d) => &d.dtype,
            DatasetConfig::Named(d) => &d.dtype,
        }
    }

    /// Per-sample shape; `None` for sources whose shape is not known here
    pub fn input_shape(&self) -> Option<Vec<usize>> {
        match self {
            DatasetConfig::Synthetic(d) => Some(d.input_shape.clone()),
            DatasetConfig::Named(d) => named_shape(&d.source),
        }
    }

    /// Fixed RNG seed, if any
    pub fn seed(&self) -> Option<u64> {
        match self {
            DatasetConfig::Synthetic(d) => d.rng.as_ref().and_then(|r| r.seed),
            DatasetConfig::Named(_) => None,
        }
    }

    /// Dataset root directory, defaulting to `./data`
    pub fn root(&self) -> PathBuf {
        match self {
            DatasetConfig::Named(NamedDataset { root: Some(root), .. }) => root.clone(),
            _ => Path::new(crate::DEFAULT_DATA_ROOT).to_path_buf(),
        }
    }
}

/// Sample shape of a well-known named dataset
pub(crate) fn named_shape(source: &CategoricalValue) -> Option<Vec<usize>> {
    match source.tag() {
        tags::CIFAR10 => Some(vec![3, 32, 32]),
        tags::MNIST => Some(vec![1, 28, 28]),
        _ => None,
    }
}
