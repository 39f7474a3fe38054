//! Task file loading.

use crate::schema::BenchmarkConfig;
use crate::validate::parse;
use quark_core::ValidationError;
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Text format of a task file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// `.yml` / `.yaml`, and anything unrecognised
    Yaml,
    /// `.toml`
    Toml,
    /// `.json`
    Json,
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
}

impl Format {
    /// Pick the format from a file extension
    pub fn from_path(path: &Path) -> Self {
        match extension(path).as_deref() {
            Some("toml") => Format::Toml,
            Some("json") => Format::Json,
            _ => Format::Yaml,
        }
    }

    /// Whether `path` has one of the task file extensions
    pub fn is_task_file(path: &Path) -> bool {
        matches!(
            extension(path).as_deref(),
            Some("yml" | "yaml" | "toml" | "json")
        )
    }

    /// Parse text in this format into a raw value
    pub fn to_value(self, text: &str) -> Result<Value, String> {
        match self {
            Format::Yaml => serde_yaml::from_str(text).map_err(|e| e.to_string()),
            Format::Toml => toml::from_str(text).map_err(|e| e.to_string()),
            Format::Json => serde_json::from_str(text).map_err(|e| e.to_string()),
        }
    }
}

/// Failure to load a task file
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("failed to read {path}: {source}")]
    Io {
        /// Task file
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },
    /// File is not valid YAML / TOML / JSON
    #[error("failed to parse {path} as {format:?}: {message}")]
    Parse {
        /// Task file
        path: PathBuf,
        /// Format that was attempted
        format: Format,
        /// Parser message
        message: String,
    },
    /// File parsed but the task is invalid
    #[error("{path}: {source}")]
    Validation {
        /// Task file
        path: PathBuf,
        /// Aggregated field errors
        source: ValidationError,
    },
}

impl From<ConfigError> for quark_core::QuarkError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Io { source, .. } => quark_core::QuarkError::Io(source),
            ConfigError::Validation { source, .. } => quark_core::QuarkError::Validation(source),
            ConfigError::Parse {
                path,
                format,
                message,
            } => quark_core::QuarkError::Validation(ValidationError {
                errors: vec![quark_core::FieldError::new(
                    "",
                    path.display().to_string(),
                    format!("not valid {format:?}: {message}"),
                )],
            }),
        }
    }
}

/// Entry point for reading task files
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfigBuilder;

impl ConfigBuilder {
    /// Read, parse and validate a task file
    pub fn load(path: impl AsRef<Path>) -> Result<BenchmarkConfig, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let format = Format::from_path(path);
        let config = Self::load_str(&text, format).map_err(|e| match e {
            LoadStrError::Parse(message) => ConfigError::Parse {
                path: path.to_path_buf(),
                format,
                message,
            },
            LoadStrError::Validation(source) => ConfigError::Validation {
                path: path.to_path_buf(),
                source,
            },
        })?;
        tracing::debug!(path = %path.display(), label = %config.label, "loaded task");
        Ok(config)
    }

    /// Parse and validate task text
    pub fn load_str(text: &str, format: Format) -> Result<BenchmarkConfig, LoadStrError> {
        let raw = format.to_value(text).map_err(LoadStrError::Parse)?;
        parse(&raw).map_err(LoadStrError::Validation)
    }
}

/// Failure to load task text
#[derive(Debug, thiserror::Error)]
pub enum LoadStrError {
    /// Text is not valid in the requested format
    #[error("parse error: {0}")]
    Parse(String),
    /// Task is invalid
    #[error(transparent)]
    Validation(ValidationError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::WorkloadKind;
    use std::fs;

    const YAML: &str = r#"
label: conv
workload:
  framework: native
  granularity: operator
  operator: conv2d
experiment:
  run_mode: training
  executor:
    framework: native
    device: cpu
  timer: event
dataset:
  source: synthetic
  input_shape: [3, 16, 16]
  batch_size: 4
  dtype: float32
  rng:
    seed: 42
"#;

    const TOML: &str = r#"
label = "mnist-fc"

[workload]
framework = "native"
granularity = "operator"
operator = "fully_connected"

[experiment]
run_mode = "inference"
timer = "generic"
repeat = 3

[experiment.executor]
framework = "native"
device = "cpu"

[dataset]
source = "mnist"
batch_size = 16
dtype = "float32"
root = "/tmp/datasets"
"#;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(Format::from_path(Path::new("a.yml")), Format::Yaml);
        assert_eq!(Format::from_path(Path::new("a.YAML")), Format::Yaml);
        assert_eq!(Format::from_path(Path::new("a.toml")), Format::Toml);
        assert_eq!(Format::from_path(Path::new("a.json")), Format::Json);
        assert_eq!(Format::from_path(Path::new("a.cfg")), Format::Yaml);
        assert!(Format::is_task_file(Path::new("x/t.toml")));
        assert!(!Format::is_task_file(Path::new("x/t.json.bak")));
    }

    #[test]
    fn test_task_file_extension_ignores_case() {
        for name in ["bench.YAML", "bench.Yml", "bench.JSON", "bench.Toml"] {
            assert!(Format::is_task_file(Path::new(name)), "{name}");
        }
        assert_eq!(Format::from_path(Path::new("bench.JSON")), Format::Json);
        assert!(!Format::is_task_file(Path::new("README.MD")));
    }

    #[test]
    fn test_load_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conv.yaml");
        fs::write(&path, YAML).unwrap();

        let config = ConfigBuilder::load(&path).unwrap();
        assert_eq!(config.label, "conv");
        assert!(matches!(config.workload.kind, WorkloadKind::Operator(ref op) if op.is("conv2d")));
        assert_eq!(config.dataset.seed(), Some(42));
        assert!(config.experiment.timer.is("event"));
    }

    #[test]
    fn test_load_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mnist.toml");
        fs::write(&path, TOML).unwrap();

        let config = ConfigBuilder::load(&path).unwrap();
        assert_eq!(config.experiment.repeat, Some(3));
        assert_eq!(config.dataset.root(), PathBuf::from("/tmp/datasets"));
        assert_eq!(config.dataset.input_shape(), Some(vec![1, 28, 28]));
    }

    #[test]
    fn test_load_json_matches_yaml() {
        let from_yaml = ConfigBuilder::load_str(YAML, Format::Yaml).unwrap();
        let json = serde_json::to_string(&from_yaml.to_value().unwrap()).unwrap();
        let from_json = ConfigBuilder::load_str(&json, Format::Json).unwrap();
        assert_eq!(from_yaml, from_json);
    }

    #[test]
    fn test_missing_file() {
        let err = ConfigBuilder::load("/definitely/not/here.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{ not json").unwrap();
        let err = ConfigBuilder::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { format: Format::Json, .. }));
    }

    #[test]
    fn test_validation_error_keeps_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.yaml");
        fs::write(&path, YAML.replace("  input_shape: [3, 16, 16]\n", "")).unwrap();
        match ConfigBuilder::load(&path).unwrap_err() {
            ConfigError::Validation { path: p, source } => {
                assert_eq!(p, path);
                assert!(source.mentions("dataset.input_shape"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
