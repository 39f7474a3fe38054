//! Result records.

use crate::json::{artifact_path, generate_json};
use quark_config::BenchmarkConfig;
use quark_stats::Summary;
use std::io;
use std::path::{Path, PathBuf};

/// Outcome of one task: its configuration and summary
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRecord {
    /// Task that was run
    pub config: BenchmarkConfig,
    /// Reduced timing statistics
    pub summary: Summary,
}

impl ResultRecord {
    /// Pair a configuration with its summary
    pub fn new(config: BenchmarkConfig, summary: Summary) -> Self {
        Self { config, summary }
    }

    /// Task label
    pub fn label(&self) -> &str {
        &self.config.label
    }

    /// Write the summary to `<results_dir>/<label>.json`, replacing any
    /// earlier artifact; the directory is created if needed
    pub fn persist(&self, results_dir: &Path) -> io::Result<PathBuf> {
        std::fs::create_dir_all(results_dir)?;
        let path = artifact_path(results_dir, self.label());
        let text = generate_json(&self.summary)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        std::fs::write(&path, text)?;
        tracing::info!(label = self.label(), path = %path.display(), "result persisted");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_summary;
    use quark_core::CategoricalRegistry;

    fn config(label: &str) -> BenchmarkConfig {
        let raw = serde_json::json!({
            "label": label,
            "workload": {"framework": "native", "granularity": "operator", "operator": "relu"},
            "experiment": {
                "run_mode": "inference",
                "executor": {"framework": "native", "device": "cpu"},
                "timer": "generic"
            },
            "dataset": {"source": "synthetic", "input_shape": [8], "batch_size": 2, "dtype": "float32"}
        });
        quark_config::parse_with(&raw, &CategoricalRegistry::with_builtins()).unwrap()
    }

    fn summary(mean: f64, samples: usize) -> Summary {
        Summary {
            mean_time: mean,
            median_time: mean,
            min_time: mean,
            max_time: mean,
            std_dev: 0.0,
            confidence_interval: (mean, mean),
            samples,
        }
    }

    #[test]
    fn test_persist_creates_directory_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let results = dir.path().join("nested/results");
        let record = ResultRecord::new(config("relu"), summary(0.5, 3));

        let path = record.persist(&results).unwrap();
        assert_eq!(path, results.join("relu.json"));

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let mut keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
        keys.sort();
        assert_eq!(
            keys,
            [
                "confidence_interval",
                "max_time",
                "mean_time",
                "median_time",
                "min_time",
                "samples",
                "std_dev"
            ]
        );
        assert_eq!(value["confidence_interval"], serde_json::json!([0.5, 0.5]));
    }

    #[test]
    fn test_persist_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        ResultRecord::new(config("t"), summary(1.0, 1))
            .persist(dir.path())
            .unwrap();
        let path = ResultRecord::new(config("t"), summary(2.0, 4))
            .persist(dir.path())
            .unwrap();
        let loaded = load_summary(path).unwrap();
        assert_eq!(loaded, summary(2.0, 4));
    }
}
