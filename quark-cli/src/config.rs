//! Project settings from quark.toml
//!
//! Settings can be placed in a `quark.toml` file in the project root.
//! The file is discovered by walking up from the current directory.

use quark_stats::TimeUnit;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Settings file name
pub const SETTINGS_FILE: &str = "quark.toml";

/// Quark project settings
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct QuarkSettings {
    /// Timer and statistics defaults
    #[serde(default)]
    pub runner: RunnerSettings,
    /// Artifact output
    #[serde(default)]
    pub output: OutputSettings,
}

/// Defaults applied to tasks that leave them unset
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunnerSettings {
    /// Measured repetitions per task
    #[serde(default = "default_repeat_samples")]
    pub repeat_samples: usize,
    /// Discarded repetitions before measuring
    #[serde(default = "default_warmup_samples")]
    pub warmup_samples: usize,
    /// Confidence level (e.g., 0.95 for 95%)
    #[serde(default = "default_confidence_level")]
    pub confidence_level: f64,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            repeat_samples: default_repeat_samples(),
            warmup_samples: default_warmup_samples(),
            confidence_level: default_confidence_level(),
        }
    }
}

fn default_repeat_samples() -> usize {
    quark_core::DEFAULT_REPEAT_SAMPLES
}
fn default_warmup_samples() -> usize {
    quark_core::DEFAULT_WARMUP_SAMPLES
}
fn default_confidence_level() -> f64 {
    quark_stats::DEFAULT_CONFIDENCE_LEVEL
}

/// Output settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutputSettings {
    /// Directory receiving `<label>.json`
    #[serde(default = "default_output_dir")]
    pub directory: String,
    /// Unit of persisted statistics: "sec", "ms" or "us"
    #[serde(default)]
    pub unit: TimeUnit,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            directory: default_output_dir(),
            unit: TimeUnit::default(),
        }
    }
}

fn default_output_dir() -> String {
    quark_runtime::DEFAULT_RESULTS_DIR.to_string()
}

impl QuarkSettings {
    /// Load settings from a TOML file
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let settings: Self = toml::from_str(&content)?;
        Ok(settings)
    }

    /// Try to discover and load settings by walking up from the current directory
    pub fn discover() -> Option<Self> {
        let dir = std::env::current_dir().ok()?;
        Self::discover_from(&dir)
    }

    /// Walk up from `start` looking for `quark.toml`
    pub fn discover_from(start: &Path) -> Option<Self> {
        let mut dir = start.to_path_buf();
        loop {
            let path = dir.join(SETTINGS_FILE);
            if path.exists() {
                return match Self::load(&path) {
                    Ok(settings) => Some(settings),
                    Err(e) => {
                        tracing::warn!(path = %path.display(), "ignoring settings: {e}");
                        None
                    }
                };
            }
            if !dir.pop() {
                break;
            }
        }
        None
    }

    /// Generate a default settings file as TOML string
    pub fn default_toml() -> String {
        r#"# Quark Configuration

[runner]
# Measured repetitions per task (a task's experiment.repeat wins)
repeat_samples = 33
# Discarded repetitions before measuring (a task's experiment.warmup wins)
warmup_samples = 5
# Confidence level of the reported interval (0.0 to 1.0, exclusive)
confidence_level = 0.95

[output]
# Directory receiving <label>.json
directory = "build/benchmarks"
# Unit of persisted statistics: sec, ms or us
unit = "sec"
"#
        .to_string()
    }
}
