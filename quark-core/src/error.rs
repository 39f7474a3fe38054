//! Error taxonomy.

use crate::categorical::{CategoricalValue, Domain};
use quark_stats::StatsError;
use std::fmt;
use std::path::PathBuf;

/// One rejected configuration field
#[derive(Debug, Clone, PartialEq)]
pub struct FieldError {
    /// Dotted path of the field, e.g. `dataset.input_shape`
    pub path: String,
    /// Offending value rendered as text (`null` when missing)
    pub value: String,
    /// What is wrong with it
    pub message: String,
}

impl FieldError {
    /// Create a field error
    pub fn new(path: impl Into<String>, value: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            value: value.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} (got {})", self.path, self.message, self.value)
    }
}

/// Aggregated configuration validation failure
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub struct ValidationError {
    /// Every rejected field, in pipeline order
    pub errors: Vec<FieldError>,
}

impl ValidationError {
    /// Whether any error mentions the given field path
    pub fn mentions(&self, path: &str) -> bool {
        self.errors.iter().any(|e| e.path == path)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid configuration ({} error", self.errors.len())?;
        if self.errors.len() != 1 {
            f.write_str("s")?;
        }
        f.write_str(")")?;
        for error in &self.errors {
            write!(f, "\n  - {}", error)?;
        }
        Ok(())
    }
}

/// A builder was asked for a component it cannot construct
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported {field}: {name} ('{tag}')")]
pub struct UnsupportedComponentError {
    /// Configuration field that selected the component
    pub field: String,
    /// Registered name of the value (`UNKNOWN` for unrecognised input)
    pub name: String,
    /// Tag of the value
    pub tag: String,
}

impl UnsupportedComponentError {
    /// Build from the categorical value that selected the component
    pub fn new(field: impl Into<String>, value: &CategoricalValue) -> Self {
        Self {
            field: field.into(),
            name: value.name().to_string(),
            tag: value.tag().to_string(),
        }
    }
}

/// Registering a name or tag already present in the domain
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("duplicate {conflict} in {domain}: {name} ('{tag}')")]
pub struct DuplicateDefinitionError {
    /// Domain that was being extended
    pub domain: Domain,
    /// Requested name
    pub name: String,
    /// Requested tag
    pub tag: String,
    /// Which key collided: `name` or `tag`
    pub conflict: &'static str,
}

/// A finite data source ran out of samples
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("dataset '{dataset}' is exhausted")]
pub struct ExhaustedError {
    /// Source tag of the exhausted dataset
    pub dataset: String,
}

/// Unified error type
#[derive(Debug, thiserror::Error)]
pub enum QuarkError {
    /// Configuration failed validation
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// No implementation for the selected component
    #[error(transparent)]
    Unsupported(#[from] UnsupportedComponentError),

    /// Conflicting registry entry
    #[error(transparent)]
    Duplicate(#[from] DuplicateDefinitionError),

    /// Summary statistics could not be computed
    #[error(transparent)]
    Stats(#[from] StatsError),

    /// Data source has no further batches
    #[error(transparent)]
    Exhausted(#[from] ExhaustedError),

    /// A constructed component failed its own consistency check
    #[error("invalid {component}: {reason}")]
    InvalidComponent {
        /// Component role, e.g. `workload`
        component: &'static str,
        /// Failed predicate
        reason: String,
    },

    /// Tensor shapes disagree
    #[error("shape mismatch in {context}: expected {expected:?}, got {actual:?}")]
    Shape {
        /// Operation that detected the mismatch
        context: String,
        /// Expected shape
        expected: Vec<usize>,
        /// Actual shape
        actual: Vec<usize>,
    },

    /// Clock misuse, e.g. `stop` without `start`
    #[error("timing error: {0}")]
    Timing(String),

    /// Malformed dataset file
    #[error("dataset file {path}: {reason}")]
    Dataset {
        /// File being read
        path: PathBuf,
        /// What was wrong with it
        reason: String,
    },

    /// I/O failure
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl QuarkError {
    /// Shorthand for [`QuarkError::InvalidComponent`]
    pub fn invalid(component: &'static str, reason: impl Into<String>) -> Self {
        QuarkError::InvalidComponent {
            component,
            reason: reason.into(),
        }
    }

    /// Shorthand for [`QuarkError::Unsupported`]
    pub fn unsupported(field: impl Into<String>, value: &CategoricalValue) -> Self {
        QuarkError::Unsupported(UnsupportedComponentError::new(field, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::categorical::CategoricalRegistry;

    #[test]
    fn test_validation_error_lists_fields() {
        let err = ValidationError {
            errors: vec![
                FieldError::new("label", "\"\"", "must not be empty"),
                FieldError::new("dataset.batch_size", "0", "must be at least 1"),
            ],
        };
        let text = err.to_string();
        assert!(text.contains("2 errors"));
        assert!(text.contains("dataset.batch_size"));
        assert!(err.mentions("label"));
        assert!(!err.mentions("workload"));
    }

    #[test]
    fn test_unsupported_names_unknown() {
        let registry = CategoricalRegistry::with_builtins();
        let value = registry.decode(Domain::Framework, "caffe");
        let err = UnsupportedComponentError::new("experiment.executor.framework", &value);
        assert_eq!(err.name, "UNKNOWN");
        assert_eq!(err.tag, "unknown");
        assert!(err.to_string().contains("experiment.executor.framework"));
    }
}
