//! JSON Output

use quark_stats::Summary;
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};

/// File extension of persisted artifacts
pub const ARTIFACT_EXTENSION: &str = "json";

/// Serialise with a four-space indent
pub fn generate_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser)?;
    // serde_json only emits UTF-8
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// `<results_dir>/<label>.json`
pub fn artifact_path(results_dir: &Path, label: &str) -> PathBuf {
    results_dir.join(format!("{label}.{ARTIFACT_EXTENSION}"))
}

/// Read a persisted summary back
pub fn load_summary(path: impl AsRef<Path>) -> io::Result<Summary> {
    let text = std::fs::read_to_string(path)?;
    serde_json::from_str(&text).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_four_space_indent() {
        let text = generate_json(&serde_json::json!({"a": [1, 2]})).unwrap();
        assert!(text.contains("\n    \"a\": [\n        1,"));
    }

    #[test]
    fn test_artifact_path() {
        assert_eq!(
            artifact_path(Path::new("build/benchmarks"), "t1"),
            PathBuf::from("build/benchmarks/t1.json")
        );
    }
}
