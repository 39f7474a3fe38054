#![warn(missing_docs)]
//! Quark Report
//!
//! One [`ResultRecord`] per task, persisted as `<results_dir>/<label>.json`
//! holding the summary statistics.

mod json;
mod record;

pub use json::{ARTIFACT_EXTENSION, artifact_path, generate_json, load_summary};
pub use record::ResultRecord;
