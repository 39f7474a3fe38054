//! Validation Pipeline
//!
//! `raw value → read (structure + categorical decode) → invariants → assemble`.
//! Every stage appends to one error list; nothing is assembled unless the
//! list is empty at the end.

use crate::schema::{
    BenchmarkConfig, DatasetConfig, ExecutorConfig, ExperimentConfig, NamedDataset, RngPolicy,
    SyntheticDataset, WorkloadConfig, WorkloadKind,
};
use quark_core::categorical::{self, CategoricalRegistry};
use quark_core::{CategoricalValue, Domain, FieldError, ValidationError, tags};
use serde_json::{Map, Value};
use std::path::PathBuf;

/// Validate a raw task against the process-wide registry
pub fn parse(raw: &Value) -> Result<BenchmarkConfig, ValidationError> {
    Pipeline::new(raw, &categorical::decode).run()
}

/// Validate a raw task against an explicit registry
pub fn parse_with(
    raw: &Value,
    registry: &CategoricalRegistry,
) -> Result<BenchmarkConfig, ValidationError> {
    let decode = |domain: Domain, text: &str| registry.decode(domain, text);
    Pipeline::new(raw, &decode).run()
}

type Decode<'a> = &'a dyn Fn(Domain, &str) -> CategoricalValue;

/// Fields as read from the raw value; `None` where reading failed
#[derive(Debug, Default)]
struct Draft {
    label: Option<String>,

    workload_framework: Option<CategoricalValue>,
    granularity: Option<CategoricalValue>,
    operator: Present<CategoricalValue>,
    operators: Present<Vec<CategoricalValue>>,
    model: Present<CategoricalValue>,

    run_mode: Option<CategoricalValue>,
    executor_framework: Option<CategoricalValue>,
    device: Option<CategoricalValue>,
    timer: Option<CategoricalValue>,
    repeat: Present<usize>,
    warmup: Present<usize>,

    source: Option<CategoricalValue>,
    input_shape: Present<Vec<usize>>,
    batch_size: Option<usize>,
    dtype: Option<CategoricalValue>,
    rng: Present<RngPolicy>,
    root: Present<PathBuf>,
}

/// Optional field: absent, present and well-formed, or present but malformed
#[derive(Debug, Default)]
enum Present<T> {
    #[default]
    Absent,
    Valid(T),
    Malformed,
}

impl<T> Present<T> {
    fn is_present(&self) -> bool {
        !matches!(self, Present::Absent)
    }

    fn valid(&self) -> Option<&T> {
        match self {
            Present::Valid(v) => Some(v),
            _ => None,
        }
    }

    fn into_option(self) -> Option<T> {
        match self {
            Present::Valid(v) => Some(v),
            _ => None,
        }
    }
}

struct Pipeline<'a> {
    raw: &'a Value,
    decode: Decode<'a>,
    errors: Vec<FieldError>,
}

type Invariant = fn(&Draft, &mut Vec<FieldError>);

/// Cross-field rules, applied in order after reading
const INVARIANTS: &[Invariant] = &[
    check_label,
    check_workload_shape,
    check_dataset_shape,
    check_batch_size,
    check_input_dims,
    check_repeat,
];

impl<'a> Pipeline<'a> {
    fn new(raw: &'a Value, decode: Decode<'a>) -> Self {
        Self {
            raw,
            decode,
            errors: Vec::new(),
        }
    }

    fn run(mut self) -> Result<BenchmarkConfig, ValidationError> {
        let draft = self.read();
        for invariant in INVARIANTS {
            invariant(&draft, &mut self.errors);
        }
        if !self.errors.is_empty() {
            tracing::debug!(errors = self.errors.len(), "task rejected");
            return Err(ValidationError {
                errors: self.errors,
            });
        }
        assemble(draft).ok_or_else(|| ValidationError {
            errors: vec![FieldError::new("", "", "incomplete configuration")],
        })
    }

    fn fail(&mut self, path: &str, value: Option<&Value>, message: impl Into<String>) {
        let value = value.map_or_else(|| "null".to_string(), Value::to_string);
        self.errors.push(FieldError::new(path, value, message));
    }

    // ─── Reading ─────────────────────────────────────────────────────────

    fn read(&mut self) -> Draft {
        let mut draft = Draft::default();
        let raw = self.raw;
        let Some(root) = raw.as_object() else {
            self.fail("", Some(raw), "task must be a mapping");
            return draft;
        };

        draft.label = self.string(root, "label", "label");

        if let Some(workload) = self.section(root, "workload", "workload") {
            draft.workload_framework =
                self.categorical(workload, "workload", "framework", Domain::Framework);
            draft.granularity =
                self.categorical(workload, "workload", "granularity", Domain::Granularity);
            draft.operator = self.optional(workload, "operator", |p, v| {
                p.decode_text(v, "workload.operator", Domain::Operator)
            });
            draft.operators = self.optional(workload, "operators", |p, v| {
                p.decode_list(v, "workload.operators", Domain::Operator)
            });
            draft.model = self.optional(workload, "model", |p, v| {
                p.decode_text(v, "workload.model", Domain::Model)
            });
        }

        if let Some(experiment) = self.section(root, "experiment", "experiment") {
            draft.run_mode = self.categorical(experiment, "experiment", "run_mode", Domain::RunMode);
            draft.timer = self.categorical(experiment, "experiment", "timer", Domain::Timer);
            if let Some(executor) = self.section(experiment, "experiment.executor", "executor") {
                draft.executor_framework =
                    self.categorical(executor, "experiment.executor", "framework", Domain::Framework);
                draft.device =
                    self.categorical(executor, "experiment.executor", "device", Domain::Device);
            }
            draft.repeat = self.optional(experiment, "repeat", |p, v| {
                p.count(v, "experiment.repeat")
            });
            draft.warmup = self.optional(experiment, "warmup", |p, v| {
                p.count(v, "experiment.warmup")
            });
        }

        if let Some(dataset) = self.section(root, "dataset", "dataset") {
            draft.source = self.categorical(dataset, "dataset", "source", Domain::DataSource);
            draft.dtype = self.categorical(dataset, "dataset", "dtype", Domain::Dtype);
            draft.batch_size = match dataset.get("batch_size") {
                Some(v) => self.count(v, "dataset.batch_size"),
                None => {
                    self.fail("dataset.batch_size", None, "required field is missing");
                    None
                }
            };
            draft.input_shape =
                self.optional(dataset, "input_shape", |p, v| {
                    p.shape(v, "dataset.input_shape")
                });
            draft.rng = self.optional(dataset, "rng", |p, v| p.rng(v));
            draft.root = self.optional(dataset, "root", |p, v| match v.as_str() {
                Some(s) => Some(PathBuf::from(s)),
                None => {
                    p.fail("dataset.root", Some(v), "must be a path string");
                    None
                }
            });
        }

        draft
    }

    fn section<'v>(
        &mut self,
        parent: &'v Map<String, Value>,
        path: &str,
        key: &str,
    ) -> Option<&'v Map<String, Value>> {
        match parent.get(key) {
            Some(Value::Object(map)) => Some(map),
            Some(other) => {
                self.fail(path, Some(other), "must be a mapping");
                None
            }
            None => {
                self.fail(path, None, "required section is missing");
                None
            }
        }
    }

    fn string(&mut self, parent: &Map<String, Value>, path: &str, key: &str) -> Option<String> {
        match parent.get(key) {
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => {
                self.fail(path, Some(other), "must be a string");
                None
            }
            None => {
                self.fail(path, None, "required field is missing");
                None
            }
        }
    }

    fn categorical(
        &mut self,
        parent: &Map<String, Value>,
        section: &str,
        key: &str,
        domain: Domain,
    ) -> Option<CategoricalValue> {
        let path = format!("{section}.{key}");
        let text = self.string(parent, &path, key)?;
        Some((self.decode)(domain, &text))
    }

    fn optional<T>(
        &mut self,
        parent: &Map<String, Value>,
        key: &str,
        read: impl FnOnce(&mut Self, &Value) -> Option<T>,
    ) -> Present<T> {
        match parent.get(key) {
            None => Present::Absent,
            Some(v) => match read(self, v) {
                Some(t) => Present::Valid(t),
                None => Present::Malformed,
            },
        }
    }

    fn decode_text(&mut self, value: &Value, path: &str, domain: Domain) -> Option<CategoricalValue> {
        match value.as_str() {
            Some(text) => Some((self.decode)(domain, text)),
            None => {
                self.fail(path, Some(value), "must be a string");
                None
            }
        }
    }

    fn decode_list(
        &mut self,
        value: &Value,
        path: &str,
        domain: Domain,
    ) -> Option<Vec<CategoricalValue>> {
        let Some(items) = value.as_array() else {
            self.fail(path, Some(value), "must be a list of strings");
            return None;
        };
        let mut decoded = Vec::with_capacity(items.len());
        let mut ok = true;
        for (i, item) in items.iter().enumerate() {
            match self.decode_text(item, &format!("{path}[{i}]"), domain) {
                Some(v) => decoded.push(v),
                None => ok = false,
            }
        }
        ok.then_some(decoded)
    }

    fn count(&mut self, value: &Value, path: &str) -> Option<usize> {
        match value.as_u64().and_then(|n| usize::try_from(n).ok()) {
            Some(n) => Some(n),
            None => {
                self.fail(path, Some(value), "must be a non-negative integer");
                None
            }
        }
    }

    fn shape(&mut self, value: &Value, path: &str) -> Option<Vec<usize>> {
        let Some(items) = value.as_array() else {
            self.fail(path, Some(value), "must be a list of integers");
            return None;
        };
        let mut dims = Vec::with_capacity(items.len());
        let mut ok = true;
        for (i, item) in items.iter().enumerate() {
            match self.count(item, &format!("{path}[{i}]")) {
                Some(d) => dims.push(d),
                None => ok = false,
            }
        }
        ok.then_some(dims)
    }

    fn rng(&mut self, value: &Value) -> Option<RngPolicy> {
        let Some(map) = value.as_object() else {
            self.fail("dataset.rng", Some(value), "must be a mapping");
            return None;
        };
        match map.get("seed") {
            None | Some(Value::Null) => Some(RngPolicy { seed: None }),
            Some(seed) => match seed.as_u64() {
                Some(s) => Some(RngPolicy { seed: Some(s) }),
                None => {
                    self.fail("dataset.rng.seed", Some(seed), "must be a non-negative integer");
                    None
                }
            },
        }
    }
}

// ─── Invariants ──────────────────────────────────────────────────────────────

fn check_label(draft: &Draft, errors: &mut Vec<FieldError>) {
    let Some(label) = &draft.label else { return };
    let rendered = Value::String(label.clone()).to_string();
    if label.trim().is_empty() {
        errors.push(FieldError::new("label", rendered, "must not be empty"));
    } else if label.contains(['/', '\\']) || label == "." || label == ".." {
        errors.push(FieldError::new(
            "label",
            rendered,
            "must be usable as a file name (no path separators)",
        ));
    }
}

fn check_workload_shape(draft: &Draft, errors: &mut Vec<FieldError>) {
    let Some(granularity) = &draft.granularity else { return };
    let expected = match granularity.tag() {
        tags::OPERATOR => "operator",
        tags::FUSED_OPERATOR => "operators",
        tags::MODEL => "model",
        _ => {
            errors.push(FieldError::new(
                "workload.granularity",
                granularity.tag(),
                "does not match any workload shape (operator, fused_operator, model)",
            ));
            return;
        }
    };

    let present = [
        ("operator", draft.operator.is_present()),
        ("operators", draft.operators.is_present()),
        ("model", draft.model.is_present()),
    ];
    for (key, is_present) in present {
        let path = format!("workload.{key}");
        if key == expected && !is_present {
            errors.push(FieldError::new(
                path,
                "null",
                format!("required when granularity is '{}'", granularity.tag()),
            ));
        } else if key != expected && is_present {
            errors.push(FieldError::new(
                path,
                "present",
                format!("not allowed when granularity is '{}'", granularity.tag()),
            ));
        }
    }

    if let Some(ops) = draft.operators.valid() {
        if expected == "operators" && ops.is_empty() {
            errors.push(FieldError::new(
                "workload.operators",
                "[]",
                "must list at least one operator",
            ));
        }
    }
}

fn check_dataset_shape(draft: &Draft, errors: &mut Vec<FieldError>) {
    let Some(source) = &draft.source else { return };
    if source.is(tags::SYNTHETIC) {
        if !draft.input_shape.is_present() {
            errors.push(FieldError::new(
                "dataset.input_shape",
                "null",
                "required for synthetic sources",
            ));
        }
        return;
    }
    if draft.input_shape.is_present() {
        errors.push(FieldError::new(
            "dataset.input_shape",
            "present",
            format!("not allowed for source '{}'; the shape follows from the source", source.tag()),
        ));
    }
    if draft.rng.is_present() {
        errors.push(FieldError::new(
            "dataset.rng",
            "present",
            format!("only synthetic sources take an rng policy, not '{}'", source.tag()),
        ));
    }
}

fn check_batch_size(draft: &Draft, errors: &mut Vec<FieldError>) {
    if draft.batch_size == Some(0) {
        errors.push(FieldError::new("dataset.batch_size", "0", "must be at least 1"));
    }
}

fn check_input_dims(draft: &Draft, errors: &mut Vec<FieldError>) {
    let Some(shape) = draft.input_shape.valid() else { return };
    if shape.is_empty() {
        errors.push(FieldError::new(
            "dataset.input_shape",
            "[]",
            "must have at least one dimension",
        ));
    }
    for (i, &dim) in shape.iter().enumerate() {
        if dim == 0 {
            errors.push(FieldError::new(
                format!("dataset.input_shape[{i}]"),
                "0",
                "dimensions must be at least 1",
            ));
        }
    }
}

fn check_repeat(draft: &Draft, errors: &mut Vec<FieldError>) {
    if draft.repeat.valid() == Some(&0) {
        errors.push(FieldError::new("experiment.repeat", "0", "must be at least 1"));
    }
}

// ─── Assembly ────────────────────────────────────────────────────────────────

fn assemble(draft: Draft) -> Option<BenchmarkConfig> {
    let granularity = draft.granularity?;
    let kind = match granularity.tag() {
        tags::OPERATOR => WorkloadKind::Operator(draft.operator.into_option()?),
        tags::FUSED_OPERATOR => WorkloadKind::FusedOperator(draft.operators.into_option()?),
        tags::MODEL => WorkloadKind::Model(draft.model.into_option()?),
        _ => return None,
    };

    let source = draft.source?;
    let batch_size = draft.batch_size?;
    let dtype = draft.dtype?;
    let dataset = if source.is(tags::SYNTHETIC) {
        if draft.root.is_present() {
            tracing::warn!("dataset.root is ignored for synthetic sources");
        }
        DatasetConfig::Synthetic(SyntheticDataset {
            source,
            input_shape: draft.input_shape.into_option()?,
            batch_size,
            dtype,
            rng: draft.rng.into_option(),
        })
    } else {
        DatasetConfig::Named(NamedDataset {
            source,
            batch_size,
            dtype,
            root: draft.root.into_option(),
        })
    };

    Some(BenchmarkConfig {
        label: draft.label?,
        workload: WorkloadConfig {
            framework: draft.workload_framework?,
            granularity,
            kind,
        },
        experiment: ExperimentConfig {
            run_mode: draft.run_mode?,
            executor: ExecutorConfig {
                framework: draft.executor_framework?,
                device: draft.device?,
            },
            timer: draft.timer?,
            repeat: draft.repeat.into_option(),
            warmup: draft.warmup.into_option(),
        },
        dataset,
    })
}
