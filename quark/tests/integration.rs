//! Integration tests for Quark
//!
//! These tests drive whole tasks through configuration, builders, timer and
//! artifact output.

use quark::categorical;
use quark::{
    BenchmarkConfig, Clock, ConfigBuilder, DataProvider, Domain, ExecutorBackend, FrameworkPlugin,
    PluginDef, QuarkError, Result, Runner, RunnerOptions, Tensor, TimeUnit, WallClock, Workload,
    load_summary, native, parse, register_plugins,
};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};

// ─── Plugins ────────────────────────────────────────────────────────────────

static ECHO_CALLS: AtomicUsize = AtomicUsize::new(0);

struct EchoExecutor;

impl ExecutorBackend for EchoExecutor {
    fn describe(&self) -> String {
        "echo".to_string()
    }

    fn validate(&self) -> Result<()> {
        Ok(())
    }

    fn execute(
        &mut self,
        workload: &mut dyn Workload,
        data: &mut dyn DataProvider,
    ) -> Result<Tensor> {
        ECHO_CALLS.fetch_add(1, Ordering::SeqCst);
        let batch = data.next_batch()?;
        workload.forward(&batch.inputs, quark::Pass::Inference)
    }
}

fn echo_executor(_: &BenchmarkConfig) -> Result<Box<dyn ExecutorBackend>> {
    Ok(Box::new(EchoExecutor))
}

fn echo_clock() -> Box<dyn Clock> {
    Box::new(WallClock::default())
}

struct FlakyExecutor;

impl ExecutorBackend for FlakyExecutor {
    fn describe(&self) -> String {
        "flaky".to_string()
    }

    fn validate(&self) -> Result<()> {
        Ok(())
    }

    fn execute(&mut self, _: &mut dyn Workload, _: &mut dyn DataProvider) -> Result<Tensor> {
        Err(QuarkError::invalid("executor", "device lost"))
    }
}

fn flaky_executor(_: &BenchmarkConfig) -> Result<Box<dyn ExecutorBackend>> {
    Ok(Box::new(FlakyExecutor))
}

quark::internal::inventory::submit! {
    FrameworkPlugin {
        name: "ECHO",
        tag: "echo",
        workload: Some(native::workload),
        executor: Some(echo_executor),
        data_provider: Some(native::data_provider),
        clock: Some(echo_clock),
    }
}

quark::internal::inventory::submit! {
    FrameworkPlugin {
        name: "FLAKY",
        tag: "flaky",
        workload: Some(native::workload),
        executor: Some(flaky_executor),
        data_provider: Some(native::data_provider),
        clock: None,
    }
}

quark::internal::inventory::submit! {
    PluginDef { domain: Domain::Model, name: "TINYNET", tag: "tinynet" }
}

// ─── Helpers ────────────────────────────────────────────────────────────────

fn task(label: &str) -> serde_json::Value {
    json!({
        "label": label,
        "workload": {"framework": "native", "granularity": "operator", "operator": "relu"},
        "experiment": {
            "run_mode": "inference",
            "executor": {"framework": "native", "device": "cpu"},
            "timer": "generic",
            "repeat": 4,
            "warmup": 1
        },
        "dataset": {"source": "synthetic", "input_shape": [8], "batch_size": 2, "dtype": "float32"}
    })
}

fn options(dir: &std::path::Path) -> RunnerOptions {
    RunnerOptions {
        results_dir: dir.to_path_buf(),
        ..RunnerOptions::default()
    }
}

// ─── Scenarios ──────────────────────────────────────────────────────────────

/// A model task loaded from YAML runs end to end and persists its summary
#[test]
fn test_model_task_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("t1.yml");
    std::fs::write(
        &path,
        "label: t1
workload:
  framework: native
  granularity: model
  model: mobilenet
experiment:
  run_mode: inference
  executor:
    framework: native
    device: cpu
  timer: generic
  repeat: 10
  warmup: 2
dataset:
  source: synthetic
  input_shape: [3, 224, 224]
  batch_size: 32
  dtype: float32
",
    )
    .unwrap();

    let config = ConfigBuilder::load(&path).unwrap();
    let out = dir.path().join("results");
    let mut runner = Runner::with_options(config, options(&out)).unwrap();
    assert!(runner.results().is_none());

    let summary = runner.run().unwrap().summary.clone();
    assert_eq!(summary.samples, 10);
    assert!(summary.mean_time >= 0.0);
    assert!(summary.min_time <= summary.median_time && summary.median_time <= summary.max_time);
    assert!(summary.confidence_interval.0 <= summary.mean_time);
    assert!(summary.mean_time <= summary.confidence_interval.1);

    let persisted = load_summary(out.join("t1.json")).unwrap();
    assert_eq!(persisted.samples, 10);
    assert!((persisted.mean_time - summary.mean_time).abs() <= 1e-12 * summary.mean_time.max(1.0));
    assert_eq!(runner.results(), Some(&summary));
}

/// Training mode runs the optimizer step and reports in the requested unit
#[test]
fn test_training_task_in_milliseconds() {
    let dir = tempfile::tempdir().unwrap();
    let mut raw = task("train_fc");
    raw["workload"] = json!({
        "framework": "native",
        "granularity": "fused_operator",
        "operators": ["fully_connected", "relu"]
    });
    raw["experiment"]["run_mode"] = json!("Training");
    let config = parse(&raw).unwrap();

    let opts = RunnerOptions {
        unit: TimeUnit::Milliseconds,
        ..options(dir.path())
    };
    let mut runner = Runner::with_options(config, opts).unwrap();
    let seconds: f64 = runner.run().unwrap().summary.mean_time / 1e3;
    let recorded: f64 = runner.timer().samples().iter().sum::<f64>() / 4.0;
    assert!((seconds - recorded).abs() < 1e-9);
}

/// A submitted plugin becomes decodable and its components are built
#[test]
fn test_plugin_framework_runs() {
    let added = register_plugins().unwrap();
    assert!(added.iter().any(|v| v.domain() == Domain::Framework && v.is("echo")));
    assert!(added.iter().any(|v| v.domain() == Domain::Timer && v.is("echo")));
    assert!(!categorical::decode(Domain::Model, "TinyNet").is_unknown());

    let dir = tempfile::tempdir().unwrap();
    let mut raw = task("echo_relu");
    raw["workload"]["framework"] = json!("ECHO");
    raw["experiment"]["executor"]["framework"] = json!("echo");
    raw["experiment"]["timer"] = json!("echo");
    let config = parse(&raw).unwrap();
    assert_eq!(config.experiment.executor.framework.name(), "ECHO");

    let before = ECHO_CALLS.load(Ordering::SeqCst);
    let mut runner = Runner::with_options(config, options(dir.path())).unwrap();
    assert_eq!(runner.run().unwrap().summary.samples, 4);
    assert!(ECHO_CALLS.load(Ordering::SeqCst) - before >= 5);
}

/// A failing executor aborts the run and leaves no samples or artifact
#[test]
fn test_failed_run_discards_samples() {
    register_plugins().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let mut raw = task("flaky");
    raw["experiment"]["executor"]["framework"] = json!("flaky");
    let config = parse(&raw).unwrap();

    let mut runner = Runner::with_options(config, options(dir.path())).unwrap();
    let err = runner.run().unwrap_err();
    assert!(err.to_string().contains("device lost"));
    assert!(runner.results().is_none());
    assert!(runner.timer().samples().is_empty());
    assert!(!dir.path().join("flaky.json").exists());
}

/// Cross-field rules report every violation at once
#[test]
fn test_validation_aggregates_errors() {
    let mut raw = task("bad/label");
    raw["workload"]["model"] = json!("resnet18");
    raw["dataset"] = json!({"source": "mnist", "input_shape": [1, 28, 28], "batch_size": 0, "dtype": "float32"});

    let err = parse(&raw).unwrap_err();
    assert!(err.mentions("label"));
    assert!(err.mentions("workload.model"));
    assert!(err.mentions("dataset.input_shape"));
    assert!(err.mentions("dataset.batch_size"));
    assert!(err.errors.len() >= 4);
}

/// An unrecognised framework decodes to UNKNOWN and the builder names it
#[test]
fn test_unknown_executor_is_unsupported() {
    let mut raw = task("mystery");
    raw["experiment"]["executor"]["framework"] = json!("caffe");
    let config = parse(&raw).unwrap();
    assert!(config.experiment.executor.framework.is_unknown());

    let err = Runner::new(config).unwrap_err();
    assert!(matches!(err, QuarkError::Unsupported(_)));
    assert!(err.to_string().contains("UNKNOWN"));
}

/// Categorical fields decode by tag or name in any case
#[test]
fn test_case_insensitive_decoding() {
    for text in ["torch", "TORCH", "Torch"] {
        let value = categorical::decode(Domain::Framework, text);
        assert!(value.is("torch"));
        assert_eq!(value.name(), "TORCH");
    }
    assert!(categorical::decode(Domain::Device, "Cpu").is("cpu"));
}

/// Registering a taken name or tag fails and leaves the registry unchanged
#[test]
fn test_duplicate_registration_rejected() {
    let added = categorical::register(Domain::Operator, "SOFTMAX_IT", "softmax_it").unwrap();
    assert!(added.is("softmax_it"));

    let err = categorical::register(Domain::Operator, "softmax_it", "other_it").unwrap_err();
    assert_eq!(err.conflict, "name");
    let err = categorical::register(Domain::Operator, "OTHER_IT", "SOFTMAX_IT").unwrap_err();
    assert_eq!(err.conflict, "tag");
    assert!(categorical::find(Domain::Operator, "other_it").is_none());
}
