//! Native Reference Backend
//!
//! Framework tag `native`: plain-Rust CPU kernels, small proxy models and
//! dataset readers. Numerics are simple; timing behaviour is what matters.

mod data;
mod executor;
pub mod layers;
mod workload;

pub use data::{
    CIFAR10_SHAPE, Cifar10Reader, MNIST_SHAPE, MnistReader, SYNTHETIC_CLASSES, SyntheticProvider,
};
pub use executor::{NativeExecutor, loss_gradient};
pub use workload::{NativeWorkload, NetBuilder, WEIGHT_SEED};

use crate::component::{DataProvider, ExecutorBackend, Workload};
use quark_config::BenchmarkConfig;
use quark_core::{QuarkError, Result, tags};

/// Per-sample input shape declared by the dataset section
pub(crate) fn sample_shape(config: &BenchmarkConfig) -> Result<Vec<usize>> {
    config
        .dataset
        .input_shape()
        .ok_or_else(|| QuarkError::unsupported("dataset.source", config.dataset.source()))
}

/// Native workload for `config.workload`
pub fn workload(config: &BenchmarkConfig) -> Result<Box<dyn Workload>> {
    let shape = sample_shape(config)?;
    Ok(Box::new(NativeWorkload::load(&config.workload.kind, &shape)?))
}

/// Native executor for `config.experiment`
pub fn executor(config: &BenchmarkConfig) -> Result<Box<dyn ExecutorBackend>> {
    let experiment = &config.experiment;
    Ok(Box::new(NativeExecutor::new(
        &experiment.run_mode,
        &experiment.executor.device,
    )?))
}

/// Native data provider for `config.dataset`
pub fn data_provider(config: &BenchmarkConfig) -> Result<Box<dyn DataProvider>> {
    let dataset = &config.dataset;
    if !dataset.dtype().is(tags::FLOAT32) {
        return Err(QuarkError::unsupported("dataset.dtype", dataset.dtype()));
    }
    let batch_size = dataset.batch_size();
    let source = dataset.source();
    match source.tag() {
        tags::SYNTHETIC => Ok(Box::new(SyntheticProvider::new(
            sample_shape(config)?,
            batch_size,
            dataset.seed(),
        ))),
        tags::CIFAR10 => Ok(Box::new(Cifar10Reader::open(&dataset.root(), batch_size)?)),
        tags::MNIST => Ok(Box::new(MnistReader::open(&dataset.root(), batch_size)?)),
        _ => Err(QuarkError::unsupported("dataset.source", source)),
    }
}
