//! Component interfaces.
//!
//! Each role is a trait object owned by one [`crate::Runner`]. Every
//! component reports its own consistency through `validate`, which the
//! runner checks before the first timed call.

use quark_config::WorkloadKind;
use quark_core::{Batch, Result, Tensor};

/// Whether a forward pass feeds a backward pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    /// No activations are kept
    Inference,
    /// Activations are cached for `backward`
    Training,
}

/// Something that maps an input batch to an output tensor
pub trait Workload {
    /// Build from a workload shape and the per-sample input shape
    fn load(kind: &WorkloadKind, sample_shape: &[usize]) -> Result<Self>
    where
        Self: Sized;

    /// Short identifier for logs
    fn describe(&self) -> String;

    /// Internal consistency check
    fn validate(&self) -> Result<()>;

    /// Forward pass over `[batch, ...sample_shape]`
    fn forward(&mut self, inputs: &Tensor, pass: Pass) -> Result<Tensor>;

    /// Backpropagate the gradient of the loss w.r.t. the last output
    fn backward(&mut self, grad_output: &Tensor) -> Result<()>;

    /// Apply accumulated gradients and reset them
    fn apply_gradients(&mut self, learning_rate: f32);
}

/// Runs one observation: pull a batch, dispatch it under the run mode
pub trait ExecutorBackend {
    /// Short identifier for logs
    fn describe(&self) -> String;

    /// Internal consistency check
    fn validate(&self) -> Result<()>;

    /// One forward pass (and in training, one backward pass and optimizer step)
    fn execute(
        &mut self,
        workload: &mut dyn Workload,
        data: &mut dyn DataProvider,
    ) -> Result<Tensor>;
}

/// Source of input batches
pub trait DataProvider {
    /// Short identifier for logs
    fn describe(&self) -> String;

    /// Internal consistency check
    fn validate(&self) -> Result<()>;

    /// Next batch; finite sources fail with [`quark_core::ExhaustedError`]
    fn next_batch(&mut self) -> Result<Batch>;

    /// Samples per full batch
    fn batch_size(&self) -> usize;

    /// Per-sample shape of `inputs`
    fn sample_shape(&self) -> &[usize];
}
