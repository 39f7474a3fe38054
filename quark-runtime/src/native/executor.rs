//! Native executor.

use crate::LEARNING_RATE;
use crate::component::{DataProvider, ExecutorBackend, Pass, Workload};
use quark_core::{CategoricalValue, QuarkError, Result, Tensor, tags};

/// Runs workloads on the host CPU
#[derive(Debug)]
pub struct NativeExecutor {
    pass: Pass,
    device: CategoricalValue,
    learning_rate: f32,
    steps: u64,
}

impl NativeExecutor {
    /// Accepts device `cpu` and run modes `inference` / `training`
    pub fn new(run_mode: &CategoricalValue, device: &CategoricalValue) -> Result<Self> {
        if !device.is(tags::CPU) {
            return Err(QuarkError::unsupported("experiment.executor.device", device));
        }
        let pass = match run_mode.tag() {
            tags::INFERENCE => Pass::Inference,
            tags::TRAINING => Pass::Training,
            _ => return Err(QuarkError::unsupported("experiment.run_mode", run_mode)),
        };
        Ok(Self {
            pass,
            device: device.clone(),
            learning_rate: LEARNING_RATE,
            steps: 0,
        })
    }

    /// Forward/backward passes performed so far
    pub fn steps(&self) -> u64 {
        self.steps
    }
}

/// Softmax cross-entropy gradient when `output` is `[batch, classes]` and
/// every label is a class index; otherwise the gradient of `0.5 * mean(y^2)`
pub fn loss_gradient(output: &Tensor, labels: &[usize]) -> Tensor {
    let mut grad = output.clone();
    match *output.shape() {
        [batch, classes] if batch == labels.len() && labels.iter().all(|&l| l < classes) => {
            let scale = 1.0 / batch as f32;
            for (row, &label) in grad.data_mut().chunks_mut(classes).zip(labels) {
                let max = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
                let mut sum = 0.0;
                for v in row.iter_mut() {
                    *v = (*v - max).exp();
                    sum += *v;
                }
                for v in row.iter_mut() {
                    *v = *v / sum * scale;
                }
                row[label] -= scale;
            }
        }
        _ => {
            let scale = 1.0 / output.len().max(1) as f32;
            for v in grad.data_mut() {
                *v *= scale;
            }
        }
    }
    grad
}

impl ExecutorBackend for NativeExecutor {
    fn describe(&self) -> String {
        format!("native:{} ({:?})", self.device, self.pass)
    }

    fn validate(&self) -> Result<()> {
        if !(self.learning_rate > 0.0) {
            return Err(QuarkError::invalid("executor", "learning rate must be positive"));
        }
        Ok(())
    }

    fn execute(
        &mut self,
        workload: &mut dyn Workload,
        data: &mut dyn DataProvider,
    ) -> Result<Tensor> {
        let batch = data.next_batch()?;
        let output = workload.forward(&batch.inputs, self.pass)?;
        if self.pass == Pass::Training {
            let grad = loss_gradient(&output, &batch.labels);
            workload.backward(&grad)?;
            workload.apply_gradients(self.learning_rate);
        }
        self.steps += 1;
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quark_core::{CategoricalRegistry, Domain};

    fn value(domain: Domain, tag: &str) -> CategoricalValue {
        CategoricalRegistry::with_builtins().decode(domain, tag)
    }

    #[test]
    fn test_rejects_non_cpu_devices() {
        let training = value(Domain::RunMode, "training");
        for device in ["gpu", "tpu", "abacus"] {
            let err = NativeExecutor::new(&training, &value(Domain::Device, device)).unwrap_err();
            assert!(matches!(err, QuarkError::Unsupported(ref e) if e.field == "experiment.executor.device"));
        }
    }

    #[test]
    fn test_rejects_unknown_run_mode() {
        let err = NativeExecutor::new(&value(Domain::RunMode, "finetune"), &value(Domain::Device, "cpu"))
            .unwrap_err();
        assert!(matches!(err, QuarkError::Unsupported(ref e) if e.name == "UNKNOWN"));
    }

    #[test]
    fn test_cross_entropy_gradient_rows_sum_to_zero() {
        let out = Tensor::from_vec(vec![2, 3], vec![1.0, 2.0, 3.0, 0.0, 0.0, 0.0]).unwrap();
        let grad = loss_gradient(&out, &[2, 0]);
        for row in grad.data().chunks(3) {
            assert!(row.iter().sum::<f32>().abs() < 1e-6);
        }
        assert!(grad.data()[2] < 0.0);
        assert!(grad.data()[3] < 0.0);
    }

    #[test]
    fn test_surrogate_gradient_for_feature_maps() {
        let out = Tensor::from_vec(vec![1, 2, 2], vec![4.0, -4.0, 2.0, 0.0]).unwrap();
        let grad = loss_gradient(&out, &[7]);
        assert_eq!(grad.data(), &[1.0, -1.0, 0.5, 0.0]);
    }
}
