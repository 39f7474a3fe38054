//! Native workloads: operator chains and proxy model topologies.

use super::layers::{BatchNorm, Conv2d, Dropout, Layer, Linear, Pool, PoolKind, Relu, Residual, Sequential};
use crate::component::{Pass, Workload};
use quark_config::WorkloadKind;
use quark_core::{CategoricalValue, QuarkError, Result, Tensor, tags};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Seed for weight initialisation; runs of the same task see the same weights
pub const WEIGHT_SEED: u64 = 0x5eed;

/// Output channels of the `conv2d` operator
pub const CONV2D_CHANNELS: usize = 64;
/// Output features of the `fully_connected` operator
pub const FULLY_CONNECTED_FEATURES: usize = 1000;
/// Drop probability of the `dropout` operator
pub const DROPOUT_P: f32 = 0.5;
/// Models run on inputs pooled down to this edge length
pub const MODEL_INPUT_EDGE: usize = 32;
/// Classes predicted by the model heads
pub const MODEL_CLASSES: usize = 10;

/// Appends layers while tracking the current per-sample shape
pub struct NetBuilder {
    net: Sequential,
    rng: StdRng,
}

impl NetBuilder {
    /// Start from a per-sample input shape
    pub fn new(input_shape: &[usize], seed: u64) -> Self {
        Self {
            net: Sequential::new(input_shape),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Current per-sample output shape
    pub fn shape(&self) -> Vec<usize> {
        self.net.output_shape().to_vec()
    }

    fn push(&mut self, layer: impl Layer + 'static) -> Result<&mut Self> {
        self.net.push(Box::new(layer))?;
        Ok(self)
    }

    /// `out`×`k`×`k` convolution
    pub fn conv(&mut self, out: usize, k: usize, stride: usize, pad: usize) -> Result<&mut Self> {
        let layer = Conv2d::new(&self.shape(), out, k, stride, pad, 1, &mut self.rng)?;
        self.push(layer)
    }

    /// Depthwise `k`×`k` convolution
    pub fn depthwise(&mut self, k: usize, stride: usize, pad: usize) -> Result<&mut Self> {
        let channels = self.shape()[0];
        let layer = Conv2d::new(&self.shape(), channels, k, stride, pad, channels, &mut self.rng)?;
        self.push(layer)
    }

    /// Fully connected projection
    pub fn linear(&mut self, out: usize) -> Result<&mut Self> {
        let layer = Linear::new(&self.shape(), out, &mut self.rng)?;
        self.push(layer)
    }

    /// ReLU
    pub fn relu(&mut self) -> Result<&mut Self> {
        let layer = Relu::new(&self.shape());
        self.push(layer)
    }

    /// Batch normalisation over the leading dimension
    pub fn batch_norm(&mut self) -> Result<&mut Self> {
        let layer = BatchNorm::new(&self.shape())?;
        self.push(layer)
    }

    /// 2×2 stride-2 pooling
    pub fn pool(&mut self, kind: PoolKind) -> Result<&mut Self> {
        let layer = Pool::new(&self.shape(), kind, 2, 2)?;
        self.push(layer)
    }

    /// Adaptive average pooling to `h`×`w`
    pub fn adaptive_avg(&mut self, h: usize, w: usize) -> Result<&mut Self> {
        let layer = Pool::adaptive(&self.shape(), PoolKind::Avg, h, w)?;
        self.push(layer)
    }

    /// Dropout with probability `p`
    pub fn dropout(&mut self, p: f32) -> Result<&mut Self> {
        let seed = self.rng.gen();
        let layer = Dropout::new(&self.shape(), p, seed)?;
        self.push(layer)
    }

    /// Shape-preserving residual block built by `body`
    pub fn residual(
        &mut self,
        body: impl FnOnce(&mut NetBuilder) -> Result<()>,
    ) -> Result<&mut Self> {
        let mut inner = NetBuilder::new(&self.shape(), self.rng.gen());
        body(&mut inner)?;
        let layer = Residual::new(inner.finish())?;
        self.push(layer)
    }

    /// The assembled network
    pub fn finish(self) -> Sequential {
        self.net
    }
}

/// Append one operator with its fixed benchmark parameters
fn push_operator(b: &mut NetBuilder, op: &CategoricalValue) -> Result<()> {
    match op.tag() {
        tags::CONV2D => b.conv(CONV2D_CHANNELS, 3, 1, 1)?,
        tags::FULLY_CONNECTED => b.linear(FULLY_CONNECTED_FEATURES)?,
        tags::RELU => b.relu()?,
        tags::BATCH_NORM => b.batch_norm()?,
        tags::MAX_POOL => b.pool(PoolKind::Max)?,
        tags::AVG_POOL => b.pool(PoolKind::Avg)?,
        tags::DROPOUT => b.dropout(DROPOUT_P)?,
        _ => return Err(QuarkError::unsupported("workload.operator", op)),
    };
    Ok(())
}

/// Channel-preserving basic block: conv-bn-relu-conv-bn, plus skip, then relu
fn basic_block(b: &mut NetBuilder) -> Result<&mut NetBuilder> {
    let c = b.shape()[0];
    b.residual(|r| {
        r.conv(c, 3, 1, 1)?.batch_norm()?.relu()?;
        r.conv(c, 3, 1, 1)?.batch_norm()?;
        Ok(())
    })?
    .relu()
}

fn resnet(b: &mut NetBuilder, stages: &[(usize, usize)]) -> Result<()> {
    b.conv(16, 3, 1, 1)?.batch_norm()?.relu()?;
    for (i, &(channels, blocks)) in stages.iter().enumerate() {
        if i > 0 {
            b.conv(channels, 3, 2, 1)?.batch_norm()?.relu()?;
        }
        for _ in 0..blocks {
            basic_block(b)?;
        }
    }
    b.adaptive_avg(1, 1)?.linear(MODEL_CLASSES)?;
    Ok(())
}

/// Append a proxy topology for `model`
fn push_model(b: &mut NetBuilder, model: &CategoricalValue) -> Result<()> {
    let shape = b.shape();
    if shape.len() != 3 {
        return Err(QuarkError::Shape {
            context: format!("model {} expects a [channels, height, width] sample", model.tag()),
            expected: vec![3, MODEL_INPUT_EDGE, MODEL_INPUT_EDGE],
            actual: shape,
        });
    }
    if shape[1] > MODEL_INPUT_EDGE || shape[2] > MODEL_INPUT_EDGE {
        b.adaptive_avg(MODEL_INPUT_EDGE.min(shape[1]), MODEL_INPUT_EDGE.min(shape[2]))?;
    }

    match model.tag() {
        tags::ALEXNET => {
            b.conv(16, 5, 1, 2)?.relu()?.pool(PoolKind::Max)?;
            b.conv(32, 3, 1, 1)?.relu()?.pool(PoolKind::Max)?;
            b.conv(32, 3, 1, 1)?.relu()?.pool(PoolKind::Max)?;
            b.linear(128)?.relu()?.dropout(DROPOUT_P)?.linear(MODEL_CLASSES)?;
        }
        tags::VGG16 => {
            for channels in [16, 32, 64] {
                b.conv(channels, 3, 1, 1)?.relu()?;
                b.conv(channels, 3, 1, 1)?.relu()?;
                b.pool(PoolKind::Max)?;
            }
            b.linear(128)?.relu()?.dropout(DROPOUT_P)?.linear(MODEL_CLASSES)?;
        }
        tags::RESNET18 => resnet(b, &[(16, 2), (32, 2)])?,
        tags::RESNET50 => resnet(b, &[(16, 3), (32, 4)])?,
        tags::RESNET152 => resnet(b, &[(16, 3), (32, 8)])?,
        tags::MOBILENET => {
            b.conv(16, 3, 2, 1)?.batch_norm()?.relu()?;
            for (channels, stride) in [(32, 1), (64, 2), (64, 1)] {
                b.depthwise(3, stride, 1)?.batch_norm()?.relu()?;
                b.conv(channels, 1, 1, 0)?.batch_norm()?.relu()?;
            }
            b.adaptive_avg(1, 1)?.linear(MODEL_CLASSES)?;
        }
        _ => return Err(QuarkError::unsupported("workload.model", model)),
    }
    Ok(())
}

/// Workload backed by a native [`Sequential`] network
pub struct NativeWorkload {
    description: String,
    network: Sequential,
}

impl NativeWorkload {
    /// The underlying network
    pub fn network(&self) -> &Sequential {
        &self.network
    }
}

impl Workload for NativeWorkload {
    fn load(kind: &WorkloadKind, sample_shape: &[usize]) -> Result<Self> {
        let mut builder = NetBuilder::new(sample_shape, WEIGHT_SEED);
        match kind {
            WorkloadKind::Operator(op) => push_operator(&mut builder, op)?,
            WorkloadKind::FusedOperator(ops) => {
                for op in ops {
                    push_operator(&mut builder, op)?;
                }
            }
            WorkloadKind::Model(model) => push_model(&mut builder, model)?,
        }
        let network = builder.finish();
        tracing::debug!(
            workload = %kind.describe(),
            layers = network.len(),
            parameters = network.parameters(),
            output = ?network.output_shape(),
            "native workload loaded"
        );
        Ok(Self {
            description: kind.describe(),
            network,
        })
    }

    fn describe(&self) -> String {
        format!("native:{}", self.description)
    }

    fn validate(&self) -> Result<()> {
        if self.network.is_empty() {
            return Err(QuarkError::invalid("workload", "network has no layers"));
        }
        if self.network.output_shape().iter().any(|&d| d == 0) {
            return Err(QuarkError::invalid(
                "workload",
                format!("degenerate output shape {:?}", self.network.output_shape()),
            ));
        }
        Ok(())
    }

    fn forward(&mut self, inputs: &Tensor, pass: Pass) -> Result<Tensor> {
        self.network.forward(inputs, pass == Pass::Training)
    }

    fn backward(&mut self, grad_output: &Tensor) -> Result<()> {
        self.network.backward(grad_output).map(drop)
    }

    fn apply_gradients(&mut self, learning_rate: f32) {
        self.network.step(learning_rate);
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
    fn test_operator_shapes() {
        let cases = [
            (tags::CONV2D, vec![64, 8, 8]),
            (tags::FULLY_CONNECTED, vec![1000]),
            (tags::RELU, vec![3, 8, 8]),
            (tags::BATCH_NORM, vec![3, 8, 8]),
            (tags::MAX_POOL, vec![3, 4, 4]),
            (tags::AVG_POOL, vec![3, 4, 4]),
            (tags::DROPOUT, vec![3, 8, 8]),
        ];
        for (tag, expected) in cases {
            let kind = WorkloadKind::Operator(value(Domain::Operator, tag));
            let w = NativeWorkload::load(&kind, &[3, 8, 8]).unwrap();
            assert_eq!(w.network().output_shape(), expected.as_slice(), "{tag}");
            w.validate().unwrap();
        }
    }

    #[test]
    fn test_fused_chain() {
        let ops = ["conv2d", "batch_norm", "relu", "max_pool"]
            .iter()
            .map(|t| value(Domain::Operator, t))
            .collect();
        let w = NativeWorkload::load(&WorkloadKind::FusedOperator(ops), &[3, 16, 16]).unwrap();
        assert_eq!(w.network().names(), ["conv2d", "batch_norm", "relu", "max_pool"]);
        assert_eq!(w.network().output_shape(), &[64, 8, 8]);
        assert_eq!(w.describe(), "native:conv2d+batch_norm+relu+max_pool");
    }

    #[test]
    fn test_models_produce_class_scores() {
        for tag in ["alexnet", "vgg16", "resnet18", "resnet50", "resnet152", "mobilenet"] {
            let kind = WorkloadKind::Model(value(Domain::Model, tag));
            let mut w = NativeWorkload::load(&kind, &[3, 64, 64]).unwrap();
            assert_eq!(w.network().output_shape(), &[MODEL_CLASSES], "{tag}");
            let y = w.forward(&Tensor::zeros(&[1, 3, 64, 64]), Pass::Inference).unwrap();
            assert_eq!(y.shape(), &[1, MODEL_CLASSES]);
        }
    }

    #[test]
    fn test_bert_and_unknown_are_unsupported() {
        for tag in ["bert", "gpt"] {
            let kind = WorkloadKind::Model(value(Domain::Model, tag));
            assert!(matches!(
                NativeWorkload::load(&kind, &[3, 32, 32]),
                Err(QuarkError::Unsupported(_))
            ));
        }
    }

    #[test]
    fn test_conv_needs_spatial_input() {
        let kind = WorkloadKind::Operator(value(Domain::Operator, "conv2d"));
        assert!(matches!(
            NativeWorkload::load(&kind, &[128]),
            Err(QuarkError::Shape { .. })
        ));
    }

    #[test]
    fn test_training_step_changes_output() {
        let kind = WorkloadKind::Operator(value(Domain::Operator, "fully_connected"));
        let mut w = NativeWorkload::load(&kind, &[4]).unwrap();
        let x = Tensor::from_vec(vec![1, 4], vec![1.0, 0.5, -0.5, 2.0]).unwrap();
        let before = w.forward(&x, Pass::Training).unwrap();
        w.backward(&before).unwrap();
        w.apply_gradients(0.1);
        let after = w.forward(&x, Pass::Inference).unwrap();
        assert_ne!(before, after);
    }
}
