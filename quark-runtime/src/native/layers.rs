//! Layers
//!
//! Naive CPU kernels over `[batch, ...sample]` tensors. Every layer knows its
//! per-sample input and output shapes at construction, caches what its
//! backward pass needs only during a training forward pass, and accumulates
//! parameter gradients until `step`.

use quark_core::{QuarkError, Result, Tensor};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// One differentiable stage of a network
pub trait Layer {
    /// Kernel name for logs and errors
    fn name(&self) -> &'static str;
    /// Per-sample input shape
    fn input_shape(&self) -> &[usize];
    /// Per-sample output shape
    fn output_shape(&self) -> &[usize];
    /// Forward pass; caches activations when `train`
    fn forward(&mut self, input: &Tensor, train: bool) -> Result<Tensor>;
    /// Gradient w.r.t. the input, accumulating parameter gradients
    fn backward(&mut self, grad_output: &Tensor) -> Result<Tensor>;
    /// SGD update from accumulated gradients, then clear them
    fn step(&mut self, _learning_rate: f32) {}
    /// Number of trainable parameters
    fn parameters(&self) -> usize {
        0
    }
}

fn check_input(layer: &str, expected: &[usize], input: &Tensor) -> Result<usize> {
    let shape = input.shape();
    if shape.len() != expected.len() + 1 || &shape[1..] != expected {
        let mut want = vec![shape.first().copied().unwrap_or(0)];
        want.extend_from_slice(expected);
        return Err(QuarkError::Shape {
            context: format!("{layer} input"),
            expected: want,
            actual: shape.to_vec(),
        });
    }
    Ok(shape[0])
}

fn no_cache(layer: &str) -> QuarkError {
    QuarkError::invalid(
        "workload",
        format!("{layer}: backward called without a training forward pass"),
    )
}

fn spatial(layer: &str, shape: &[usize]) -> Result<(usize, usize, usize)> {
    match *shape {
        [c, h, w] => Ok((c, h, w)),
        _ => Err(QuarkError::Shape {
            context: format!("{layer} expects a [channels, height, width] sample"),
            expected: vec![0, 0, 0],
            actual: shape.to_vec(),
        }),
    }
}

fn uniform(rng: &mut StdRng, len: usize, fan_in: usize) -> Vec<f32> {
    let bound = (6.0 / fan_in.max(1) as f32).sqrt();
    (0..len).map(|_| rng.gen_range(-bound..bound)).collect()
}

fn sgd(params: &mut [f32], grads: &mut [f32], lr: f32) {
    for (p, g) in params.iter_mut().zip(grads.iter_mut()) {
        *p -= lr * *g;
        *g = 0.0;
    }
}

// ─── Conv2d ──────────────────────────────────────────────────────────────────

/// 2-D convolution with optional channel groups (depthwise when groups == channels)
pub struct Conv2d {
    input_shape: Vec<usize>,
    output_shape: Vec<usize>,
    out_channels: usize,
    kernel: usize,
    stride: usize,
    padding: usize,
    groups: usize,
    weight: Vec<f32>,
    bias: Vec<f32>,
    grad_weight: Vec<f32>,
    grad_bias: Vec<f32>,
    cache: Option<Tensor>,
}

impl Conv2d {
    /// Convolution over a `[C, H, W]` sample
    pub fn new(
        input_shape: &[usize],
        out_channels: usize,
        kernel: usize,
        stride: usize,
        padding: usize,
        groups: usize,
        rng: &mut StdRng,
    ) -> Result<Self> {
        let (c, h, w) = spatial("conv2d", input_shape)?;
        if groups == 0 || c % groups != 0 || out_channels % groups != 0 {
            return Err(QuarkError::invalid(
                "workload",
                format!("conv2d: {groups} groups do not divide {c} -> {out_channels} channels"),
            ));
        }
        if stride == 0 || kernel == 0 || h + 2 * padding < kernel || w + 2 * padding < kernel {
            return Err(QuarkError::Shape {
                context: format!("conv2d {kernel}x{kernel} stride {stride} pad {padding}"),
                expected: vec![c, kernel, kernel],
                actual: input_shape.to_vec(),
            });
        }
        let oh = (h + 2 * padding - kernel) / stride + 1;
        let ow = (w + 2 * padding - kernel) / stride + 1;
        let fan_in = (c / groups) * kernel * kernel;
        let weight_len = out_channels * fan_in;
        Ok(Self {
            input_shape: input_shape.to_vec(),
            output_shape: vec![out_channels, oh, ow],
            out_channels,
            kernel,
            stride,
            padding,
            groups,
            weight: uniform(rng, weight_len, fan_in),
            bias: vec![0.0; out_channels],
            grad_weight: vec![0.0; weight_len],
            grad_bias: vec![0.0; out_channels],
            cache: None,
        })
    }

    /// Visit every (output, input, weight) index triple that contributes
    fn for_each_tap(&self, batch: usize, mut f: impl FnMut(usize, usize, usize)) {
        let (c, h, w) = (self.input_shape[0], self.input_shape[1], self.input_shape[2]);
        let (oh, ow) = (self.output_shape[1], self.output_shape[2]);
        let cin_g = c / self.groups;
        let cout_g = self.out_channels / self.groups;
        let k = self.kernel;
        for n in 0..batch {
            for oc in 0..self.out_channels {
                let g = oc / cout_g;
                for oy in 0..oh {
                    for ox in 0..ow {
                        let out_idx = ((n * self.out_channels + oc) * oh + oy) * ow + ox;
                        for icg in 0..cin_g {
                            let ic = g * cin_g + icg;
                            for ky in 0..k {
                                let iy = oy * self.stride + ky;
                                if iy < self.padding || iy - self.padding >= h {
                                    continue;
                                }
                                let iy = iy - self.padding;
                                for kx in 0..k {
                                    let ix = ox * self.stride + kx;
                                    if ix < self.padding || ix - self.padding >= w {
                                        continue;
                                    }
                                    let ix = ix - self.padding;
                                    let in_idx = ((n * c + ic) * h + iy) * w + ix;
                                    let w_idx = ((oc * cin_g + icg) * k + ky) * k + kx;
                                    f(out_idx, in_idx, w_idx);
                                }
                            }
                        }
                    }
                }
            }
        }
    }
}

impl Layer for Conv2d {
    fn name(&self) -> &'static str {
        if self.groups > 1 { "depthwise_conv2d" } else { "conv2d" }
    }

    fn input_shape(&self) -> &[usize] {
        &self.input_shape
    }

    fn output_shape(&self) -> &[usize] {
        &self.output_shape
    }

    fn forward(&mut self, input: &Tensor, train: bool) -> Result<Tensor> {
        let batch = check_input(self.name(), &self.input_shape, input)?;
        let mut shape = vec![batch];
        shape.extend_from_slice(&self.output_shape);
        let mut out = Tensor::zeros(&shape);
        let plane = self.output_shape[1] * self.output_shape[2];
        for (i, v) in out.data_mut().iter_mut().enumerate() {
            *v = self.bias[(i / plane) % self.out_channels];
        }
        {
            let x = input.data();
            let y = out.data_mut();
            self.for_each_tap(batch, |o, i, w| y[o] += self.weight[w] * x[i]);
        }
        self.cache = train.then(|| input.clone());
        Ok(out)
    }

    fn backward(&mut self, grad_output: &Tensor) -> Result<Tensor> {
        let input = self.cache.take().ok_or_else(|| no_cache(self.name()))?;
        let batch = check_input(self.name(), &self.output_shape, grad_output)?;
        let mut grad_input = Tensor::zeros(input.shape());
        let plane = self.output_shape[1] * self.output_shape[2];
        for (i, g) in grad_output.data().iter().enumerate() {
            self.grad_bias[(i / plane) % self.out_channels] += g;
        }
        let mut grad_weight = std::mem::take(&mut self.grad_weight);
        {
            let x = input.data();
            let gy = grad_output.data();
            let gx = grad_input.data_mut();
            self.for_each_tap(batch, |o, i, w| {
                grad_weight[w] += gy[o] * x[i];
                gx[i] += gy[o] * self.weight[w];
            });
        }
        self.grad_weight = grad_weight;
        Ok(grad_input)
    }

    fn step(&mut self, lr: f32) {
        sgd(&mut self.weight, &mut self.grad_weight, lr);
        sgd(&mut self.bias, &mut self.grad_bias, lr);
    }

    fn parameters(&self) -> usize {
        self.weight.len() + self.bias.len()
    }
}

// ─── Linear ──────────────────────────────────────────────────────────────────

/// Fully connected layer; flattens any sample shape
pub struct Linear {
    input_shape: Vec<usize>,
    output_shape: Vec<usize>,
    in_features: usize,
    out_features: usize,
    weight: Vec<f32>,
    bias: Vec<f32>,
    grad_weight: Vec<f32>,
    grad_bias: Vec<f32>,
    cache: Option<Tensor>,
}

impl Linear {
    /// Dense projection of the flattened sample to `out_features`
    pub fn new(input_shape: &[usize], out_features: usize, rng: &mut StdRng) -> Result<Self> {
        let in_features: usize = input_shape.iter().product();
        if in_features == 0 || out_features == 0 {
            return Err(QuarkError::invalid(
                "workload",
                format!("fully_connected: {in_features} -> {out_features} features"),
            ));
        }
        Ok(Self {
            input_shape: input_shape.to_vec(),
            output_shape: vec![out_features],
            in_features,
            out_features,
            weight: uniform(rng, in_features * out_features, in_features),
            bias: vec![0.0; out_features],
            grad_weight: vec![0.0; in_features * out_features],
            grad_bias: vec![0.0; out_features],
            cache: None,
        })
    }
}

impl Layer for Linear {
    fn name(&self) -> &'static str {
        "fully_connected"
    }

    fn input_shape(&self) -> &[usize] {
        &self.input_shape
    }

    fn output_shape(&self) -> &[usize] {
        &self.output_shape
    }

    fn forward(&mut self, input: &Tensor, train: bool) -> Result<Tensor> {
        let batch = check_input(self.name(), &self.input_shape, input)?;
        let x = input.data();
        let mut out = vec![0.0f32; batch * self.out_features];
        for n in 0..batch {
            let row = &x[n * self.in_features..(n + 1) * self.in_features];
            for o in 0..self.out_features {
                let w = &self.weight[o * self.in_features..(o + 1) * self.in_features];
                let dot: f32 = row.iter().zip(w).map(|(a, b)| a * b).sum();
                out[n * self.out_features + o] = dot + self.bias[o];
            }
        }
        self.cache = train.then(|| input.clone());
        Tensor::from_vec(vec![batch, self.out_features], out)
    }

    fn backward(&mut self, grad_output: &Tensor) -> Result<Tensor> {
        let input = self.cache.take().ok_or_else(|| no_cache(self.name()))?;
        let batch = check_input(self.name(), &self.output_shape, grad_output)?;
        let x = input.data();
        let gy = grad_output.data();
        let mut grad_input = Tensor::zeros(input.shape());
        let gx = grad_input.data_mut();
        for n in 0..batch {
            for o in 0..self.out_features {
                let g = gy[n * self.out_features + o];
                if g == 0.0 {
                    continue;
                }
                self.grad_bias[o] += g;
                let w = &self.weight[o * self.in_features..(o + 1) * self.in_features];
                let gw = &mut self.grad_weight[o * self.in_features..(o + 1) * self.in_features];
                let row = &x[n * self.in_features..(n + 1) * self.in_features];
                let grow = &mut gx[n * self.in_features..(n + 1) * self.in_features];
                for i in 0..self.in_features {
                    gw[i] += g * row[i];
                    grow[i] += g * w[i];
                }
            }
        }
        Ok(grad_input)
    }

    fn step(&mut self, lr: f32) {
        sgd(&mut self.weight, &mut self.grad_weight, lr);
        sgd(&mut self.bias, &mut self.grad_bias, lr);
    }

    fn parameters(&self) -> usize {
        self.weight.len() + self.bias.len()
    }
}

// ─── Activations and regularisation ──────────────────────────────────────────

/// Rectified linear unit
pub struct Relu {
    shape: Vec<usize>,
    mask: Option<Vec<bool>>,
}

impl Relu {
    /// Element-wise `max(0, x)`
    pub fn new(input_shape: &[usize]) -> Self {
        Self {
            shape: input_shape.to_vec(),
            mask: None,
        }
    }
}

impl Layer for Relu {
    fn name(&self) -> &'static str {
        "relu"
    }

    fn input_shape(&self) -> &[usize] {
        &self.shape
    }

    fn output_shape(&self) -> &[usize] {
        &self.shape
    }

    fn forward(&mut self, input: &Tensor, train: bool) -> Result<Tensor> {
        check_input(self.name(), &self.shape, input)?;
        let mut out = input.clone();
        for v in out.data_mut() {
            *v = v.max(0.0);
        }
        self.mask = train.then(|| input.data().iter().map(|&v| v > 0.0).collect());
        Ok(out)
    }

    fn backward(&mut self, grad_output: &Tensor) -> Result<Tensor> {
        let mask = self.mask.take().ok_or_else(|| no_cache(self.name()))?;
        check_input(self.name(), &self.shape, grad_output)?;
        let mut grad = grad_output.clone();
        for (g, keep) in grad.data_mut().iter_mut().zip(mask) {
            if !keep {
                *g = 0.0;
            }
        }
        Ok(grad)
    }
}

/// Inverted dropout; identity outside training
pub struct Dropout {
    shape: Vec<usize>,
    p: f32,
    rng: StdRng,
    mask: Option<Vec<f32>>,
}

impl Dropout {
    /// Zero each element with probability `p`
    pub fn new(input_shape: &[usize], p: f32, seed: u64) -> Result<Self> {
        if !(0.0..1.0).contains(&p) {
            return Err(QuarkError::invalid(
                "workload",
                format!("dropout probability must be in [0, 1), got {p}"),
            ));
        }
        Ok(Self {
            shape: input_shape.to_vec(),
            p,
            rng: StdRng::seed_from_u64(seed),
            mask: None,
        })
    }
}

impl Layer for Dropout {
    fn name(&self) -> &'static str {
        "dropout"
    }

    fn input_shape(&self) -> &[usize] {
        &self.shape
    }

    fn output_shape(&self) -> &[usize] {
        &self.shape
    }

    fn forward(&mut self, input: &Tensor, train: bool) -> Result<Tensor> {
        check_input(self.name(), &self.shape, input)?;
        if !train {
            self.mask = None;
            return Ok(input.clone());
        }
        let scale = 1.0 / (1.0 - self.p);
        let mask: Vec<f32> = (0..input.len())
            .map(|_| if self.rng.gen::<f32>() < self.p { 0.0 } else { scale })
            .collect();
        let mut out = input.clone();
        for (v, m) in out.data_mut().iter_mut().zip(&mask) {
            *v *= m;
        }
        self.mask = Some(mask);
        Ok(out)
    }

    fn backward(&mut self, grad_output: &Tensor) -> Result<Tensor> {
        let mask = self.mask.take().ok_or_else(|| no_cache(self.name()))?;
        let mut grad = grad_output.clone();
        for (g, m) in grad.data_mut().iter_mut().zip(&mask) {
            *g *= m;
        }
        Ok(grad)
    }
}

// ─── Normalisation ───────────────────────────────────────────────────────────

/// Per-channel batch normalisation with running statistics
///
/// The first sample dimension is the channel; the rest are pooled.
pub struct BatchNorm {
    shape: Vec<usize>,
    channels: usize,
    spatial: usize,
    gamma: Vec<f32>,
    beta: Vec<f32>,
    grad_gamma: Vec<f32>,
    grad_beta: Vec<f32>,
    running_mean: Vec<f32>,
    running_var: Vec<f32>,
    cache: Option<(Vec<f32>, Vec<f32>)>,
}

const BN_MOMENTUM: f32 = 0.1;
const BN_EPS: f32 = 1e-5;

impl BatchNorm {
    /// Normalise over the leading sample dimension
    pub fn new(input_shape: &[usize]) -> Result<Self> {
        let Some((&channels, rest)) = input_shape.split_first() else {
            return Err(QuarkError::invalid("workload", "batch_norm: empty sample shape"));
        };
        let spatial = rest.iter().product::<usize>();
        Ok(Self {
            shape: input_shape.to_vec(),
            channels,
            spatial,
            gamma: vec![1.0; channels],
            beta: vec![0.0; channels],
            grad_gamma: vec![0.0; channels],
            grad_beta: vec![0.0; channels],
            running_mean: vec![0.0; channels],
            running_var: vec![1.0; channels],
            cache: None,
        })
    }

    fn index(&self, n: usize, c: usize, s: usize) -> usize {
        (n * self.channels + c) * self.spatial + s
    }
}

impl Layer for BatchNorm {
    fn name(&self) -> &'static str {
        "batch_norm"
    }

    fn input_shape(&self) -> &[usize] {
        &self.shape
    }

    fn output_shape(&self) -> &[usize] {
        &self.shape
    }

    fn forward(&mut self, input: &Tensor, train: bool) -> Result<Tensor> {
        let batch = check_input(self.name(), &self.shape, input)?;
        let x = input.data();
        let m = (batch * self.spatial) as f32;
        let mut out = input.clone();
        let mut x_hat = if train { vec![0.0f32; x.len()] } else { Vec::new() };
        let mut inv_stds = vec![0.0f32; self.channels];

        for c in 0..self.channels {
            let (mean, var) = if train && m > 0.0 {
                let mut sum = 0.0f32;
                for n in 0..batch {
                    for s in 0..self.spatial {
                        sum += x[self.index(n, c, s)];
                    }
                }
                let mean = sum / m;
                let mut sq = 0.0f32;
                for n in 0..batch {
                    for s in 0..self.spatial {
                        sq += (x[self.index(n, c, s)] - mean).powi(2);
                    }
                }
                let var = sq / m;
                self.running_mean[c] = (1.0 - BN_MOMENTUM) * self.running_mean[c] + BN_MOMENTUM * mean;
                self.running_var[c] = (1.0 - BN_MOMENTUM) * self.running_var[c] + BN_MOMENTUM * var;
                (mean, var)
            } else {
                (self.running_mean[c], self.running_var[c])
            };
            let inv_std = 1.0 / (var + BN_EPS).sqrt();
            inv_stds[c] = inv_std;
            for n in 0..batch {
                for s in 0..self.spatial {
                    let idx = self.index(n, c, s);
                    let xh = (x[idx] - mean) * inv_std;
                    if train {
                        x_hat[idx] = xh;
                    }
                    out.data_mut()[idx] = self.gamma[c] * xh + self.beta[c];
                }
            }
        }
        self.cache = train.then_some((x_hat, inv_stds));
        Ok(out)
    }

    fn backward(&mut self, grad_output: &Tensor) -> Result<Tensor> {
        let (x_hat, inv_stds) = self.cache.take().ok_or_else(|| no_cache(self.name()))?;
        let batch = check_input(self.name(), &self.shape, grad_output)?;
        let gy = grad_output.data();
        let m = (batch * self.spatial) as f32;
        let mut grad_input = Tensor::zeros(grad_output.shape());
        for c in 0..self.channels {
            let mut sum_g = 0.0f32;
            let mut sum_gx = 0.0f32;
            for n in 0..batch {
                for s in 0..self.spatial {
                    let idx = self.index(n, c, s);
                    sum_g += gy[idx];
                    sum_gx += gy[idx] * x_hat[idx];
                }
            }
            self.grad_beta[c] += sum_g;
            self.grad_gamma[c] += sum_gx;
            let scale = self.gamma[c] * inv_stds[c] / m;
            for n in 0..batch {
                for s in 0..self.spatial {
                    let idx = self.index(n, c, s);
                    grad_input.data_mut()[idx] =
                        scale * (m * gy[idx] - sum_g - x_hat[idx] * sum_gx);
                }
            }
        }
        Ok(grad_input)
    }

    fn step(&mut self, lr: f32) {
        sgd(&mut self.gamma, &mut self.grad_gamma, lr);
        sgd(&mut self.beta, &mut self.grad_beta, lr);
    }

    fn parameters(&self) -> usize {
        2 * self.channels
    }
}

// ─── Pooling ─────────────────────────────────────────────────────────────────

/// Pooling reduction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolKind {
    /// Maximum over the window
    Max,
    /// Mean over the window
    Avg,
}

/// Window pooling, fixed size or adaptive
///
/// Fixed windows use `kernel`/`stride`; adaptive pooling maps each output
/// cell to the input range `[floor(i*H/oh), ceil((i+1)*H/oh))`.
pub struct Pool {
    kind: PoolKind,
    adaptive: bool,
    input_shape: Vec<usize>,
    output_shape: Vec<usize>,
    kernel: usize,
    stride: usize,
    argmax: Option<Vec<usize>>,
    trained: bool,
}

impl Pool {
    /// `kernel`×`kernel` window moved by `stride`
    pub fn new(input_shape: &[usize], kind: PoolKind, kernel: usize, stride: usize) -> Result<Self> {
        let (c, h, w) = spatial(kind.name(), input_shape)?;
        if kernel == 0 || stride == 0 || h < kernel || w < kernel {
            return Err(QuarkError::Shape {
                context: format!("{} {kernel}x{kernel} window", kind.name()),
                expected: vec![c, kernel, kernel],
                actual: input_shape.to_vec(),
            });
        }
        Ok(Self {
            kind,
            adaptive: false,
            input_shape: input_shape.to_vec(),
            output_shape: vec![c, (h - kernel) / stride + 1, (w - kernel) / stride + 1],
            kernel,
            stride,
            argmax: None,
            trained: false,
        })
    }

    /// Pool to a fixed `out_h`×`out_w` grid
    pub fn adaptive(input_shape: &[usize], kind: PoolKind, out_h: usize, out_w: usize) -> Result<Self> {
        let (c, _, _) = spatial(kind.name(), input_shape)?;
        if out_h == 0 || out_w == 0 {
            return Err(QuarkError::invalid("workload", "adaptive pool to an empty grid"));
        }
        Ok(Self {
            kind,
            adaptive: true,
            input_shape: input_shape.to_vec(),
            output_shape: vec![c, out_h, out_w],
            kernel: 0,
            stride: 0,
            argmax: None,
            trained: false,
        })
    }

    fn window(&self, o: usize, len: usize, out_len: usize) -> (usize, usize) {
        if self.adaptive {
            let start = o * len / out_len;
            let end = ((o + 1) * len).div_ceil(out_len);
            (start, end.max(start + 1).min(len))
        } else {
            let start = o * self.stride;
            (start, start + self.kernel)
        }
    }

    fn for_each_window(&self, batch: usize, mut f: impl FnMut(usize, &[usize])) {
        let (c, h, w) = (self.input_shape[0], self.input_shape[1], self.input_shape[2]);
        let (oh, ow) = (self.output_shape[1], self.output_shape[2]);
        let mut taps = Vec::new();
        for n in 0..batch {
            for ch in 0..c {
                let base = (n * c + ch) * h * w;
                for oy in 0..oh {
                    let (y0, y1) = self.window(oy, h, oh);
                    for ox in 0..ow {
                        let (x0, x1) = self.window(ox, w, ow);
                        taps.clear();
                        for y in y0..y1 {
                            for x in x0..x1 {
                                taps.push(base + y * w + x);
                            }
                        }
                        let out_idx = ((n * c + ch) * oh + oy) * ow + ox;
                        f(out_idx, &taps);
                    }
                }
            }
        }
    }
}

impl PoolKind {
    fn name(self) -> &'static str {
        match self {
            PoolKind::Max => "max_pool",
            PoolKind::Avg => "avg_pool",
        }
    }
}

impl Layer for Pool {
    fn name(&self) -> &'static str {
        match (self.kind, self.adaptive) {
            (_, false) => self.kind.name(),
            (PoolKind::Max, true) => "adaptive_max_pool",
            (PoolKind::Avg, true) => "adaptive_avg_pool",
        }
    }

    fn input_shape(&self) -> &[usize] {
        &self.input_shape
    }

    fn output_shape(&self) -> &[usize] {
        &self.output_shape
    }

    fn forward(&mut self, input: &Tensor, train: bool) -> Result<Tensor> {
        let batch = check_input(self.name(), &self.input_shape, input)?;
        let mut shape = vec![batch];
        shape.extend_from_slice(&self.output_shape);
        let mut out = Tensor::zeros(&shape);
        let x = input.data();
        let mut argmax = vec![0usize; out.len()];
        {
            let y = out.data_mut();
            match self.kind {
                PoolKind::Max => self.for_each_window(batch, |o, taps| {
                    let mut best = taps[0];
                    for &t in &taps[1..] {
                        if x[t] > x[best] {
                            best = t;
                        }
                    }
                    argmax[o] = best;
                    y[o] = x[best];
                }),
                PoolKind::Avg => self.for_each_window(batch, |o, taps| {
                    y[o] = taps.iter().map(|&t| x[t]).sum::<f32>() / taps.len() as f32;
                }),
            }
        }
        self.argmax = (train && self.kind == PoolKind::Max).then_some(argmax);
        self.trained = train;
        Ok(out)
    }

    fn backward(&mut self, grad_output: &Tensor) -> Result<Tensor> {
        if !std::mem::take(&mut self.trained) {
            return Err(no_cache(self.name()));
        }
        let batch = check_input(self.name(), &self.output_shape, grad_output)?;
        let mut shape = vec![batch];
        shape.extend_from_slice(&self.input_shape);
        let mut grad_input = Tensor::zeros(&shape);
        let gy = grad_output.data();
        match self.kind {
            PoolKind::Max => {
                let argmax = self.argmax.take().ok_or_else(|| no_cache(self.name()))?;
                let gx = grad_input.data_mut();
                for (o, &i) in argmax.iter().enumerate() {
                    gx[i] += gy[o];
                }
            }
            PoolKind::Avg => {
                let gx = grad_input.data_mut();
                self.for_each_window(batch, |o, taps| {
                    let share = gy[o] / taps.len() as f32;
                    for &t in taps {
                        gx[t] += share;
                    }
                });
            }
        }
        Ok(grad_input)
    }
}

// ─── Composition ─────────────────────────────────────────────────────────────

/// Layers applied in order
pub struct Sequential {
    input_shape: Vec<usize>,
    layers: Vec<Box<dyn Layer>>,
}

impl Sequential {
    /// Empty network over `input_shape`
    pub fn new(input_shape: &[usize]) -> Self {
        Self {
            input_shape: input_shape.to_vec(),
            layers: Vec::new(),
        }
    }

    /// Append a layer whose input matches the current output
    pub fn push(&mut self, layer: Box<dyn Layer>) -> Result<()> {
        if layer.input_shape() != self.output_shape() {
            return Err(QuarkError::Shape {
                context: format!("appending {}", layer.name()),
                expected: self.output_shape().to_vec(),
                actual: layer.input_shape().to_vec(),
            });
        }
        self.layers.push(layer);
        Ok(())
    }

    /// Number of layers
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Whether there are no layers
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Kernel names in order
    pub fn names(&self) -> Vec<&'static str> {
        self.layers.iter().map(|l| l.name()).collect()
    }
}

impl Layer for Sequential {
    fn name(&self) -> &'static str {
        "sequential"
    }

    fn input_shape(&self) -> &[usize] {
        &self.input_shape
    }

    fn output_shape(&self) -> &[usize] {
        self.layers
            .last()
            .map_or(self.input_shape.as_slice(), |l| l.output_shape())
    }

    fn forward(&mut self, input: &Tensor, train: bool) -> Result<Tensor> {
        let mut layers = self.layers.iter_mut();
        let Some(first) = layers.next() else {
            check_input(self.name(), &self.input_shape, input)?;
            return Ok(input.clone());
        };
        let mut x = first.forward(input, train)?;
        for layer in layers {
            x = layer.forward(&x, train)?;
        }
        Ok(x)
    }

    fn backward(&mut self, grad_output: &Tensor) -> Result<Tensor> {
        let mut grad = grad_output.clone();
        for layer in self.layers.iter_mut().rev() {
            grad = layer.backward(&grad)?;
        }
        Ok(grad)
    }

    fn step(&mut self, lr: f32) {
        for layer in &mut self.layers {
            layer.step(lr);
        }
    }

    fn parameters(&self) -> usize {
        self.layers.iter().map(|l| l.parameters()).sum()
    }
}

/// `body(x) + x` with a shape-preserving body
pub struct Residual {
    body: Sequential,
}

impl Residual {
    /// Wrap a body whose output shape equals its input shape
    pub fn new(body: Sequential) -> Result<Self> {
        if body.input_shape() != body.output_shape() {
            return Err(QuarkError::Shape {
                context: "residual body".into(),
                expected: body.input_shape().to_vec(),
                actual: body.output_shape().to_vec(),
            });
        }
        Ok(Self { body })
    }
}

impl Layer for Residual {
    fn name(&self) -> &'static str {
        "residual"
    }

    fn input_shape(&self) -> &[usize] {
        self.body.input_shape()
    }

    fn output_shape(&self) -> &[usize] {
        self.body.output_shape()
    }

    fn forward(&mut self, input: &Tensor, train: bool) -> Result<Tensor> {
        let mut out = self.body.forward(input, train)?;
        for (o, x) in out.data_mut().iter_mut().zip(input.data()) {
            *o += x;
        }
        Ok(out)
    }

    fn backward(&mut self, grad_output: &Tensor) -> Result<Tensor> {
        let mut grad = self.body.backward(grad_output)?;
        for (g, skip) in grad.data_mut().iter_mut().zip(grad_output.data()) {
            *g += skip;
        }
        Ok(grad)
    }

    fn step(&mut self, lr: f32) {
        self.body.step(lr);
    }

    fn parameters(&self) -> usize {
        self.body.parameters()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    fn ramp(shape: &[usize]) -> Tensor {
        let n: usize = shape.iter().product();
        Tensor::from_vec(shape.to_vec(), (0..n).map(|i| (i % 7) as f32 - 3.0).collect()).unwrap()
    }

    #[test]
    fn test_conv_output_shape() {
        let conv = Conv2d::new(&[3, 8, 8], 4, 3, 1, 1, 1, &mut rng()).unwrap();
        assert_eq!(conv.output_shape(), &[4, 8, 8]);
        let strided = Conv2d::new(&[3, 8, 8], 4, 3, 2, 1, 1, &mut rng()).unwrap();
        assert_eq!(strided.output_shape(), &[4, 4, 4]);
    }

    #[test]
    fn test_conv_identity_kernel() {
        let mut conv = Conv2d::new(&[1, 3, 3], 1, 1, 1, 0, 1, &mut rng()).unwrap();
        conv.weight = vec![2.0];
        conv.bias = vec![1.0];
        let x = ramp(&[2, 1, 3, 3]);
        let y = conv.forward(&x, false).unwrap();
        for (a, b) in y.data().iter().zip(x.data()) {
            assert_eq!(*a, 2.0 * b + 1.0);
        }
    }

    #[test]
    fn test_conv_gradient_matches_finite_difference() {
        let mut conv = Conv2d::new(&[2, 4, 4], 2, 3, 1, 1, 1, &mut rng()).unwrap();
        let x = ramp(&[1, 2, 4, 4]);
        let y = conv.forward(&x, true).unwrap();
        let ones = Tensor::from_vec(y.shape().to_vec(), vec![1.0; y.len()]).unwrap();
        let gx = conv.backward(&ones).unwrap();

        // d(sum y)/dx[i] by central difference
        let i = 5;
        let eps = 1e-2;
        let mut plus = x.clone();
        plus.data_mut()[i] += eps;
        let mut minus = x.clone();
        minus.data_mut()[i] -= eps;
        let f = |t: &Tensor, c: &mut Conv2d| c.forward(t, false).unwrap().data().iter().sum::<f32>();
        let numeric = (f(&plus, &mut conv) - f(&minus, &mut conv)) / (2.0 * eps);
        assert!((numeric - gx.data()[i]).abs() < 1e-2);
    }

    #[test]
    fn test_depthwise_groups() {
        let conv = Conv2d::new(&[4, 6, 6], 4, 3, 1, 1, 4, &mut rng()).unwrap();
        assert_eq!(conv.parameters(), 4 * 9 + 4);
        assert!(Conv2d::new(&[3, 6, 6], 4, 3, 1, 1, 2, &mut rng()).is_err());
    }

    #[test]
    fn test_linear_flattens() {
        let mut fc = Linear::new(&[2, 3, 3], 5, &mut rng()).unwrap();
        let y = fc.forward(&ramp(&[4, 2, 3, 3]), true).unwrap();
        assert_eq!(y.shape(), &[4, 5]);
        let g = fc.backward(&Tensor::zeros(&[4, 5])).unwrap();
        assert_eq!(g.shape(), &[4, 2, 3, 3]);
    }

    #[test]
    fn test_relu_masks_gradient() {
        let mut relu = Relu::new(&[4]);
        let x = Tensor::from_vec(vec![1, 4], vec![-1.0, 2.0, 0.0, 3.0]).unwrap();
        assert_eq!(relu.forward(&x, true).unwrap().data(), &[0.0, 2.0, 0.0, 3.0]);
        let g = relu
            .backward(&Tensor::from_vec(vec![1, 4], vec![1.0; 4]).unwrap())
            .unwrap();
        assert_eq!(g.data(), &[0.0, 1.0, 0.0, 1.0]);
    }

    #[test]
    fn test_backward_requires_training_pass() {
        let mut relu = Relu::new(&[2]);
        let x = Tensor::zeros(&[1, 2]);
        relu.forward(&x, false).unwrap();
        assert!(matches!(
            relu.backward(&x),
            Err(QuarkError::InvalidComponent { .. })
        ));
    }

    #[test]
    fn test_pools() {
        let x = Tensor::from_vec(
            vec![1, 1, 2, 4],
            vec![1.0, 5.0, 2.0, 0.0, 3.0, 4.0, 8.0, 6.0],
        )
        .unwrap();
        let mut max = Pool::new(&[1, 2, 4], PoolKind::Max, 2, 2).unwrap();
        assert_eq!(max.forward(&x, true).unwrap().data(), &[5.0, 8.0]);
        let g = max
            .backward(&Tensor::from_vec(vec![1, 1, 1, 2], vec![1.0, 1.0]).unwrap())
            .unwrap();
        assert_eq!(g.data(), &[0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0]);

        let mut avg = Pool::new(&[1, 2, 4], PoolKind::Avg, 2, 2).unwrap();
        assert_eq!(avg.forward(&x, false).unwrap().data(), &[3.25, 4.0]);
    }

    #[test]
    fn test_adaptive_pool_downsamples() {
        let mut stem = Pool::adaptive(&[3, 224, 224], PoolKind::Avg, 32, 32).unwrap();
        assert_eq!(stem.output_shape(), &[3, 32, 32]);
        let x = Tensor::from_vec(vec![1, 3, 224, 224], vec![1.0; 3 * 224 * 224]).unwrap();
        let y = stem.forward(&x, false).unwrap();
        assert!(y.data().iter().all(|v| (v - 1.0).abs() < 1e-6));
    }

    #[test]
    fn test_batch_norm_normalises() {
        let mut bn = BatchNorm::new(&[1, 2]).unwrap();
        let x = Tensor::from_vec(vec![2, 1, 2], vec![1.0, 3.0, 5.0, 7.0]).unwrap();
        let y = bn.forward(&x, true).unwrap();
        let mean: f32 = y.data().iter().sum::<f32>() / 4.0;
        assert!(mean.abs() < 1e-5);
        let g = bn.backward(&Tensor::from_vec(vec![2, 1, 2], vec![1.0; 4]).unwrap()).unwrap();
        // constant upstream gradient cancels through the mean
        assert!(g.data().iter().all(|v| v.abs() < 1e-5));
    }

    #[test]
    fn test_dropout_inference_is_identity() {
        let mut dropout = Dropout::new(&[8], 0.5, 1).unwrap();
        let x = ramp(&[2, 8]);
        assert_eq!(dropout.forward(&x, false).unwrap(), x);
        let y = dropout.forward(&x, true).unwrap();
        assert!(y.data().iter().zip(x.data()).all(|(a, b)| *a == 0.0 || *a == 2.0 * b));
    }

    #[test]
    fn test_sequential_rejects_mismatched_layer() {
        let mut net = Sequential::new(&[3, 8, 8]);
        net.push(Box::new(Relu::new(&[3, 8, 8]))).unwrap();
        assert!(net.push(Box::new(Relu::new(&[3, 4, 4]))).is_err());
    }

    #[test]
    fn test_residual_adds_skip() {
        let mut body = Sequential::new(&[2]);
        body.push(Box::new(Relu::new(&[2]))).unwrap();
        let mut res = Residual::new(body).unwrap();
        let x = Tensor::from_vec(vec![1, 2], vec![-1.0, 2.0]).unwrap();
        assert_eq!(res.forward(&x, true).unwrap().data(), &[-1.0, 4.0]);
        let g = res.backward(&Tensor::from_vec(vec![1, 2], vec![1.0, 1.0]).unwrap()).unwrap();
        assert_eq!(g.data(), &[1.0, 2.0]);
    }
}
