//! Dense `f32` tensors and labelled batches.

use crate::error::QuarkError;

/// Row-major dense tensor
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    shape: Vec<usize>,
    data: Vec<f32>,
}

impl Tensor {
    /// Zero-filled tensor
    pub fn zeros(shape: &[usize]) -> Self {
        Self {
            shape: shape.to_vec(),
            data: vec![0.0; shape.iter().product()],
        }
    }

    /// Wrap existing data; fails if the element count does not match
    pub fn from_vec(shape: Vec<usize>, data: Vec<f32>) -> Result<Self, QuarkError> {
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(QuarkError::Shape {
                context: "tensor construction".into(),
                expected: shape,
                actual: vec![data.len()],
            });
        }
        Ok(Self { shape, data })
    }

    /// Dimensions
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Leading dimension (batch size), 0 for scalars
    pub fn batch(&self) -> usize {
        self.shape.first().copied().unwrap_or(0)
    }

    /// Element count
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the tensor holds no elements
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Flat element slice
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Mutable flat element slice
    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Consume into the flat element vector
    pub fn into_data(self) -> Vec<f32> {
        self.data
    }

    /// Same data under a new shape with equal element count
    pub fn reshape(self, shape: Vec<usize>) -> Result<Self, QuarkError> {
        Self::from_vec(shape, self.data)
    }
}

/// Inputs and class labels for one step
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    /// `[batch, ...sample_shape]`
    pub inputs: Tensor,
    /// One label per sample
    pub labels: Vec<usize>,
}

impl Batch {
    /// Number of samples
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Whether the batch is empty
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}
