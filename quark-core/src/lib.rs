#![warn(missing_docs)]
//! Quark Core
//!
//! Building blocks shared by every Quark crate:
//! - Tagged categorical values with a process-wide, extensible registry
//! - The error taxonomy unified under [`QuarkError`]
//! - Dense `f32` tensors and labelled batches
//! - Clocks (monotonic wall clock and event timelines)
//! - The statistical [`Timer`] driving warmup and measured repetitions

pub mod categorical;
mod error;
mod measure;
mod tensor;
mod timer;

pub use categorical::{CategoricalRegistry, CategoricalValue, Domain, PluginDef, tags};
pub use error::{
    DuplicateDefinitionError, ExhaustedError, FieldError, QuarkError, UnsupportedComponentError,
    ValidationError,
};
pub use measure::{
    Clock, DeviceTimeline, EventClock, HostTimeline, MonotonicSource, Observe, ObservedClock,
    WallClock,
};
pub use tensor::{Batch, Tensor};
pub use timer::{Timer, TimerState};

/// Result alias used across the workspace
pub type Result<T, E = QuarkError> = std::result::Result<T, E>;

/// Default number of measured repetitions
pub const DEFAULT_REPEAT_SAMPLES: usize = 33;

/// Default number of discarded warmup repetitions
pub const DEFAULT_WARMUP_SAMPLES: usize = 5;
