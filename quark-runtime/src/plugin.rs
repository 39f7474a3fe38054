//! Framework Plugins
//!
//! A crate adds a framework by submitting a [`FrameworkPlugin`]:
//!
//! ```ignore
//! inventory::submit! {
//!     quark_runtime::FrameworkPlugin {
//!         name: "ONNX",
//!         tag: "onnx",
//!         workload: Some(onnx::build_workload),
//!         executor: Some(onnx::build_executor),
//!         data_provider: None,
//!         clock: None,
//!     }
//! }
//! ```
//!
//! Its tag becomes decodable in the framework domain (and in the timer
//! domain when it supplies a clock) once [`register_plugins`] has run.
//! Plugins may also implement a recognised built-in tag such as `torch`.

use crate::component::{DataProvider, ExecutorBackend, Workload};
use quark_config::BenchmarkConfig;
use quark_core::categorical::{self, CategoricalValue};
use quark_core::{Clock, Domain, DuplicateDefinitionError, Result};
use std::sync::OnceLock;

/// Component factories contributed by a framework integration
#[derive(Clone, Copy)]
pub struct FrameworkPlugin {
    /// Registered name, e.g. `ONNX`
    pub name: &'static str,
    /// Registered tag, e.g. `onnx`
    pub tag: &'static str,
    /// Workload factory
    pub workload: Option<fn(&BenchmarkConfig) -> Result<Box<dyn Workload>>>,
    /// Executor factory
    pub executor: Option<fn(&BenchmarkConfig) -> Result<Box<dyn ExecutorBackend>>>,
    /// Data provider factory
    pub data_provider: Option<fn(&BenchmarkConfig) -> Result<Box<dyn DataProvider>>>,
    /// Clock used when `experiment.timer` carries this tag
    pub clock: Option<fn() -> Box<dyn Clock>>,
}

impl std::fmt::Debug for FrameworkPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameworkPlugin")
            .field("name", &self.name)
            .field("tag", &self.tag)
            .field("workload", &self.workload.is_some())
            .field("executor", &self.executor.is_some())
            .field("data_provider", &self.data_provider.is_some())
            .field("clock", &self.clock.is_some())
            .finish()
    }
}

inventory::collect!(FrameworkPlugin);

/// Submitted plugin for `tag`, matched case-insensitively
pub fn find_plugin(tag: &str) -> Option<&'static FrameworkPlugin> {
    inventory::iter::<FrameworkPlugin>
        .into_iter()
        .find(|p| p.tag.eq_ignore_ascii_case(tag))
}

type Outcome = std::result::Result<Vec<CategoricalValue>, DuplicateDefinitionError>;

static REGISTERED: OnceLock<Outcome> = OnceLock::new();

/// Register every submitted [`quark_core::PluginDef`] and [`FrameworkPlugin`]
///
/// The first call does the work; later calls return its outcome. Returns the
/// categorical values that were added.
pub fn register_plugins() -> Outcome {
    REGISTERED.get_or_init(register_all).clone()
}

fn register_all() -> Outcome {
    let mut added = categorical::register_plugins()?;

    let mut plugins: Vec<&'static FrameworkPlugin> =
        inventory::iter::<FrameworkPlugin>.into_iter().collect();
    plugins.sort_by_key(|p| p.tag.to_ascii_lowercase());

    for pair in plugins.windows(2) {
        if pair[0].tag.eq_ignore_ascii_case(pair[1].tag) {
            return Err(DuplicateDefinitionError {
                domain: Domain::Framework,
                name: pair[1].name.to_string(),
                tag: pair[1].tag.to_string(),
                conflict: "tag",
            });
        }
    }

    for plugin in plugins {
        if categorical::find(Domain::Framework, plugin.tag).is_none() {
            added.push(categorical::register(Domain::Framework, plugin.name, plugin.tag)?);
        }
        if plugin.clock.is_some() && categorical::find(Domain::Timer, plugin.tag).is_none() {
            added.push(categorical::register(Domain::Timer, plugin.name, plugin.tag)?);
        }
        tracing::debug!(plugin = plugin.tag, "framework plugin available");
    }
    Ok(added)
}
