//! Logging context
//!
//! The subscriber is installed once per process from an explicit context
//! built from the command line.

use tracing_subscriber::EnvFilter;

/// Verbosity requested on the command line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogContext {
    /// `--trace`: everything
    pub trace: bool,
    /// `--debug`: debug and above
    pub debug: bool,
}

impl LogContext {
    /// Filter directive for this context; `--trace` wins over `--debug`
    pub fn directive(&self) -> &'static str {
        if self.trace {
            "quark=trace"
        } else if self.debug {
            "quark=debug"
        } else {
            "quark=info"
        }
    }

    /// Install the fmt subscriber
    ///
    /// A second install in the same process is ignored.
    pub fn install(&self) {
        let installed = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::new(self.directive()))
            .with_target(false)
            .try_init();
        if installed.is_err() {
            tracing::debug!("log subscriber already installed");
        }
    }
}
