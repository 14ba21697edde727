use tracing::{trace, warn};

/// Receives progress and recoverable warnings from a packing run.
///
/// Both hooks default to no-ops so implementors only override what they display.
pub trait PackObserver {
    /// Called after every page-size candidate the search evaluates; `candidate` counts
    /// from zero across the whole run.
    fn on_progress(&mut self, candidate: usize) {
        let _ = candidate;
    }

    /// A recoverable condition attributed to `source` (a source name, or the packer
    /// itself for settings-level warnings).
    fn on_warning(&mut self, source: &str, message: &str) {
        let _ = (source, message);
    }
}

/// Forwards everything to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl PackObserver for TracingObserver {
    fn on_progress(&mut self, candidate: usize) {
        trace!(candidate, "evaluated page size candidate");
    }

    fn on_warning(&mut self, source: &str, message: &str) {
        warn!(source, "{}", message);
    }
}
