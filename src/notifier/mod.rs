// src/notifier/mod.rs

//! Downstream consumers of task outcomes.
//!
//! The runtime hands every [`RunOutcome`] to a [`Notifier`] as soon as the
//! task completes. Delivery is best effort: an error returned here is logged
//! by the runtime and otherwise ignored, so implementations must not block.

pub mod livereload;

use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};

use crate::types::RunOutcome;

pub use livereload::LiveReloadServer;

pub trait Notifier: Send + Sync {
    fn notify(&self, outcome: &RunOutcome) -> Result<()>;
}

/// Writes one log line per outcome.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, outcome: &RunOutcome) -> Result<()> {
        match &outcome.error {
            None => info!(
                task = %outcome.task,
                outputs = outcome.outputs.len(),
                elapsed_ms = outcome.duration.as_millis() as u64,
                "{} task complete",
                outcome.task
            ),
            Some(err) => warn!(task = %outcome.task, error = %err, "{} task failed", outcome.task),
        }
        Ok(())
    }
}

/// Forwards to several notifiers; one failing does not stop the others.
#[derive(Clone, Default)]
pub struct FanoutNotifier {
    sinks: Vec<Arc<dyn Notifier>>,
}

impl FanoutNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn Notifier>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl Notifier for FanoutNotifier {
    fn notify(&self, outcome: &RunOutcome) -> Result<()> {
        let mut first_err = None;
        for sink in &self.sinks {
            if let Err(e) = sink.notify(outcome) {
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
