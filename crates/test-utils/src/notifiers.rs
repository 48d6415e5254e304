use std::sync::Mutex;

use anyhow::{Result, bail};
use assetdag::notifier::Notifier;
use assetdag::types::RunOutcome;

/// Keeps every outcome it is handed.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    outcomes: Mutex<Vec<RunOutcome>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn outcomes(&self) -> Vec<RunOutcome> {
        self.outcomes.lock().unwrap().clone()
    }

    pub fn task_names(&self) -> Vec<String> {
        self.outcomes().into_iter().map(|o| o.task).collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, outcome: &RunOutcome) -> Result<()> {
        self.outcomes.lock().unwrap().push(outcome.clone());
        Ok(())
    }
}

/// Fails on every call.
#[derive(Debug, Default)]
pub struct FailingNotifier;

impl Notifier for FailingNotifier {
    fn notify(&self, outcome: &RunOutcome) -> Result<()> {
        bail!("notifier refused outcome of '{}'", outcome.task)
    }
}
