use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

use crate::errors::TaskError;

/// Canonical task (and group) name type used throughout the crate.
pub type TaskName = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Failed,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Success => f.write_str("success"),
            RunStatus::Failed => f.write_str("failed"),
        }
    }
}

/// Result of one task execution.
///
/// Emitted once per task completion; consumed by the scheduler (failure
/// propagation) and by the notifier (feedback).
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub task: TaskName,
    pub status: RunStatus,
    pub error: Option<TaskError>,
    /// Paths written (or removed, for cleanup tasks), relative to the root.
    pub outputs: Vec<PathBuf>,
    pub duration: Duration,
}

impl RunOutcome {
    pub fn success(task: impl Into<TaskName>, outputs: Vec<PathBuf>) -> Self {
        Self {
            task: task.into(),
            status: RunStatus::Success,
            error: None,
            outputs,
            duration: Duration::ZERO,
        }
    }

    pub fn failed(task: impl Into<TaskName>, error: TaskError) -> Self {
        Self {
            task: task.into(),
            status: RunStatus::Failed,
            error: Some(error),
            outputs: Vec::new(),
            duration: Duration::ZERO,
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Success
    }
}

/// Aggregated result of one scheduler run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Entry group/task name (or a `+`-joined sequence for watch bindings).
    pub entry: String,
    pub run_id: u64,
    pub status: RunStatus,
    /// Every task outcome, in completion order.
    pub outcomes: Vec<RunOutcome>,
    pub phases_total: usize,
    /// Number of phases whose tasks all finished (successfully or not).
    pub phases_completed: usize,
    /// The run stopped at a phase boundary because of a cancel request.
    pub cancelled: bool,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Success
    }

    /// The first failed outcome in completion order.
    pub fn first_failure(&self) -> Option<&RunOutcome> {
        self.outcomes.iter().find(|o| !o.is_success())
    }

    pub fn outcome_of(&self, task: &str) -> Option<&RunOutcome> {
        self.outcomes.iter().find(|o| o.task == task)
    }
}
