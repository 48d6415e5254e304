// src/dag/scheduler_step.rs

//! Step-by-step execution result types for the scheduler.

use crate::dag::task_info::ScheduledTask;
use crate::types::{RunReport, TaskName};

/// Structured result of a single scheduler "step".
///
/// This is useful for tests that want to manually step a run and make
/// assertions about what changed.
#[derive(Debug, Clone, Default)]
pub struct SchedulerStep {
    /// Tasks that became ready to run as a result of this step (always a
    /// whole phase).
    pub newly_scheduled: Vec<ScheduledTask>,
    /// Tasks whose completion in this step was a failure.
    pub newly_failed: Vec<TaskName>,
    /// The report of the run, if this step finished it.
    pub finished: Option<RunReport>,
}

impl SchedulerStep {
    pub fn run_just_finished(&self) -> bool {
        self.finished.is_some()
    }

    pub fn scheduled_names(&self) -> Vec<&str> {
        self.newly_scheduled.iter().map(|t| t.name()).collect()
    }
}
