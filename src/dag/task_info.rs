// src/dag/task_info.rs

//! Task and group declarations, plus per-run state.

use std::path::PathBuf;
use std::sync::Arc;

use crate::clean::CleanSpec;
use crate::pipeline::PipelineSpec;
use crate::types::TaskName;

/// What a task does when it runs.
#[derive(Debug, Clone)]
pub enum TaskAction {
    /// Select sources, run stages, write to the destination.
    Pipeline(PipelineSpec),
    /// Remove files and directories.
    Clean(CleanSpec),
}

/// A named unit of work. Immutable once registered.
#[derive(Debug, Clone)]
pub struct Task {
    pub name: TaskName,
    pub action: TaskAction,
}

impl Task {
    pub fn pipeline(name: impl Into<TaskName>, spec: PipelineSpec) -> Self {
        Self {
            name: name.into(),
            action: TaskAction::Pipeline(spec),
        }
    }

    pub fn clean(name: impl Into<TaskName>, spec: CleanSpec) -> Self {
        Self {
            name: name.into(),
            action: TaskAction::Clean(spec),
        }
    }

    /// Root-relative paths this task writes to or removes. Two tasks in the
    /// same phase must not overlap here.
    pub fn destinations(&self) -> Vec<PathBuf> {
        match &self.action {
            TaskAction::Pipeline(spec) => spec.dest.iter().cloned().collect(),
            TaskAction::Clean(spec) => spec.literal_targets().to_vec(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self.action {
            TaskAction::Pipeline(_) => "pipeline",
            TaskAction::Clean(_) => "clean",
        }
    }
}

/// A named set of tasks/groups run concurrently, optionally after a strict
/// sequence of other tasks/groups.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskGroup {
    pub name: TaskName,
    /// Run one after another, each fully completing before the next starts.
    pub after: Vec<TaskName>,
    /// Run concurrently once the whole `after` sequence has completed.
    pub members: Vec<TaskName>,
}

impl TaskGroup {
    pub fn new(name: impl Into<TaskName>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn after<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<TaskName>,
    {
        self.after = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn members<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<TaskName>,
    {
        self.members = names.into_iter().map(Into::into).collect();
        self
    }

    /// Every name this group refers to, sequence first.
    pub fn references(&self) -> impl Iterator<Item = &TaskName> {
        self.after.iter().chain(self.members.iter())
    }
}

/// One batch of tasks with no ordering between them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Phase {
    pub index: usize,
    /// Sorted by name.
    pub tasks: Vec<TaskName>,
}

/// Per-run state of a task (internal).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RunState {
    /// Part of the run, its phase has not started yet.
    Pending,
    /// Handed to the executor.
    Running,
    DoneSuccess,
    DoneFailed,
}

impl RunState {
    pub(crate) fn is_terminal(self) -> bool {
        matches!(self, RunState::DoneSuccess | RunState::DoneFailed)
    }
}

/// Public, read-only view of a task's per-run state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskRunState {
    /// The task is not part of the current run.
    NotInRun,
    Pending,
    Running,
    DoneSuccess,
    DoneFailed,
}

impl From<Option<RunState>> for TaskRunState {
    fn from(state: Option<RunState>) -> Self {
        match state {
            None => TaskRunState::NotInRun,
            Some(RunState::Pending) => TaskRunState::Pending,
            Some(RunState::Running) => TaskRunState::Running,
            Some(RunState::DoneSuccess) => TaskRunState::DoneSuccess,
            Some(RunState::DoneFailed) => TaskRunState::DoneFailed,
        }
    }
}

/// A task the scheduler wants the executor to run now.
#[derive(Debug, Clone)]
pub struct ScheduledTask {
    pub task: Arc<Task>,
    /// All tasks of one run share the same `run_id`.
    pub run_id: u64,
    pub phase: usize,
}

impl ScheduledTask {
    pub fn name(&self) -> &str {
        &self.task.name
    }
}
