// src/engine/event_handlers.rs

//! Event handling logic for the core runtime.

use crate::dag::{ScheduledTask, Scheduler, SchedulerStep};
use crate::types::{RunOutcome, RunReport};

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug, Clone)]
pub enum CoreCommand {
    /// Send these tasks to the executor.
    DispatchTasks(Vec<ScheduledTask>),
    /// Hand this outcome to the notifier.
    Notify(RunOutcome),
    /// The run is over.
    Finished(RunReport),
}

/// Decision returned by the core after handling a single `RuntimeEvent`.
#[derive(Debug, Clone)]
pub struct CoreStep {
    /// Commands the IO shell should execute, in order.
    pub commands: Vec<CoreCommand>,
    /// Whether the outer runtime loop should keep running.
    pub keep_running: bool,
}

impl CoreStep {
    pub fn report(&self) -> Option<&RunReport> {
        self.commands.iter().find_map(|c| match c {
            CoreCommand::Finished(report) => Some(report),
            _ => None,
        })
    }

    pub fn dispatched(&self) -> Vec<&ScheduledTask> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                CoreCommand::DispatchTasks(tasks) => Some(tasks.iter()),
                _ => None,
            })
            .flatten()
            .collect()
    }
}

/// Translate a scheduler step into commands for the shell.
pub fn commands_from_step(step: SchedulerStep, mut commands: Vec<CoreCommand>) -> CoreStep {
    if !step.newly_scheduled.is_empty() {
        commands.push(CoreCommand::DispatchTasks(step.newly_scheduled));
    }

    let keep_running = match step.finished {
        Some(report) => {
            commands.push(CoreCommand::Finished(report));
            false
        }
        None => true,
    };

    CoreStep {
        commands,
        keep_running,
    }
}

/// Handle a task completion event.
///
/// The outcome is always forwarded to the notifier before the scheduler
/// decides what happens next.
pub fn handle_task_completion(scheduler: &mut Scheduler, outcome: RunOutcome) -> CoreStep {
    let commands = vec![CoreCommand::Notify(outcome.clone())];
    let step = scheduler.handle_completion(outcome);
    commands_from_step(step, commands)
}

/// Handle a cancel request.
pub fn handle_cancel(scheduler: &mut Scheduler) -> CoreStep {
    let step = scheduler.request_cancel();
    commands_from_step(step, Vec::new())
}
