// src/engine/core.rs

//! Pure core runtime state machine.
//!
//! This module contains a synchronous, deterministic "core runtime" that
//! consumes [`RuntimeEvent`]s and produces:
//! - an updated core state
//! - a list of "commands" describing what the IO shell should do next
//!
//! The async/IO-heavy shell (`engine::runtime::Runtime`) is responsible for:
//! - reading events from channels
//! - sending `ScheduledTask`s to the executor
//! - delivering outcomes to the notifier
//!
//! The core is unit tested without any Tokio, channels, filesystem, or
//! processes.

use crate::dag::Scheduler;
use crate::engine::RuntimeEvent;
use crate::engine::event_handlers::{
    CoreStep, commands_from_step, handle_cancel, handle_task_completion,
};
use crate::errors::GraphError;
use crate::types::TaskName;

/// Pure core runtime state.
///
/// It has **no** channels, no Tokio types, and does not perform any IO.
#[derive(Debug)]
pub struct CoreRuntime {
    scheduler: Scheduler,
}

impl CoreRuntime {
    pub fn new(scheduler: Scheduler) -> Self {
        Self { scheduler }
    }

    /// Expose whether the scheduler is idle (for tests).
    pub fn is_idle(&self) -> bool {
        self.scheduler.is_idle()
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Begin a run of `entry`; the returned step dispatches its first phase.
    pub fn start_run(&mut self, entry: &str) -> Result<CoreStep, GraphError> {
        let step = self.scheduler.start_run(entry)?;
        Ok(commands_from_step(step, Vec::new()))
    }

    /// Begin a run of `names` one after another.
    pub fn start_sequence(&mut self, names: &[TaskName]) -> Result<CoreStep, GraphError> {
        let step = self.scheduler.start_sequence(names)?;
        Ok(commands_from_step(step, Vec::new()))
    }

    /// Handle a single runtime event, updating core state and returning the
    /// resulting commands for the IO shell.
    pub fn step(&mut self, event: RuntimeEvent) -> CoreStep {
        match event {
            RuntimeEvent::TaskCompleted { outcome } => {
                handle_task_completion(&mut self.scheduler, outcome)
            }
            RuntimeEvent::CancelRequested => handle_cancel(&mut self.scheduler),
        }
    }
}
