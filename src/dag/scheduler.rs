// src/dag/scheduler.rs

//! Pure per-run phase state machine.
//!
//! A run walks the phases of its entry strictly in order. Every task of a
//! phase is scheduled at once; the next phase starts only when all of them
//! finished and all succeeded. A failure lets the rest of the current
//! phase finish, then ends the run. Cancellation is only looked at on the
//! same phase boundary.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::dag::graph::TaskGraph;
use crate::dag::scheduler_step::SchedulerStep;
use crate::dag::task_info::{Phase, RunState, ScheduledTask, TaskRunState};
use crate::errors::{GraphError, TaskError};
use crate::types::{RunOutcome, RunReport, RunStatus, TaskName};

#[derive(Debug)]
struct ActiveRun {
    run_id: u64,
    entry: String,
    phases: Vec<Phase>,
    current: usize,
    states: HashMap<TaskName, RunState>,
    outcomes: Vec<RunOutcome>,
    failed: bool,
    cancel_requested: bool,
}

impl ActiveRun {
    fn phase_done(&self) -> bool {
        self.phases[self.current]
            .tasks
            .iter()
            .all(|t| self.states.get(t).is_some_and(|s| s.is_terminal()))
    }
}

/// Scheduler holds the immutable task graph plus the state of at most one
/// active run.
#[derive(Debug)]
pub struct Scheduler {
    graph: Arc<TaskGraph>,
    /// Monotonically increasing run ID.
    run_counter: u64,
    run: Option<ActiveRun>,
}

impl Scheduler {
    pub fn new(graph: Arc<TaskGraph>) -> Self {
        Self {
            graph,
            run_counter: 0,
            run: None,
        }
    }

    /// The next run started gets `last_run_id + 1`.
    pub fn with_last_run_id(mut self, last_run_id: u64) -> Self {
        self.run_counter = last_run_id;
        self
    }

    pub fn graph(&self) -> &Arc<TaskGraph> {
        &self.graph
    }

    /// Returns `true` if there is currently no active run.
    pub fn is_idle(&self) -> bool {
        self.run.is_none()
    }

    pub fn current_run_id(&self) -> Option<u64> {
        self.run.as_ref().map(|r| r.run_id)
    }

    /// Index of the phase currently executing.
    pub fn current_phase(&self) -> Option<usize> {
        self.run.as_ref().map(|r| r.current)
    }

    /// Read-only view of the given task's state in the active run.
    pub fn run_state_of(&self, task: &str) -> TaskRunState {
        self.run
            .as_ref()
            .and_then(|r| r.states.get(task).copied())
            .into()
    }

    /// Start a run of a registered task or group.
    pub fn start_run(&mut self, entry: &str) -> Result<SchedulerStep, GraphError> {
        let phases = self.graph.resolve_order(entry)?;
        Ok(self.start_phases(entry.to_string(), phases))
    }

    /// Start a run of several tasks/groups one after another.
    pub fn start_sequence(&mut self, names: &[TaskName]) -> Result<SchedulerStep, GraphError> {
        let phases = self.graph.resolve_sequence(names)?;
        Ok(self.start_phases(names.join("+"), phases))
    }

    /// Start a run over already-resolved phases.
    pub fn start_phases(&mut self, entry: String, phases: Vec<Phase>) -> SchedulerStep {
        let mut step = SchedulerStep::default();
        if let Some(active) = &self.run {
            warn!(
                run_id = active.run_id,
                entry = %entry,
                "start requested while a run is active; ignoring"
            );
            return step;
        }

        self.run_counter += 1;
        let states = phases
            .iter()
            .flat_map(|p| p.tasks.iter())
            .map(|t| (t.clone(), RunState::Pending))
            .collect();

        info!(
            run_id = self.run_counter,
            entry = %entry,
            phases = phases.len(),
            "starting run"
        );

        self.run = Some(ActiveRun {
            run_id: self.run_counter,
            entry,
            phases,
            current: 0,
            states,
            outcomes: Vec::new(),
            failed: false,
            cancel_requested: false,
        });

        let has_phases = self.run.as_ref().is_some_and(|r| !r.phases.is_empty());
        if has_phases {
            self.schedule_current(&mut step);
            self.advance(&mut step);
        } else {
            step.finished = self.finish();
        }
        step
    }

    /// Record the outcome of a task of the active run.
    pub fn handle_completion(&mut self, outcome: RunOutcome) -> SchedulerStep {
        let mut step = SchedulerStep::default();
        let Some(run) = self.run.as_mut() else {
            warn!(task = %outcome.task, "completion with no active run; ignoring");
            return step;
        };

        match run.states.get_mut(&outcome.task) {
            Some(state) if *state == RunState::Running => {
                if outcome.is_success() {
                    *state = RunState::DoneSuccess;
                    debug!(task = %outcome.task, run_id = run.run_id, "task completed successfully");
                } else {
                    *state = RunState::DoneFailed;
                    run.failed = true;
                    warn!(
                        task = %outcome.task,
                        run_id = run.run_id,
                        error = ?outcome.error,
                        "task failed; no further phase will start"
                    );
                    step.newly_failed.push(outcome.task.clone());
                }
                run.outcomes.push(outcome);
            }
            other => {
                warn!(
                    task = %outcome.task,
                    run_id = run.run_id,
                    state = ?other,
                    "completion for a task that is not running; ignoring"
                );
                return step;
            }
        }

        self.advance(&mut step);
        step
    }

    /// Ask the active run to stop at the next phase boundary. In-flight
    /// tasks always finish.
    pub fn request_cancel(&mut self) -> SchedulerStep {
        let mut step = SchedulerStep::default();
        if let Some(run) = self.run.as_mut() {
            info!(run_id = run.run_id, "cancel requested; stopping at phase boundary");
            run.cancel_requested = true;
            self.advance(&mut step);
        }
        step
    }

    /// Hand every task of the current phase to the executor.
    fn schedule_current(&mut self, step: &mut SchedulerStep) {
        let Some(run) = self.run.as_mut() else {
            return;
        };
        let phase = &run.phases[run.current];
        debug!(
            run_id = run.run_id,
            phase = phase.index,
            tasks = ?phase.tasks,
            "scheduling phase"
        );

        for name in &phase.tasks {
            match self.graph.task(name) {
                Some(task) => {
                    run.states.insert(name.clone(), RunState::Running);
                    step.newly_scheduled.push(ScheduledTask {
                        task,
                        run_id: run.run_id,
                        phase: phase.index,
                    });
                }
                None => {
                    warn!(task = %name, "phase references unknown task; failing it");
                    run.states.insert(name.clone(), RunState::DoneFailed);
                    run.failed = true;
                    run.outcomes.push(RunOutcome::failed(
                        name.clone(),
                        TaskError::Aborted("task is not registered".to_string()),
                    ));
                    step.newly_failed.push(name.clone());
                }
            }
        }
    }

    /// Move past every finished phase, starting the next one or ending the
    /// run.
    fn advance(&mut self, step: &mut SchedulerStep) {
        loop {
            let Some(run) = self.run.as_mut() else {
                return;
            };
            if !run.phase_done() {
                return;
            }

            let stop = run.failed || run.cancel_requested || run.current + 1 >= run.phases.len();
            if stop {
                step.finished = self.finish();
                return;
            }

            run.current += 1;
            self.schedule_current(step);
        }
    }

    fn finish(&mut self) -> Option<RunReport> {
        let run = self.run.take()?;
        let phases_total = run.phases.len();
        let phases_completed = if phases_total == 0 { 0 } else { run.current + 1 };
        let cancelled = run.cancel_requested && phases_completed < phases_total;
        let status = if run.failed || cancelled {
            RunStatus::Failed
        } else {
            RunStatus::Success
        };

        info!(
            run_id = run.run_id,
            entry = %run.entry,
            %status,
            phases_completed,
            phases_total,
            cancelled,
            "run finished"
        );

        Some(RunReport {
            entry: run.entry,
            run_id: run.run_id,
            status,
            outcomes: run.outcomes,
            phases_total,
            phases_completed,
            cancelled,
        })
    }
}
