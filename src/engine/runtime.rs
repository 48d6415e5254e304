// src/engine/runtime.rs

use std::fmt;
use std::sync::Arc;

use anyhow::anyhow;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::dag::ScheduledTask;
use crate::errors::Result;
use crate::exec::ExecutorBackend;
use crate::notifier::Notifier;
use crate::types::RunReport;

use super::core::CoreRuntime;
use super::{CoreCommand, CoreStep, RuntimeEvent};

/// Drives one run of the scheduler in response to `RuntimeEvent`s, and
/// delegates task execution to an `ExecutorBackend`.
///
/// This is a pure IO shell around `CoreRuntime`, which contains all the
/// runtime semantics. This struct handles async IO: reading events from
/// channels, dispatching tasks to the executor and feeding the notifier.
pub struct Runtime<E: ExecutorBackend> {
    core: CoreRuntime,
    event_rx: mpsc::Receiver<RuntimeEvent>,
    /// Handed to the executor so completions find their way back here.
    event_tx: mpsc::Sender<RuntimeEvent>,
    executor: Arc<E>,
    notifier: Arc<dyn Notifier>,
}

impl<E: ExecutorBackend> fmt::Debug for Runtime<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .finish_non_exhaustive()
    }
}

impl<E: ExecutorBackend> Runtime<E> {
    pub fn new(
        core: CoreRuntime,
        event_rx: mpsc::Receiver<RuntimeEvent>,
        event_tx: mpsc::Sender<RuntimeEvent>,
        executor: Arc<E>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            core,
            event_rx,
            event_tx,
            executor,
            notifier,
        }
    }

    /// Main event loop.
    ///
    /// - Executes the commands of the step that started the run.
    /// - Consumes `RuntimeEvent`s from `event_rx`.
    /// - Feeds them into the core runtime and executes the returned
    ///   commands, until the core reports the run as finished.
    pub async fn run(mut self, first: CoreStep) -> Result<RunReport> {
        let mut step = first;

        loop {
            let mut report = None;
            for command in step.commands {
                if let Some(finished) = self.execute_command(command).await? {
                    report = Some(finished);
                }
            }

            if !step.keep_running {
                return report.ok_or_else(|| anyhow!("run stopped without a report").into());
            }

            let event = match self.event_rx.recv().await {
                Some(e) => e,
                None => {
                    return Err(anyhow!("runtime event channel closed before the run finished").into());
                }
            };

            debug!(?event, "runtime received event");
            step = self.core.step(event);
        }
    }

    /// Execute a single command from the core.
    async fn execute_command(&mut self, command: CoreCommand) -> Result<Option<RunReport>> {
        match command {
            CoreCommand::DispatchTasks(tasks) => {
                self.spawn_ready(tasks).await?;
            }
            CoreCommand::Notify(outcome) => {
                if let Err(e) = self.notifier.notify(&outcome) {
                    warn!(task = %outcome.task, error = %e, "notifier failed; ignoring");
                }
            }
            CoreCommand::Finished(report) => {
                info!(run_id = report.run_id, entry = %report.entry, status = %report.status, "run complete");
                return Ok(Some(report));
            }
        }
        Ok(None)
    }

    async fn spawn_ready(&mut self, tasks: Vec<ScheduledTask>) -> Result<()> {
        if tasks.is_empty() {
            return Ok(());
        }

        let names: Vec<_> = tasks.iter().map(|t| t.name()).collect();
        debug!(?names, run_id = tasks[0].run_id, phase = tasks[0].phase, "spawning ready tasks");

        self.executor
            .spawn_ready_tasks(tasks, self.event_tx.clone())
            .await
    }
}
