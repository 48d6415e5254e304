// src/exec/task_runner.rs

//! Individual task runner.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::dag::{ScheduledTask, Task, TaskAction};
use crate::engine::RuntimeEvent;
use crate::errors::TaskError;
use crate::pipeline::{self, ExecContext};
use crate::types::RunOutcome;

/// Run a single task and emit exactly one `TaskCompleted` event.
///
/// The action runs in its own Tokio task so that a panic inside a stage
/// becomes a failed outcome instead of a run that never finishes.
pub async fn run_task(
    task: ScheduledTask,
    ctx: ExecContext,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
) {
    let name = task.name().to_string();
    let run_id = task.run_id;
    info!(task = %name, run_id, phase = task.phase, kind = task.task.kind(), "starting task");

    let started = Instant::now();
    let action = tokio::spawn(execute_action(Arc::clone(&task.task), ctx));
    let outcome = match action.await {
        Ok(Ok(outputs)) => RunOutcome::success(name.clone(), outputs),
        Ok(Err(err)) => RunOutcome::failed(name.clone(), err),
        Err(join_err) => {
            error!(task = %name, run_id, error = %join_err, "task execution aborted");
            RunOutcome::failed(name.clone(), TaskError::Aborted(join_err.to_string()))
        }
    }
    .with_duration(started.elapsed());

    if outcome.is_success() {
        info!(
            task = %name,
            run_id,
            outputs = outcome.outputs.len(),
            elapsed_ms = outcome.duration.as_millis() as u64,
            "task finished"
        );
    } else {
        warn!(
            task = %name,
            run_id,
            error = ?outcome.error,
            elapsed_ms = outcome.duration.as_millis() as u64,
            "task failed"
        );
    }

    if runtime_tx
        .send(RuntimeEvent::TaskCompleted { outcome })
        .await
        .is_err()
    {
        debug!(task = %name, run_id, "runtime gone before completion was delivered");
    }
}

/// Perform what the task declares. Returns the root-relative paths written
/// or removed.
pub async fn execute_action(task: Arc<Task>, ctx: ExecContext) -> Result<Vec<PathBuf>, TaskError> {
    match &task.action {
        TaskAction::Pipeline(spec) => pipeline::execute(spec, &ctx).await,
        TaskAction::Clean(spec) => spec.execute(&ctx),
    }
}
