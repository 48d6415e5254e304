// src/exec/executor_loop.rs

//! Main executor loop that spawns task runners.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info};

use crate::dag::ScheduledTask;
use crate::engine::RuntimeEvent;
use crate::exec::task_runner::run_task;
use crate::pipeline::ExecContext;

/// A scheduled task plus the run it reports back to.
#[derive(Debug)]
pub struct Dispatch {
    pub task: ScheduledTask,
    pub runtime_tx: mpsc::Sender<RuntimeEvent>,
}

/// Spawn the background executor loop.
///
/// Each dispatched task is executed in its own Tokio task, and **per task
/// name there is never more than one instance running at the same time**:
/// a request for a task that is already running (from another run) waits
/// until the earlier instance has finished, then runs against the files as
/// they are at that point.
pub fn spawn_executor(ctx: ExecContext) -> mpsc::Sender<Dispatch> {
    let (tx, mut rx) = mpsc::channel::<Dispatch>(32);

    tokio::spawn(async move {
        info!("executor loop started");

        // One lock per task name, created on first use.
        let mut locks: HashMap<String, Arc<Mutex<()>>> = HashMap::new();

        while let Some(dispatch) = rx.recv().await {
            let lock = Arc::clone(
                locks
                    .entry(dispatch.task.name().to_string())
                    .or_default(),
            );
            let ctx = ctx.clone();

            tokio::spawn(async move {
                let name = dispatch.task.name().to_string();
                let run_id = dispatch.task.run_id;
                let _guard = lock.lock_owned().await;
                run_task(dispatch.task, ctx, dispatch.runtime_tx).await;
                debug!(task = %name, run_id, "task runner future finished");
            });
        }

        info!("executor loop finished (channel closed)");
    });

    tx
}
