// src/engine/runner.rs

//! Entry point for running tasks and groups.
//!
//! Every run gets its own scheduler, event channel and runtime loop, so
//! several runs (for example from independent watch bindings) can be in
//! flight at once. They share the task graph, the executor and the
//! notifier.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::anyhow;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::dag::{Scheduler, TaskGraph};
use crate::engine::{CoreRuntime, CoreStep, Runtime, RuntimeEvent};
use crate::errors::Result;
use crate::exec::{ExecutorBackend, PipelineExecutor};
use crate::notifier::{LogNotifier, Notifier};
use crate::pipeline::ExecContext;
use crate::types::{RunReport, TaskName};

const EVENT_CHANNEL_CAPACITY: usize = 64;

pub struct BuildRunner<E: ExecutorBackend = PipelineExecutor> {
    graph: Arc<TaskGraph>,
    executor: Arc<E>,
    notifier: Arc<dyn Notifier>,
    last_run_id: Arc<AtomicU64>,
}

impl<E: ExecutorBackend> Clone for BuildRunner<E> {
    fn clone(&self) -> Self {
        Self {
            graph: Arc::clone(&self.graph),
            executor: Arc::clone(&self.executor),
            notifier: Arc::clone(&self.notifier),
            last_run_id: Arc::clone(&self.last_run_id),
        }
    }
}

impl<E: ExecutorBackend> fmt::Debug for BuildRunner<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildRunner")
            .field("last_run_id", &self.last_run_id.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl BuildRunner<PipelineExecutor> {
    /// Runner backed by the real pipeline executor. Must be called from
    /// within a Tokio runtime.
    pub fn new(graph: Arc<TaskGraph>, ctx: ExecContext) -> Self {
        Self::with_executor(graph, PipelineExecutor::new(ctx))
    }
}

impl<E: ExecutorBackend> BuildRunner<E> {
    pub fn with_executor(graph: Arc<TaskGraph>, executor: E) -> Self {
        Self {
            graph,
            executor: Arc::new(executor),
            notifier: Arc::new(LogNotifier),
            last_run_id: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn graph(&self) -> &Arc<TaskGraph> {
        &self.graph
    }

    pub fn executor(&self) -> &Arc<E> {
        &self.executor
    }

    /// Run `entry` to completion.
    ///
    /// Task failures are reported in the [`RunReport`]; only structural
    /// errors (unknown entry) are returned as `Err`.
    pub async fn run_once(&self, entry: &str) -> Result<RunReport> {
        self.start(entry)?.wait().await
    }

    /// Run several tasks/groups one after another.
    pub async fn run_sequence(&self, names: &[TaskName]) -> Result<RunReport> {
        self.start_sequence(names)?.wait().await
    }

    /// Start a run in the background.
    pub fn start(&self, entry: &str) -> Result<RunHandle> {
        let mut core = self.new_core();
        let first = core.start_run(entry)?;
        Ok(self.spawn(core, first))
    }

    pub fn start_sequence(&self, names: &[TaskName]) -> Result<RunHandle> {
        let mut core = self.new_core();
        let first = core.start_sequence(names)?;
        Ok(self.spawn(core, first))
    }

    fn new_core(&self) -> CoreRuntime {
        let last = self.last_run_id.fetch_add(1, Ordering::SeqCst);
        CoreRuntime::new(Scheduler::new(Arc::clone(&self.graph)).with_last_run_id(last))
    }

    fn spawn(&self, core: CoreRuntime, first: CoreStep) -> RunHandle {
        let (tx, rx) = mpsc::channel::<RuntimeEvent>(EVENT_CHANNEL_CAPACITY);
        let runtime = Runtime::new(
            core,
            rx,
            tx.clone(),
            Arc::clone(&self.executor),
            Arc::clone(&self.notifier),
        );
        debug!("spawning run");
        RunHandle {
            cancel: CancelHandle { tx },
            join: tokio::spawn(runtime.run(first)),
        }
    }
}

/// Cooperative cancellation for one run.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: mpsc::Sender<RuntimeEvent>,
}

impl CancelHandle {
    /// Ask the run to stop at its next phase boundary. Tasks already
    /// running always finish. Has no effect on a finished run.
    pub fn cancel(&self) {
        match self.tx.try_send(RuntimeEvent::CancelRequested) {
            Ok(()) | Err(mpsc::error::TrySendError::Closed(_)) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                let tx = self.tx.clone();
                tokio::spawn(async move {
                    let _ = tx.send(event).await;
                });
            }
        }
    }
}

/// A run in flight.
#[derive(Debug)]
pub struct RunHandle {
    cancel: CancelHandle,
    join: JoinHandle<Result<RunReport>>,
}

impl RunHandle {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the run to finish.
    pub async fn wait(self) -> Result<RunReport> {
        self.join
            .await
            .map_err(|e| anyhow!("run task failed: {e}"))?
    }
}
