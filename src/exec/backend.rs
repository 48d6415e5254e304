// src/exec/backend.rs

//! Pluggable executor backend abstraction.
//!
//! The runtime talks to an `ExecutorBackend` instead of a raw mpsc sender.
//! This makes it easy to swap in a fake executor in tests while keeping the
//! production executor implementation in [`super::executor_loop`].
//!
//! - `PipelineExecutor` is the default implementation. It wraps the
//!   executor loop and forwards scheduled tasks over an mpsc channel.
//! - Tests can provide their own `ExecutorBackend` that, for example,
//!   records which tasks were scheduled and directly emits `TaskCompleted`
//!   events.
//!
//! One backend is shared by every run in flight, so dispatch takes `&self`
//! and each call carries the sender of the run the tasks belong to.

use std::future::Future;
use std::pin::Pin;

use anyhow::anyhow;
use tokio::sync::mpsc;

use crate::dag::ScheduledTask;
use crate::engine::RuntimeEvent;
use crate::errors::Result;
use crate::pipeline::ExecContext;

use super::executor_loop::{Dispatch, spawn_executor};

/// Trait abstracting how scheduled tasks are executed.
pub trait ExecutorBackend: Send + Sync + 'static {
    /// Dispatch the given tasks for execution. Each must eventually produce
    /// exactly one `RuntimeEvent::TaskCompleted` on `runtime_tx`.
    fn spawn_ready_tasks(
        &self,
        tasks: Vec<ScheduledTask>,
        runtime_tx: mpsc::Sender<RuntimeEvent>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Real executor backend used in production.
#[derive(Debug, Clone)]
pub struct PipelineExecutor {
    tx: mpsc::Sender<Dispatch>,
}

impl PipelineExecutor {
    /// Create a new executor backend for the given project.
    ///
    /// This spawns the background executor loop immediately.
    pub fn new(ctx: ExecContext) -> Self {
        let tx = spawn_executor(ctx);
        Self { tx }
    }
}

impl ExecutorBackend for PipelineExecutor {
    fn spawn_ready_tasks(
        &self,
        tasks: Vec<ScheduledTask>,
        runtime_tx: mpsc::Sender<RuntimeEvent>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        // Clone the sender so the future doesn't borrow `self` across `await`.
        let tx = self.tx.clone();

        Box::pin(async move {
            for task in tasks {
                tx.send(Dispatch {
                    task,
                    runtime_tx: runtime_tx.clone(),
                })
                .await
                .map_err(|_| anyhow!("executor loop has stopped"))?;
            }
            Ok(())
        })
    }
}
