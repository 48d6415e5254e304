// src/watch/binding.rs

//! Per-binding worker.
//!
//! Each binding owns one Tokio task and one trigger channel. The worker is
//! the only writer of the binding's state:
//!
//! ```text
//! Idle --trigger--> (quiet for the debounce window) --> Running
//! Running --trigger--> RerunPending
//! Running --run done--> Idle
//! RerunPending --run done--> Running
//! any --channel closed--> Stopped (after an in-flight run finished)
//! ```
//!
//! Triggers arriving during the debounce window restart it, so a burst of
//! events produces one run. Triggers arriving while a run is in flight
//! collapse into a single follow-up run, so the binding's targets never run
//! concurrently with themselves.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::engine::BuildRunner;
use crate::errors::Result;
use crate::exec::ExecutorBackend;
use crate::types::{RunReport, TaskName};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingState {
    Idle,
    Running,
    /// A run is in flight and another one was requested.
    RerunPending,
    Stopped,
}

/// What a binding calls to rebuild its targets.
pub trait BindingRunner: Send + Sync + 'static {
    fn run_targets<'a>(
        &'a self,
        targets: &'a [TaskName],
    ) -> Pin<Box<dyn Future<Output = Result<RunReport>> + Send + 'a>>;
}

impl<E: ExecutorBackend> BindingRunner for BuildRunner<E> {
    fn run_targets<'a>(
        &'a self,
        targets: &'a [TaskName],
    ) -> Pin<Box<dyn Future<Output = Result<RunReport>> + Send + 'a>> {
        Box::pin(self.run_sequence(targets))
    }
}

/// Sending half of a binding's trigger channel.
#[derive(Debug, Clone)]
pub struct BindingTrigger {
    label: String,
    tx: mpsc::Sender<()>,
}

impl BindingTrigger {
    /// Request a run. Returns `false` once the binding has stopped.
    ///
    /// Never waits: when a trigger is already queued the new one is
    /// absorbed by it.
    pub fn trigger(&self) -> bool {
        match self.tx.try_send(()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(())) => {
                debug!(binding = %self.label, "trigger coalesced with a queued one");
                true
            }
            Err(mpsc::error::TrySendError::Closed(())) => false,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

/// Owner side of a running binding worker.
#[derive(Debug)]
pub struct BindingHandle {
    trigger: BindingTrigger,
    state: watch::Receiver<BindingState>,
    runs: Arc<AtomicU64>,
    join: JoinHandle<()>,
}

impl BindingHandle {
    pub fn trigger(&self) -> bool {
        self.trigger.trigger()
    }

    /// A cloneable trigger, for event dispatchers.
    pub fn trigger_handle(&self) -> BindingTrigger {
        self.trigger.clone()
    }

    pub fn state(&self) -> BindingState {
        *self.state.borrow()
    }

    /// Receiver for state changes, e.g. to `wait_for` a given state.
    pub fn subscribe(&self) -> watch::Receiver<BindingState> {
        self.state.clone()
    }

    /// Number of runs that finished so far.
    pub fn runs_completed(&self) -> u64 {
        self.runs.load(Ordering::SeqCst)
    }

    /// Stop accepting triggers, let an in-flight run finish, and wait for
    /// the worker to exit. Other clones of the trigger must be dropped
    /// first.
    pub async fn shutdown(self) {
        let BindingHandle { trigger, join, .. } = self;
        let label = trigger.label.clone();
        drop(trigger);
        if let Err(e) = join.await {
            warn!(binding = %label, error = %e, "binding worker ended abnormally");
        }
    }
}

/// Start the worker for one binding.
pub fn spawn_binding<R: BindingRunner>(
    targets: Vec<TaskName>,
    runner: Arc<R>,
    debounce: Duration,
) -> BindingHandle {
    let label = targets.join("+");
    let (tx, rx) = mpsc::channel::<()>(1);
    let (state_tx, state_rx) = watch::channel(BindingState::Idle);
    let runs = Arc::new(AtomicU64::new(0));

    let worker = Worker {
        label: label.clone(),
        targets,
        runner,
        debounce,
        rx,
        state: state_tx,
        runs: Arc::clone(&runs),
        closed: false,
    };
    let join = tokio::spawn(worker.run());

    BindingHandle {
        trigger: BindingTrigger { label, tx },
        state: state_rx,
        runs,
        join,
    }
}

struct Worker<R> {
    label: String,
    targets: Vec<TaskName>,
    runner: Arc<R>,
    debounce: Duration,
    rx: mpsc::Receiver<()>,
    state: watch::Sender<BindingState>,
    runs: Arc<AtomicU64>,
    closed: bool,
}

impl<R: BindingRunner> Worker<R> {
    async fn run(mut self) {
        debug!(binding = %self.label, debounce_ms = self.debounce.as_millis() as u64, "binding worker started");

        while !self.closed {
            self.set(BindingState::Idle);
            if self.rx.recv().await.is_none() {
                break;
            }
            if !self.settle().await {
                break;
            }

            loop {
                self.set(BindingState::Running);
                let rerun = self.run_once().await;
                if self.closed || !rerun {
                    break;
                }
                debug!(binding = %self.label, "running again for changes made during the last run");
            }
        }

        self.set(BindingState::Stopped);
        debug!(binding = %self.label, "binding worker stopped");
    }

    /// Wait until no trigger arrived for a whole debounce window. Returns
    /// `false` if the channel closed meanwhile.
    async fn settle(&mut self) -> bool {
        loop {
            match tokio::time::timeout(self.debounce, self.rx.recv()).await {
                Ok(Some(())) => continue,
                Ok(None) => {
                    self.closed = true;
                    return false;
                }
                Err(_elapsed) => return true,
            }
        }
    }

    /// One run of the targets. Returns whether another run was requested
    /// while it was in flight.
    async fn run_once(&mut self) -> bool {
        info!(binding = %self.label, "change detected; running");
        let mut rerun = false;

        let result = {
            let run = self.runner.run_targets(&self.targets);
            tokio::pin!(run);
            loop {
                tokio::select! {
                    res = &mut run => break res,
                    msg = self.rx.recv(), if !self.closed => match msg {
                        Some(()) => {
                            if !rerun {
                                rerun = true;
                                let _ = self.state.send(BindingState::RerunPending);
                            }
                        }
                        None => self.closed = true,
                    },
                }
            }
        };

        self.runs.fetch_add(1, Ordering::SeqCst);
        match result {
            Ok(report) if report.is_success() => {
                info!(binding = %self.label, run_id = report.run_id, "rebuild succeeded");
            }
            Ok(report) => {
                let failed = report.first_failure().map(|o| o.task.clone());
                warn!(binding = %self.label, run_id = report.run_id, ?failed, "rebuild failed");
            }
            Err(e) => error!(binding = %self.label, error = %e, "could not start rebuild"),
        }
        rerun
    }

    fn set(&self, state: BindingState) {
        self.state.send_replace(state);
    }
}
