use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use assetdag::dag::ScheduledTask;
use assetdag::engine::RuntimeEvent;
use assetdag::errors::{Result, TaskError};
use assetdag::exec::ExecutorBackend;
use assetdag::types::RunOutcome;

#[derive(Debug, Default)]
struct FakeState {
    /// Every dispatch call, one entry per batch.
    batches: Vec<Vec<String>>,
    running: HashMap<String, usize>,
    max_running: HashMap<String, usize>,
    running_total: usize,
    max_running_total: usize,
}

/// A fake executor that:
/// - records which tasks were dispatched, batch by batch
/// - "runs" each task for a configurable delay, tracking concurrency
/// - reports `TaskCompleted`, failed for the task names it was told to fail.
#[derive(Debug, Clone, Default)]
pub struct FakeExecutor {
    failing: Arc<HashSet<String>>,
    delay: Duration,
    state: Arc<Mutex<FakeState>>,
}

impl FakeExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tasks with these names complete with a transform error.
    pub fn failing<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.failing = Arc::new(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Dispatched task names, flattened in dispatch order.
    pub fn dispatched(&self) -> Vec<String> {
        self.state.lock().unwrap().batches.concat()
    }

    /// Dispatched task names, one entry per dispatch call (i.e. per phase).
    pub fn batches(&self) -> Vec<Vec<String>> {
        self.state.lock().unwrap().batches.clone()
    }

    pub fn dispatch_count(&self, name: &str) -> usize {
        self.dispatched().iter().filter(|n| *n == name).count()
    }

    /// Highest number of simultaneous executions of `name` seen.
    pub fn max_concurrency(&self, name: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .max_running
            .get(name)
            .copied()
            .unwrap_or(0)
    }

    /// Highest number of simultaneous executions of any tasks seen.
    pub fn max_total_concurrency(&self) -> usize {
        self.state.lock().unwrap().max_running_total
    }

    fn outcome_for(&self, name: &str) -> RunOutcome {
        if self.failing.contains(name) {
            RunOutcome::failed(
                name,
                TaskError::Transform {
                    stage: "fake".to_string(),
                    message: format!("{name} failed on purpose"),
                },
            )
        } else {
            RunOutcome::success(name, Vec::new())
        }
    }
}

impl ExecutorBackend for FakeExecutor {
    fn spawn_ready_tasks(
        &self,
        tasks: Vec<ScheduledTask>,
        runtime_tx: mpsc::Sender<RuntimeEvent>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        {
            let mut state = self.state.lock().unwrap();
            state
                .batches
                .push(tasks.iter().map(|t| t.name().to_string()).collect());
        }

        Box::pin(async move {
            for t in tasks {
                let name = t.name().to_string();
                let outcome = self.outcome_for(&name);
                let state = Arc::clone(&self.state);
                let delay = self.delay;
                let tx = runtime_tx.clone();

                {
                    let mut s = state.lock().unwrap();
                    let running = s.running.entry(name.clone()).or_default();
                    *running += 1;
                    let now = *running;
                    let max = s.max_running.entry(name.clone()).or_default();
                    *max = (*max).max(now);
                    s.running_total += 1;
                    s.max_running_total = s.max_running_total.max(s.running_total);
                }

                tokio::spawn(async move {
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    {
                        let mut s = state.lock().unwrap();
                        if let Some(running) = s.running.get_mut(&name) {
                            *running -= 1;
                        }
                        s.running_total -= 1;
                    }
                    let _ = tx.send(RuntimeEvent::TaskCompleted { outcome }).await;
                });
            }
            Ok(())
        })
    }
}
