// tests/watch_bindings.rs

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::anyhow;
use tokio::sync::Semaphore;

use assetdag::engine::BuildRunner;
use assetdag::errors::{AssetdagError, Result};
use assetdag::types::{RunReport, RunStatus, TaskName};
use assetdag::watch::{BindingRunner, BindingState, spawn_binding};
use assetdag_test_utils::{FakeExecutor, GraphBuilder, init_tracing, with_timeout};

const DEBOUNCE: Duration = Duration::from_millis(50);

/// Counts runs and how many were in flight at once.
#[derive(Default)]
struct CountingRunner {
    delay: Duration,
    fail: bool,
    started: AtomicUsize,
    finished: AtomicUsize,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl CountingRunner {
    fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }
}

impl BindingRunner for CountingRunner {
    fn run_targets<'a>(
        &'a self,
        targets: &'a [TaskName],
    ) -> Pin<Box<dyn Future<Output = Result<RunReport>> + Send + 'a>> {
        Box::pin(async move {
            let run_id = self.started.fetch_add(1, Ordering::SeqCst) as u64 + 1;
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(now, Ordering::SeqCst);

            tokio::time::sleep(self.delay).await;

            self.active.fetch_sub(1, Ordering::SeqCst);
            self.finished.fetch_add(1, Ordering::SeqCst);

            if self.fail {
                return Err(AssetdagError::Other(anyhow!("runner unavailable")));
            }
            Ok(RunReport {
                entry: targets.join("+"),
                run_id,
                status: RunStatus::Success,
                outcomes: Vec::new(),
                phases_total: 0,
                phases_completed: 0,
                cancelled: false,
            })
        })
    }
}

fn targets(names: &[&str]) -> Vec<TaskName> {
    names.iter().map(|s| s.to_string()).collect()
}

async fn wait_until(mut cond: impl FnMut() -> bool) {
    with_timeout(async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
}

#[tokio::test]
async fn test_burst_of_triggers_runs_once() {
    init_tracing();
    let runner = Arc::new(CountingRunner::default());
    let handle = spawn_binding(targets(&["styles"]), runner.clone(), DEBOUNCE);

    for _ in 0..5 {
        assert!(handle.trigger());
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    wait_until(|| runner.finished() == 1).await;
    // Longer than the debounce window: nothing else may follow.
    tokio::time::sleep(DEBOUNCE * 4).await;

    assert_eq!(runner.finished(), 1);
    assert_eq!(handle.runs_completed(), 1);
    assert_eq!(handle.state(), BindingState::Idle);
    handle.shutdown().await;
}

#[tokio::test]
async fn test_triggers_during_a_run_collapse_into_one_rerun() {
    init_tracing();
    let runner = Arc::new(CountingRunner::with_delay(Duration::from_millis(150)));
    let handle = spawn_binding(targets(&["js"]), runner.clone(), DEBOUNCE);
    let mut state = handle.subscribe();

    handle.trigger();
    with_timeout(state.wait_for(|s| *s == BindingState::Running))
        .await
        .unwrap();

    for _ in 0..3 {
        handle.trigger();
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    with_timeout(state.wait_for(|s| *s == BindingState::RerunPending))
        .await
        .unwrap();
    with_timeout(state.wait_for(|s| *s == BindingState::Idle))
        .await
        .unwrap();
    tokio::time::sleep(DEBOUNCE * 4).await;

    assert_eq!(runner.finished(), 2);
    assert_eq!(runner.max_active.load(Ordering::SeqCst), 1);
    handle.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_lets_the_running_build_finish() {
    init_tracing();
    let runner = Arc::new(CountingRunner::with_delay(Duration::from_millis(100)));
    let handle = spawn_binding(targets(&["styles"]), runner.clone(), DEBOUNCE);
    let mut state = handle.subscribe();

    handle.trigger();
    with_timeout(state.wait_for(|s| *s == BindingState::Running))
        .await
        .unwrap();

    with_timeout(handle.shutdown()).await;

    assert_eq!(runner.finished(), 1);
    assert_eq!(*state.borrow(), BindingState::Stopped);
}

#[tokio::test]
async fn test_shutdown_during_debounce_drops_the_pending_run() {
    init_tracing();
    let runner = Arc::new(CountingRunner::default());
    let handle = spawn_binding(targets(&["styles"]), runner.clone(), Duration::from_secs(1));
    let state = handle.subscribe();

    handle.trigger();
    tokio::time::sleep(Duration::from_millis(20)).await;
    with_timeout(handle.shutdown()).await;

    assert_eq!(runner.started.load(Ordering::SeqCst), 0);
    assert_eq!(*state.borrow(), BindingState::Stopped);
}

#[tokio::test]
async fn test_runner_error_does_not_stop_the_binding() {
    init_tracing();
    let runner = Arc::new(CountingRunner::failing());
    let handle = spawn_binding(targets(&["styles"]), runner.clone(), DEBOUNCE);

    handle.trigger();
    wait_until(|| handle.runs_completed() == 1).await;
    handle.trigger();
    wait_until(|| handle.runs_completed() == 2).await;

    assert_eq!(runner.finished(), 2);
    handle.shutdown().await;
}

#[tokio::test]
async fn test_build_runner_runs_targets_in_sequence() {
    init_tracing();
    let graph = GraphBuilder::new().task("styles").task("js").task("jsHint").build();
    let executor = FakeExecutor::new();
    let runner = Arc::new(BuildRunner::with_executor(graph, executor.clone()));

    let handle = spawn_binding(targets(&["jsHint", "js"]), runner, DEBOUNCE);
    handle.trigger();
    wait_until(|| handle.runs_completed() == 1).await;

    assert_eq!(
        executor.batches(),
        vec![vec!["jsHint".to_string()], vec!["js".to_string()]]
    );
    handle.shutdown().await;
}

/// Blocks every run until a permit is released.
struct GatedRunner {
    gate: Semaphore,
    inner: CountingRunner,
}

impl BindingRunner for GatedRunner {
    fn run_targets<'a>(
        &'a self,
        targets: &'a [TaskName],
    ) -> Pin<Box<dyn Future<Output = Result<RunReport>> + Send + 'a>> {
        Box::pin(async move {
            let permit = self
                .gate
                .acquire()
                .await
                .map_err(|e| AssetdagError::Other(anyhow!(e)))?;
            permit.forget();
            self.inner.run_targets(targets).await
        })
    }
}

#[tokio::test]
async fn test_bindings_do_not_wait_for_each_other() {
    init_tracing();
    let blocked = Arc::new(GatedRunner {
        gate: Semaphore::new(0),
        inner: CountingRunner::default(),
    });
    let free = Arc::new(CountingRunner::default());
    let styles = spawn_binding(targets(&["styles"]), blocked.clone(), DEBOUNCE);
    let js = spawn_binding(targets(&["js"]), free.clone(), DEBOUNCE);
    let mut styles_state = styles.subscribe();

    styles.trigger();
    with_timeout(styles_state.wait_for(|s| *s == BindingState::Running))
        .await
        .unwrap();

    js.trigger();
    wait_until(|| js.runs_completed() == 1).await;

    assert_eq!(free.finished(), 1);
    assert_eq!(styles.state(), BindingState::Running);
    assert_eq!(blocked.inner.finished(), 0);

    blocked.gate.add_permits(1);
    wait_until(|| styles.runs_completed() == 1).await;
    assert_eq!(blocked.inner.finished(), 1);

    styles.shutdown().await;
    js.shutdown().await;
}
