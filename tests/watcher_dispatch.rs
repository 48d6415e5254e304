// tests/watcher_dispatch.rs

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use notify::event::{AccessKind, CreateKind, ModifyKind};
use notify::{Event, EventKind};
use tempfile::TempDir;

use assetdag::errors::{AssetdagError, Result};
use assetdag::fs::mock::MockFileSystem;
use assetdag::types::{RunReport, RunStatus, TaskName};
use assetdag::watch::cache::FileCache;
use assetdag::watch::hash::{compute_aggregate_hash, compute_file_hash};
use assetdag::watch::path_utils::relative_str;
use assetdag::watch::{
    BindingHandle, BindingRunner, Dispatcher, WatchBinding, build_profiles, spawn_binding,
    start_watch,
};
use assetdag_test_utils::{init_tracing, with_timeout, write_file};

#[derive(Default)]
struct NoopRunner {
    runs: AtomicUsize,
}

impl BindingRunner for NoopRunner {
    fn run_targets<'a>(
        &'a self,
        targets: &'a [TaskName],
    ) -> Pin<Box<dyn Future<Output = Result<RunReport>> + Send + 'a>> {
        Box::pin(async move {
            let run_id = self.runs.fetch_add(1, Ordering::SeqCst) as u64 + 1;
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

fn project() -> MockFileSystem {
    let fs = MockFileSystem::new();
    fs.add_file("./assets/sass/app.scss", b".a { color: red; }".to_vec());
    fs.add_file("./assets/js/app/main.js", b"main();".to_vec());
    fs.add_file("./assets/js/app/main.test.js", b"test();".to_vec());
    fs
}

fn bindings() -> Vec<WatchBinding> {
    vec![
        WatchBinding::new(["assets/sass/**/*.scss"], ["styles"]),
        WatchBinding::new(["assets/js/app/**/*.js"], ["jsHint", "js"])
            .exclude(["**/*.test.js"])
            .use_hash(true),
    ]
}

/// Dispatcher over `fs` with one worker per binding. The debounce is long
/// enough that no run starts during a test.
fn dispatcher(fs: &MockFileSystem) -> (Dispatcher, Vec<BindingHandle>) {
    let runner = Arc::new(NoopRunner::default());
    let profiles = build_profiles(&bindings()).unwrap();
    let handles: Vec<BindingHandle> = profiles
        .iter()
        .map(|p| spawn_binding(p.binding().run.clone(), runner.clone(), Duration::from_secs(60)))
        .collect();
    let routes = profiles
        .into_iter()
        .zip(handles.iter().map(BindingHandle::trigger_handle))
        .collect();
    (Dispatcher::new(".", Arc::new(fs.clone()), routes), handles)
}

#[tokio::test]
async fn test_paths_route_to_matching_bindings_only() {
    let fs = project();
    let (mut dispatcher, _handles) = dispatcher(&fs);

    assert_eq!(
        dispatcher.dispatch_path(Path::new("./assets/sass/app.scss")),
        vec!["styles".to_string()]
    );
    assert!(dispatcher.dispatch_path(Path::new("./assets/js/app/main.test.js")).is_empty());
    assert!(dispatcher.dispatch_path(Path::new("./README.md")).is_empty());
}

#[tokio::test]
async fn test_hashed_binding_ignores_unchanged_contents() {
    let fs = project();
    let (mut dispatcher, _handles) = dispatcher(&fs);
    let main = Path::new("./assets/js/app/main.js");

    // Saved without changes.
    assert!(dispatcher.dispatch_path(main).is_empty());

    fs.add_file(main, b"main(1);".to_vec());
    assert_eq!(dispatcher.dispatch_path(main), vec!["jsHint+js".to_string()]);

    // Same contents as the last triggered run.
    assert!(dispatcher.dispatch_path(main).is_empty());
}

#[tokio::test]
async fn test_new_file_changes_the_aggregate_hash() {
    let fs = project();
    let (mut dispatcher, _handles) = dispatcher(&fs);

    fs.add_file("./assets/js/app/extra.js", b"main();".to_vec());

    assert_eq!(
        dispatcher.dispatch_path(Path::new("./assets/js/app/extra.js")),
        vec!["jsHint+js".to_string()]
    );
}

#[tokio::test]
async fn test_only_content_events_trigger() {
    let fs = project();
    let (mut dispatcher, _handles) = dispatcher(&fs);
    let path = PathBuf::from("./assets/sass/app.scss");

    let access = Event::new(EventKind::Access(AccessKind::Any)).add_path(path.clone());
    assert!(dispatcher.dispatch_event(&access).is_empty());

    let modify = Event::new(EventKind::Modify(ModifyKind::Any))
        .add_path(path.clone())
        .add_path(path.clone());
    assert_eq!(dispatcher.dispatch_event(&modify), vec!["styles".to_string()]);

    let create = Event::new(EventKind::Create(CreateKind::File)).add_path(path);
    assert_eq!(dispatcher.dispatch_event(&create), vec!["styles".to_string()]);
}

#[test]
fn test_relative_str_uses_forward_slashes() {
    assert_eq!(
        relative_str(Path::new("/project"), Path::new("/project/assets/js/app.js")).as_deref(),
        Some("assets/js/app.js")
    );
    assert_eq!(relative_str(Path::new("/project"), Path::new("/elsewhere/app.js")), None);
}

#[tokio::test]
async fn test_invalid_binding_pattern_fails_to_start() {
    let dir = TempDir::new().unwrap();
    let runner = Arc::new(NoopRunner::default());
    let bindings = vec![WatchBinding::new(["assets/[js"], ["js"])];

    let result = start_watch(dir.path(), &bindings, runner, Duration::from_millis(20));

    assert!(matches!(result, Err(AssetdagError::WatchStart(_))), "{result:?}");
}

#[tokio::test]
async fn test_file_change_on_disk_runs_the_binding() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "assets/sass/app.scss", ".a { color: red; }");
    let runner = Arc::new(NoopRunner::default());
    let bindings = vec![WatchBinding::new(["assets/sass/**/*.scss"], ["styles"])];

    let session = start_watch(dir.path(), &bindings, runner.clone(), Duration::from_millis(20))
        .unwrap();
    // Give the platform watcher a moment to register.
    tokio::time::sleep(Duration::from_millis(100)).await;
    write_file(dir.path(), "assets/sass/app.scss", ".a { color: blue; }");

    with_timeout(async {
        while session.bindings()[0].runs_completed() == 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;

    assert!(runner.runs.load(Ordering::SeqCst) >= 1);
    with_timeout(session.shutdown()).await;
}

#[test]
fn test_file_hash_is_blake3_of_contents() {
    let fs = MockFileSystem::new();
    fs.add_file("test.txt", b"hello world".to_vec());

    let hash = compute_file_hash(&fs, Path::new("test.txt")).unwrap();

    assert_eq!(hash, "d74981efa70a0c880b8d8c1985d075dbcbf679b99a5f9914e5aaf96b831a9e24");
}

#[test]
fn test_cache_serves_stale_hash_until_invalidated() {
    let fs = MockFileSystem::new();
    let path = Path::new("./assets/app.js");
    fs.add_file(path, b"one".to_vec());
    let mut cache = FileCache::new();

    let first = cache.get_or_compute(&fs, path).unwrap();
    fs.add_file(path, b"two".to_vec());
    assert_eq!(cache.get_or_compute(&fs, path).unwrap(), first);

    cache.invalidate(path);
    assert_ne!(cache.get_or_compute(&fs, path).unwrap(), first);
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_aggregate_hash_depends_on_paths() {
    let a = compute_aggregate_hash([(Path::new("a.js"), "h1")]);
    let b = compute_aggregate_hash([(Path::new("b.js"), "h1")]);

    assert_ne!(a, b);
    assert_eq!(a, compute_aggregate_hash([(Path::new("a.js"), "h1")]));
}
