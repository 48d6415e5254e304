// src/watch/watcher.rs

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::fs::FileSystem;
use crate::watch::binding::BindingTrigger;
use crate::watch::cache::FileCache;
use crate::watch::hash::{HashStore, MemoryHashStore, compute_aggregate_hash};
use crate::watch::path_utils::relative_str;
use crate::watch::patterns::BindingProfile;

/// Routes changed paths to the bindings watching them.
///
/// Owned by the watcher's event loop; bindings are triggered without
/// waiting, so one busy binding never holds up another.
pub struct Dispatcher {
    root: PathBuf,
    fs: Arc<dyn FileSystem>,
    routes: Vec<(BindingProfile, BindingTrigger)>,
    cache: FileCache,
    hashes: Box<dyn HashStore>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("root", &self.root)
            .field("routes", &self.routes.len())
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    pub fn new(
        root: impl Into<PathBuf>,
        fs: Arc<dyn FileSystem>,
        routes: Vec<(BindingProfile, BindingTrigger)>,
    ) -> Self {
        let mut dispatcher = Self {
            root: root.into(),
            fs,
            routes,
            cache: FileCache::new(),
            hashes: Box::new(MemoryHashStore::new()),
        };
        dispatcher.seed_hashes();
        dispatcher
    }

    /// Record the current content hash of every `use_hash` binding, so
    /// that the first trigger needs a real change.
    fn seed_hashes(&mut self) {
        for i in 0..self.routes.len() {
            if !self.routes[i].0.use_hash() {
                continue;
            }
            match self.aggregate_hash(i) {
                Ok(hash) => {
                    let key = hash_key(&self.routes[i].0);
                    self.hashes.save(&key, &hash);
                }
                Err(e) => warn!(error = %e, "could not hash watched files"),
            }
        }
    }

    /// Handle one notify event. Only create/modify/remove events count.
    pub fn dispatch_event(&mut self, event: &Event) -> Vec<String> {
        if !matches!(
            event.kind,
            EventKind::Create(..) | EventKind::Modify(..) | EventKind::Remove(..)
        ) {
            return Vec::new();
        }

        let mut triggered = Vec::new();
        for path in &event.paths {
            for label in self.dispatch_path(path) {
                if !triggered.contains(&label) {
                    triggered.push(label);
                }
            }
        }
        triggered
    }

    /// Trigger every binding watching `path`. Returns the labels of the
    /// bindings triggered.
    pub fn dispatch_path(&mut self, path: &Path) -> Vec<String> {
        let Some(rel) = relative_str(&self.root, path) else {
            debug!(?path, root = ?self.root, "event outside the watch root");
            return Vec::new();
        };

        self.cache.invalidate(&self.root.join(&rel));

        let mut triggered = Vec::new();
        for i in 0..self.routes.len() {
            if !self.routes[i].0.matches(&rel) {
                continue;
            }
            if self.routes[i].0.use_hash() && !self.content_changed(i) {
                debug!(rel = %rel, binding = %self.routes[i].1.label(), "contents unchanged; skipping");
                continue;
            }

            let trigger = &self.routes[i].1;
            debug!(rel = %rel, binding = %trigger.label(), "triggering binding");
            if trigger.trigger() {
                triggered.push(trigger.label().to_string());
            }
        }
        triggered
    }

    fn content_changed(&mut self, i: usize) -> bool {
        let hash = match self.aggregate_hash(i) {
            Ok(hash) => hash,
            Err(e) => {
                warn!(error = %e, "hashing failed; assuming changed");
                return true;
            }
        };
        let key = hash_key(&self.routes[i].0);
        if self.hashes.load(&key).as_deref() == Some(hash.as_str()) {
            return false;
        }
        self.hashes.save(&key, &hash);
        true
    }

    fn aggregate_hash(&mut self, i: usize) -> Result<String> {
        let profile = &self.routes[i].0;
        let files = profile.matching_files(self.fs.as_ref(), &self.root)?;

        let mut entries = Vec::with_capacity(files.len());
        for rel in &files {
            let hash = self
                .cache
                .get_or_compute(self.fs.as_ref(), &self.root.join(rel))?;
            entries.push((rel.as_path(), hash));
        }
        Ok(compute_aggregate_hash(
            entries.iter().map(|(p, h)| (*p, h.as_str())),
        ))
    }
}

fn hash_key(profile: &BindingProfile) -> String {
    format!("{}#{}", profile.binding().label(), profile.index())
}

/// Handle for the filesystem watcher.
///
/// Dropping it (or calling [`WatcherHandle::stop`]) stops file watching and
/// drops the dispatcher together with its binding triggers.
pub struct WatcherHandle {
    inner: Option<RecommendedWatcher>,
    event_loop: JoinHandle<()>,
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle").finish_non_exhaustive()
    }
}

impl WatcherHandle {
    pub async fn stop(mut self) {
        self.inner.take();
        self.event_loop.abort();
        let _ = (&mut self.event_loop).await;
    }
}

impl Drop for WatcherHandle {
    fn drop(&mut self) {
        self.event_loop.abort();
    }
}

/// Spawn a filesystem watcher that observes `root` recursively and feeds
/// every event to `dispatcher`.
pub fn spawn_watcher(root: &Path, mut dispatcher: Dispatcher) -> Result<WatcherHandle> {
    // Channel from the blocking notify callback into the async world.
    let (event_tx, mut event_rx) = tokio::sync::mpsc::unbounded_channel::<Event>();

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                let _ = event_tx.send(event);
            }
            Err(err) => warn!(error = %err, "file watch error"),
        },
        Config::default(),
    )?;

    watcher.watch(root, RecursiveMode::Recursive)?;
    info!("file watcher started on {:?}", root);

    let event_loop = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            debug!(?event, "received notify event");
            let triggered = dispatcher.dispatch_event(&event);
            if !triggered.is_empty() {
                debug!(?triggered, "bindings triggered");
            }
        }
        debug!("watcher event loop finished");
    });

    Ok(WatcherHandle {
        inner: Some(watcher),
        event_loop,
    })
}
