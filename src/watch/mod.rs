// src/watch/mod.rs

//! File watching and change detection.
//!
//! This module is responsible for:
//! - Compiling the glob patterns of each watch binding.
//! - Wiring up a cross-platform filesystem watcher (`notify`).
//! - Running one debounced worker per binding that re-runs the binding's
//!   targets, never concurrently with itself.
//! - (Optionally) content hashing, so a binding does not re-run when its
//!   files haven't actually changed.
//!
//! It does **not** know how targets are resolved or executed; it only turns
//! filesystem changes into runs through a [`BindingRunner`].

pub mod binding;
pub mod cache;
pub mod hash;
pub mod path_utils;
pub mod patterns;
pub mod watcher;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::errors::{AssetdagError, Result};
use crate::fs::{FileSystem, RealFileSystem};

pub use binding::{BindingHandle, BindingRunner, BindingState, BindingTrigger, spawn_binding};
pub use patterns::{BindingProfile, WatchBinding, build_profiles};
pub use watcher::{Dispatcher, WatcherHandle, spawn_watcher};

/// A running watch session: the filesystem watcher plus one worker per
/// binding.
#[derive(Debug)]
pub struct WatchSession {
    watcher: WatcherHandle,
    bindings: Vec<BindingHandle>,
}

impl WatchSession {
    pub fn bindings(&self) -> &[BindingHandle] {
        &self.bindings
    }

    /// Stop watching, let in-flight runs finish, and wait for every binding
    /// to reach `Stopped`.
    pub async fn shutdown(self) {
        let WatchSession { watcher, bindings } = self;
        watcher.stop().await;
        for binding in bindings {
            binding.shutdown().await;
        }
        info!("watch session stopped");
    }
}

/// Start watching `root` for the given bindings.
///
/// Fails with [`AssetdagError::WatchStart`] if a binding's patterns do not
/// compile or the platform watcher cannot be set up. Nothing keeps running
/// in that case.
pub fn start_watch<R: BindingRunner>(
    root: impl Into<PathBuf>,
    bindings: &[WatchBinding],
    runner: Arc<R>,
    debounce: Duration,
) -> Result<WatchSession> {
    let root = root.into();
    let root = root.canonicalize().unwrap_or(root);

    let profiles =
        build_profiles(bindings).map_err(|e| AssetdagError::WatchStart(format!("{e:#}")))?;

    let handles: Vec<BindingHandle> = profiles
        .iter()
        .map(|p| spawn_binding(p.binding().run.clone(), Arc::clone(&runner), debounce))
        .collect();

    let routes = profiles
        .into_iter()
        .zip(handles.iter().map(BindingHandle::trigger_handle))
        .collect();
    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let dispatcher = Dispatcher::new(root.clone(), fs, routes);

    let watcher = spawn_watcher(&root, dispatcher)
        .map_err(|e| AssetdagError::WatchStart(format!("{e:#}")))?;

    info!(
        root = ?root,
        bindings = handles.len(),
        debounce_ms = debounce.as_millis() as u64,
        "watching for changes"
    );

    Ok(WatchSession {
        watcher,
        bindings: handles,
    })
}
