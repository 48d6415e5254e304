// src/pipeline/output.rs

//! Destination writes.
//!
//! Every file is first written to a temporary file next to its final
//! location; only when all of them were written are they renamed into
//! place. A failure before the rename step leaves every destination
//! untouched. If a rename fails, the files already renamed are restored to
//! their previous contents (or removed when they did not exist).

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::errors::TaskError;
use crate::pipeline::fileset::FileSet;

/// Files queued for one task, keyed by root-relative destination path.
/// Insertion order is kept; a later write to the same path replaces the
/// earlier contents.
#[derive(Debug, Default)]
pub struct PendingWrites {
    order: Vec<PathBuf>,
    contents: HashMap<PathBuf, Vec<u8>>,
}

impl PendingWrites {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a snapshot of `files` under `dest`.
    pub fn queue(&mut self, dest: &Path, files: &FileSet) {
        for file in files {
            let target = dest.join(&file.relative);
            if self
                .contents
                .insert(target.clone(), file.contents.clone())
                .is_none()
            {
                self.order.push(target);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Write everything under `root`. Returns the root-relative paths
    /// written, in queue order.
    pub fn commit(mut self, root: &Path) -> Result<Vec<PathBuf>, TaskError> {
        let mut staged = Vec::with_capacity(self.order.len());

        for rel in &self.order {
            let contents = self.contents.remove(rel).unwrap_or_default();
            let target = root.join(rel);
            let temp = stage_file(&target, &contents).map_err(|e| TaskError::Write {
                path: rel.clone(),
                message: e.to_string(),
            })?;
            let previous = fs::read(&target).ok();
            staged.push((rel, target, temp, previous));
        }

        let mut persisted: Vec<(PathBuf, Option<Vec<u8>>)> = Vec::with_capacity(staged.len());
        for (rel, target, temp, previous) in staged {
            if let Err(e) = temp.persist(&target) {
                rollback(persisted);
                return Err(TaskError::Write {
                    path: rel.clone(),
                    message: e.error.to_string(),
                });
            }
            debug!(path = ?rel, "wrote destination file");
            persisted.push((target, previous));
        }

        Ok(self.order)
    }
}

/// Put back what was at each target before this commit.
fn rollback(persisted: Vec<(PathBuf, Option<Vec<u8>>)>) {
    for (target, previous) in persisted.into_iter().rev() {
        let result = match previous {
            Some(contents) => stage_file(&target, &contents).and_then(|temp| {
                temp.persist(&target).map(drop).map_err(|e| e.error)
            }),
            None => fs::remove_file(&target),
        };
        match result {
            Ok(()) => debug!(path = ?target, "rolled back destination file"),
            Err(e) => warn!(path = ?target, error = %e, "failed to roll back destination file"),
        }
    }
}

fn stage_file(target: &Path, contents: &[u8]) -> std::io::Result<NamedTempFile> {
    let dir = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir)?;

    let mut temp = tempfile::Builder::new()
        .prefix(".assetdag-")
        .suffix(".tmp")
        .tempfile_in(&dir)?;
    temp.write_all(contents)?;
    temp.as_file().sync_all()?;
    Ok(temp)
}
