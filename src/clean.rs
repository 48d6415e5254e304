// src/clean.rs

//! Destructive cleanup action.
//!
//! `remove` entries without glob characters name a file or directory
//! directly. Glob entries are matched against every file and directory of
//! the tree; a matching directory is removed wholesale and not descended
//! into. Protected paths are never walked and never removed. Symlinks are
//! removed as links and never followed.

use std::path::{Component, Path, PathBuf};

use anyhow::Result;
use globset::GlobSet;
use tracing::{debug, warn};

use crate::errors::TaskError;
use crate::fs::FileSystem;
use crate::pipeline::ExecContext;
use crate::pipeline::sources::{build_globset, glob_base, slash_path};

pub const DEFAULT_PROTECT: &[&str] = &["node_modules", ".git"];

#[derive(Debug, Clone)]
pub struct CleanSpec {
    /// Literal root-relative paths.
    literal: Vec<PathBuf>,
    glob_patterns: Vec<String>,
    globs: Option<GlobSet>,
    protect_patterns: Vec<String>,
    protect: GlobSet,
}

impl CleanSpec {
    /// `!pattern` entries in `remove` are added to the protect list.
    pub fn new(remove: &[String], protect: &[String]) -> Result<Self> {
        let mut literal = Vec::new();
        let mut glob_patterns = Vec::new();
        let mut protect_patterns: Vec<String> = protect.iter().map(|p| normalize(p)).collect();

        for raw in remove {
            if let Some(negated) = raw.strip_prefix('!') {
                protect_patterns.push(normalize(negated));
                continue;
            }
            let pattern = normalize(raw);
            if glob_base(&pattern).1 {
                literal.push(PathBuf::from(pattern));
            } else {
                glob_patterns.push(pattern);
            }
        }

        let globs = if glob_patterns.is_empty() {
            None
        } else {
            Some(build_globset(glob_patterns.iter().map(String::as_str))?)
        };

        // Protect both the path itself and everything beneath it.
        let mut protect_globs = Vec::with_capacity(protect_patterns.len() * 2);
        for p in &protect_patterns {
            let base = p.strip_suffix("/**").unwrap_or(p);
            protect_globs.push(base.to_string());
            protect_globs.push(format!("{base}/**"));
        }
        let protect = build_globset(protect_globs.iter().map(String::as_str))?;

        Ok(Self {
            literal,
            glob_patterns,
            globs,
            protect_patterns,
            protect,
        })
    }

    /// Remove patterns with the default protect list.
    pub fn with_default_protect(remove: &[String]) -> Result<Self> {
        let protect: Vec<String> = DEFAULT_PROTECT.iter().map(|s| s.to_string()).collect();
        Self::new(remove, &protect)
    }

    /// Literal targets; these count as the task's destinations.
    pub fn literal_targets(&self) -> &[PathBuf] {
        &self.literal
    }

    pub fn glob_patterns(&self) -> &[String] {
        &self.glob_patterns
    }

    pub fn protect_patterns(&self) -> &[String] {
        &self.protect_patterns
    }

    pub fn is_protected(&self, rel: &Path) -> bool {
        // The project root itself.
        if rel.components().all(|c| matches!(c, Component::CurDir)) {
            return true;
        }
        if self.protect.is_match(slash_path(rel)) {
            return true;
        }
        // A target that contains a protected literal path.
        self.protect_patterns
            .iter()
            .filter(|p| glob_base(p).1)
            .any(|p| Path::new(p).starts_with(rel))
    }

    /// Root-relative paths that would be removed, sorted, without
    /// touching anything.
    pub fn targets(&self, ctx: &ExecContext) -> Result<Vec<PathBuf>> {
        let fs = ctx.fs.as_ref();
        let mut targets = Vec::new();

        for rel in &self.literal {
            if !fs.exists(&ctx.root.join(rel)) {
                continue;
            }
            if self.is_protected(rel) {
                warn!(path = ?rel, "refusing to remove protected path");
                continue;
            }
            if let Some(link) = linked_ancestor(fs, &ctx.root, rel) {
                warn!(path = ?rel, link = ?link, "refusing to remove a path behind a symlink");
                continue;
            }
            targets.push(rel.clone());
        }

        if let Some(globs) = &self.globs {
            let mut stack = vec![ctx.root.clone()];
            while let Some(dir) = stack.pop() {
                for path in fs.read_dir(&dir)? {
                    let Ok(rel) = path.strip_prefix(&ctx.root) else {
                        continue;
                    };
                    let rel = rel.to_path_buf();
                    if self.is_protected(&rel) {
                        continue;
                    }
                    let is_dir = fs.is_dir(&path) && !fs.is_symlink(&path);
                    if globs.is_match(slash_path(&rel)) {
                        targets.push(rel);
                    } else if is_dir {
                        stack.push(path);
                    }
                }
            }
        }

        targets.sort();
        targets.dedup();
        // Drop targets already covered by a removed ancestor.
        let mut pruned: Vec<PathBuf> = Vec::with_capacity(targets.len());
        for target in targets {
            if !pruned.iter().any(|kept| target.starts_with(kept)) {
                pruned.push(target);
            }
        }
        Ok(pruned)
    }

    /// Remove every target. Returns the root-relative paths removed.
    pub fn execute(&self, ctx: &ExecContext) -> Result<Vec<PathBuf>, TaskError> {
        let targets = self.targets(ctx).map_err(|e| TaskError::Read {
            path: ctx.root.clone(),
            message: format!("{e:#}"),
        })?;

        let fs = ctx.fs.as_ref();
        let mut removed = Vec::with_capacity(targets.len());
        for rel in targets {
            let path = ctx.root.join(&rel);
            // A link is removed itself, never what it points to.
            let result = if fs.is_dir(&path) && !fs.is_symlink(&path) {
                fs.remove_dir_all(&path)
            } else {
                fs.remove_file(&path)
            };
            result.map_err(|e| TaskError::Remove {
                path: rel.clone(),
                message: format!("{e:#}"),
            })?;
            debug!(path = ?rel, "removed");
            removed.push(rel);
        }
        Ok(removed)
    }
}

/// First proper ancestor of `rel` (below the root) that is a symlink.
fn linked_ancestor(fs: &dyn FileSystem, root: &Path, rel: &Path) -> Option<PathBuf> {
    rel.ancestors()
        .skip(1)
        .filter(|a| !a.as_os_str().is_empty())
        .find(|a| fs.is_symlink(&root.join(a)))
        .map(Path::to_path_buf)
}

fn normalize(pattern: &str) -> String {
    pattern
        .trim()
        .trim_start_matches("./")
        .trim_end_matches('/')
        .to_string()
}
