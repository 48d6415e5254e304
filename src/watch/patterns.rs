// src/watch/patterns.rs

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Result, bail};

use crate::fs::FileSystem;
use crate::pipeline::SourceSelector;
use crate::types::TaskName;

/// A standing rule: when a file matching `patterns` (and not `exclude`)
/// changes, run `run` (a sequence of task/group names).
///
/// ```toml
/// [[watch]]
/// patterns = ["assets/js/app/**/*.js"]
/// run = ["js"]
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchBinding {
    pub patterns: Vec<String>,
    pub exclude: Vec<String>,
    pub run: Vec<TaskName>,
    /// Only trigger when the aggregate content hash of the matched files
    /// changed.
    pub use_hash: bool,
}

impl WatchBinding {
    pub fn new<P, R>(patterns: P, run: R) -> Self
    where
        P: IntoIterator,
        P::Item: Into<String>,
        R: IntoIterator,
        R::Item: Into<TaskName>,
    {
        Self {
            patterns: patterns.into_iter().map(Into::into).collect(),
            exclude: Vec::new(),
            run: run.into_iter().map(Into::into).collect(),
            use_hash: false,
        }
    }

    pub fn exclude<P>(mut self, patterns: P) -> Self
    where
        P: IntoIterator,
        P::Item: Into<String>,
    {
        self.exclude = patterns.into_iter().map(Into::into).collect();
        self
    }

    pub fn use_hash(mut self, use_hash: bool) -> Self {
        self.use_hash = use_hash;
        self
    }

    /// Name used in logs: the targets joined with `+`.
    pub fn label(&self) -> String {
        self.run.join("+")
    }
}

/// Compiled patterns for a single binding.
///
/// The patterns are relative to the project root; the watcher passes
/// relative paths (e.g. `"assets/sass/app.scss"`) into `matches`.
#[derive(Clone)]
pub struct BindingProfile {
    index: usize,
    binding: WatchBinding,
    selector: SourceSelector,
}

impl fmt::Debug for BindingProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingProfile")
            .field("index", &self.index)
            .field("run", &self.binding.run)
            .finish_non_exhaustive()
    }
}

impl BindingProfile {
    pub fn new(index: usize, binding: WatchBinding) -> Result<Self> {
        if binding.patterns.is_empty() {
            bail!("watch binding #{index} has no patterns");
        }
        if binding.run.is_empty() {
            bail!("watch binding #{index} has nothing to run");
        }
        let selector = SourceSelector::new(&binding.patterns, &binding.exclude)?;
        Ok(Self {
            index,
            binding,
            selector,
        })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn binding(&self) -> &WatchBinding {
        &self.binding
    }

    pub fn use_hash(&self) -> bool {
        self.binding.use_hash
    }

    /// Whether a root-relative path (forward slashes) is watched by this
    /// binding.
    pub fn matches(&self, rel_path: &str) -> bool {
        self.selector.matches(rel_path)
    }

    /// Every file currently matching, root-relative.
    pub fn matching_files(&self, fs: &dyn FileSystem, root: &Path) -> Result<Vec<PathBuf>> {
        Ok(self
            .selector
            .matching_paths(fs, root)?
            .into_iter()
            .map(|(rel, _)| rel)
            .collect())
    }
}

/// Compile every binding, in declaration order.
pub fn build_profiles(bindings: &[WatchBinding]) -> Result<Vec<BindingProfile>> {
    bindings
        .iter()
        .cloned()
        .enumerate()
        .map(|(i, b)| BindingProfile::new(i, b))
        .collect()
}
