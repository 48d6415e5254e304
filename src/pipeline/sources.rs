// src/pipeline/sources.rs

//! Source selection: an ordered allow-list of glob patterns plus a deny-list,
//! evaluated against the file tree on every invocation.
//!
//! - `*` never crosses `/`, `**` does.
//! - A pattern prefixed with `!` in the allow-list is moved to the deny-list.
//! - Deny patterns ending in `/**` also prune the directory walk, and any
//!   directory matched by a deny pattern is not descended into.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::{Glob, GlobBuilder, GlobMatcher, GlobSet, GlobSetBuilder};
use tracing::debug;

use crate::fs::{walk_files, FileSystem};
use crate::pipeline::fileset::{FileSet, SourceFile};

#[derive(Clone)]
struct IncludeGlob {
    pattern: String,
    /// Literal directory prefix of the pattern; destination paths are
    /// computed relative to it.
    base: PathBuf,
    /// Pattern without any glob metacharacters (a single file).
    literal: bool,
    matcher: GlobMatcher,
}

/// Compiled allow-list / deny-list pair.
#[derive(Clone)]
pub struct SourceSelector {
    include: Vec<IncludeGlob>,
    exclude_patterns: Vec<String>,
    exclude: Option<GlobSet>,
    prune: Option<GlobSet>,
}

impl fmt::Debug for SourceSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceSelector")
            .field("include", &self.patterns())
            .field("exclude", &self.exclude_patterns)
            .finish_non_exhaustive()
    }
}

impl SourceSelector {
    pub fn new(include: &[String], exclude: &[String]) -> Result<Self> {
        let mut include_globs = Vec::with_capacity(include.len());
        let mut exclude_patterns: Vec<String> = exclude.iter().map(|p| normalize(p)).collect();

        for raw in include {
            if let Some(negated) = raw.strip_prefix('!') {
                exclude_patterns.push(normalize(negated));
                continue;
            }
            let pattern = normalize(raw);
            let (base, literal) = glob_base(&pattern);
            let matcher = compile(&pattern)?.compile_matcher();
            include_globs.push(IncludeGlob {
                pattern,
                base,
                literal,
                matcher,
            });
        }

        let exclude = if exclude_patterns.is_empty() {
            None
        } else {
            Some(build_globset(exclude_patterns.iter().map(String::as_str))?)
        };

        let prune_patterns: Vec<&str> = exclude_patterns
            .iter()
            .filter_map(|p| p.strip_suffix("/**"))
            .filter(|p| !p.is_empty())
            .collect();
        let prune = if prune_patterns.is_empty() {
            None
        } else {
            Some(build_globset(prune_patterns.into_iter())?)
        };

        Ok(Self {
            include: include_globs,
            exclude_patterns,
            exclude,
            prune,
        })
    }

    /// The allow-list patterns, as declared (minus negations).
    pub fn patterns(&self) -> Vec<String> {
        self.include.iter().map(|g| g.pattern.clone()).collect()
    }

    pub fn exclude_patterns(&self) -> &[String] {
        &self.exclude_patterns
    }

    pub fn is_excluded(&self, rel_path: &str) -> bool {
        self.exclude
            .as_ref()
            .is_some_and(|set| set.is_match(rel_path))
    }

    /// Whether a root-relative path (forward slashes) is selected.
    pub fn matches(&self, rel_path: &str) -> bool {
        self.include.iter().any(|g| g.matcher.is_match(rel_path)) && !self.is_excluded(rel_path)
    }

    fn should_descend(&self, rel_dir: &str) -> bool {
        let pruned = self.prune.as_ref().is_some_and(|set| set.is_match(rel_dir));
        !pruned && !self.is_excluded(rel_dir)
    }

    /// Root-relative paths of every selected file, in selection order,
    /// paired with their path relative to the matching glob's base.
    pub fn matching_paths(
        &self,
        fs: &dyn FileSystem,
        root: &Path,
    ) -> Result<Vec<(PathBuf, PathBuf)>> {
        let mut seen: HashSet<PathBuf> = HashSet::new();
        let mut walked: HashMap<PathBuf, Vec<PathBuf>> = HashMap::new();
        let mut selected = Vec::new();

        for glob in &self.include {
            if glob.literal {
                let rel = PathBuf::from(&glob.pattern);
                if fs.is_file(&root.join(&rel)) && !self.is_excluded(&glob.pattern) {
                    if seen.insert(rel.clone()) {
                        let relative = strip_base(&rel, &glob.base);
                        selected.push((rel, relative));
                    }
                }
                continue;
            }

            if !walked.contains_key(&glob.base) {
                let files = self.walk_base(fs, root, &glob.base)?;
                walked.insert(glob.base.clone(), files);
            }

            for rel in &walked[&glob.base] {
                let rel_str = slash_path(rel);
                if !glob.matcher.is_match(&rel_str) || self.is_excluded(&rel_str) {
                    continue;
                }
                if seen.insert(rel.clone()) {
                    selected.push((rel.clone(), strip_base(rel, &glob.base)));
                }
            }
        }

        Ok(selected)
    }

    /// Read every selected file into a [`FileSet`].
    pub fn select(&self, fs: &dyn FileSystem, root: &Path) -> Result<FileSet> {
        let mut set = FileSet::new();
        for (rel, relative) in self.matching_paths(fs, root)? {
            let contents = fs
                .read(&root.join(&rel))
                .with_context(|| format!("reading source {:?}", rel))?;
            set.push(SourceFile::new(relative, contents).with_origin(rel));
        }
        debug!(patterns = ?self.patterns(), files = set.len(), "selected sources");
        Ok(set)
    }

    fn walk_base(&self, fs: &dyn FileSystem, root: &Path, base: &Path) -> Result<Vec<PathBuf>> {
        let dir = if base.as_os_str().is_empty() {
            root.to_path_buf()
        } else {
            root.join(base)
        };
        if !fs.is_dir(&dir) {
            return Ok(Vec::new());
        }

        let mut descend = |path: &Path| match path.strip_prefix(root) {
            Ok(rel) => self.should_descend(&slash_path(rel)),
            Err(_) => false,
        };
        let files = walk_files(fs, &dir, &mut descend)?;

        Ok(files
            .into_iter()
            .filter_map(|p| p.strip_prefix(root).ok().map(Path::to_path_buf))
            .collect())
    }
}

/// Compile a single glob where `*` does not match `/`.
fn compile(pattern: &str) -> Result<Glob> {
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .with_context(|| format!("invalid glob pattern: {pattern}"))
}

/// Build a GlobSet from simple string patterns.
pub fn build_globset<'a>(patterns: impl Iterator<Item = &'a str>) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        builder.add(compile(pat)?);
    }
    Ok(builder.build()?)
}

fn normalize(pattern: &str) -> String {
    pattern.trim().trim_start_matches("./").to_string()
}

fn has_glob_meta(component: &str) -> bool {
    component.contains(['*', '?', '[', '{'])
}

/// Literal directory prefix of a pattern, and whether the whole pattern is
/// literal. For a literal pattern the base is its parent directory.
pub fn glob_base(pattern: &str) -> (PathBuf, bool) {
    let components: Vec<&str> = pattern.split('/').collect();
    match components.iter().position(|c| has_glob_meta(c)) {
        Some(first_glob) => (components[..first_glob].iter().collect(), false),
        None => {
            let parent = &components[..components.len().saturating_sub(1)];
            (parent.iter().collect(), true)
        }
    }
}

fn strip_base(rel: &Path, base: &Path) -> PathBuf {
    rel.strip_prefix(base)
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| rel.to_path_buf())
}

/// Forward-slash string form of a relative path, as matched by globs.
pub fn slash_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
