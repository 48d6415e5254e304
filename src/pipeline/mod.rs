// src/pipeline/mod.rs

//! Pipelines: source selection, ordered stages, atomic destination write.

pub mod fileset;
pub mod output;
pub mod sources;
pub mod stage;
pub mod stages;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::errors::TaskError;
use crate::fs::FileSystem;

pub use fileset::{FileSet, SourceFile};
pub use output::PendingWrites;
pub use sources::SourceSelector;
pub use stage::{FnStage, Stage, StageContext, StageError, Step};
pub use stages::StageSpec;

/// Everything a pipeline task needs, fixed at registration time.
#[derive(Debug, Clone)]
pub struct PipelineSpec {
    pub selector: SourceSelector,
    /// Fail with `NoMatch` when the selection is empty.
    pub require_match: bool,
    pub steps: Vec<Step>,
    /// Root-relative destination directory. Without one the pipeline is a
    /// pure check (e.g. lint only) and `Emit` steps are no-ops.
    pub dest: Option<PathBuf>,
}

impl PipelineSpec {
    pub fn new(selector: SourceSelector) -> Self {
        Self {
            selector,
            require_match: true,
            steps: Vec::new(),
            dest: None,
        }
    }

    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    pub fn stage(self, stage: impl Stage + 'static) -> Self {
        self.step(Step::transform(stage))
    }

    pub fn emit(self) -> Self {
        self.step(Step::Emit)
    }

    pub fn dest(mut self, dest: impl Into<PathBuf>) -> Self {
        self.dest = Some(dest.into());
        self
    }

    pub fn require_match(mut self, require: bool) -> Self {
        self.require_match = require;
        self
    }
}

/// Where a task executes: the project root and the file system used to
/// read sources and remove files.
#[derive(Debug, Clone)]
pub struct ExecContext {
    pub root: PathBuf,
    pub fs: Arc<dyn FileSystem>,
}

impl ExecContext {
    pub fn new(root: impl Into<PathBuf>, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            root: root.into(),
            fs,
        }
    }

    pub fn stage_context(&self) -> StageContext {
        StageContext {
            root: self.root.clone(),
        }
    }
}

/// Run one pipeline. Returns the root-relative paths written.
///
/// Nothing is written unless every stage succeeded.
pub async fn execute(spec: &PipelineSpec, ctx: &ExecContext) -> Result<Vec<PathBuf>, TaskError> {
    let mut files = spec
        .selector
        .select(ctx.fs.as_ref(), &ctx.root)
        .map_err(|e| TaskError::Read {
            path: ctx.root.clone(),
            message: format!("{e:#}"),
        })?;

    if files.is_empty() {
        if spec.require_match {
            return Err(TaskError::NoMatch {
                patterns: spec.selector.patterns(),
            });
        }
        debug!(patterns = ?spec.selector.patterns(), "no sources matched, nothing to do");
    }

    let stage_ctx = ctx.stage_context();
    let mut pending = PendingWrites::new();

    for step in &spec.steps {
        match step {
            Step::Transform(stage) => {
                files = stage
                    .apply(&stage_ctx, files)
                    .await
                    .map_err(|e| TaskError::Transform {
                        stage: stage.name().to_string(),
                        message: e.message,
                    })?;
            }
            Step::Emit => queue(&mut pending, spec.dest.as_deref(), &files),
        }
    }

    if let Some(dest) = spec.dest.as_deref() {
        if !matches!(spec.steps.last(), Some(Step::Emit)) {
            pending.queue(dest, &files);
        }
    }

    if pending.is_empty() {
        return Ok(Vec::new());
    }

    let root = ctx.root.clone();
    tokio::task::spawn_blocking(move || pending.commit(&root))
        .await
        .map_err(|e| TaskError::Aborted(e.to_string()))?
}

fn queue(pending: &mut PendingWrites, dest: Option<&Path>, files: &FileSet) {
    match dest {
        Some(dest) => pending.queue(dest, files),
        None if !files.is_empty() => {
            warn!("emit without a destination, snapshot dropped");
        }
        None => {}
    }
}
