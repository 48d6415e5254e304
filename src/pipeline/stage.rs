// src/pipeline/stage.rs

//! The uniform transform interface.
//!
//! A [`Stage`] maps an ordered [`FileSet`] to a new one or fails. Stages do no
//! destination I/O; reading sources and writing results happens only at the
//! pipeline boundaries.

use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;

use thiserror::Error;

use crate::pipeline::fileset::FileSet;

/// Failure of a single stage, usually malformed input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct StageError {
    pub message: String,
}

impl StageError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Ambient information a stage may need (e.g. to resolve imports or run a
/// tool in the project directory).
#[derive(Debug, Clone)]
pub struct StageContext {
    pub root: PathBuf,
}

pub type StageFuture<'a> = Pin<Box<dyn Future<Output = Result<FileSet, StageError>> + Send + 'a>>;

/// One opaque content transformation.
pub trait Stage: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    fn apply<'a>(&'a self, ctx: &'a StageContext, files: FileSet) -> StageFuture<'a>;
}

/// A step of a pipeline: either a transform, or a snapshot of the current
/// set queued for writing to the destination.
#[derive(Debug, Clone)]
pub enum Step {
    Transform(Arc<dyn Stage>),
    Emit,
}

impl Step {
    pub fn transform(stage: impl Stage + 'static) -> Self {
        Step::Transform(Arc::new(stage))
    }

    pub fn label(&self) -> &str {
        match self {
            Step::Transform(stage) => stage.name(),
            Step::Emit => "emit",
        }
    }
}

/// Stage backed by a plain synchronous function.
pub struct FnStage<F> {
    name: String,
    f: F,
}

impl<F> FnStage<F>
where
    F: Fn(FileSet) -> Result<FileSet, StageError> + Send + Sync,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<F> fmt::Debug for FnStage<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnStage").field("name", &self.name).finish()
    }
}

impl<F> Stage for FnStage<F>
where
    F: Fn(FileSet) -> Result<FileSet, StageError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn apply<'a>(&'a self, _ctx: &'a StageContext, files: FileSet) -> StageFuture<'a> {
        let result = (self.f)(files);
        Box::pin(async move { result })
    }
}
