// src/errors.rs

//! Crate-wide error types.
//!
//! - [`GraphError`]: structural problems found while registering tasks and
//!   groups. These abort start-up before anything runs.
//! - [`TaskError`]: run-time failures scoped to one task. They never escape
//!   the scheduler; they are recorded in a [`crate::types::RunOutcome`].
//! - [`AssetdagError`]: everything the library surfaces to its caller.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("cycle detected in '{node}': ordering '{from}' before '{to}' closes a cycle")]
    Cycle {
        node: String,
        from: String,
        to: String,
    },

    #[error("'{referenced_by}' references unknown task or group '{name}'")]
    UnknownNode { referenced_by: String, name: String },

    #[error(
        "tasks '{first}' and '{second}' write overlapping destinations ({path:?}) in the same phase of '{node}'"
    )]
    DestinationConflict {
        node: String,
        first: String,
        second: String,
        path: PathBuf,
    },

    #[error("'{0}' is already registered")]
    DuplicateNode(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    #[error("no files matched {patterns:?}")]
    NoMatch { patterns: Vec<String> },

    #[error("stage '{stage}' failed: {message}")]
    Transform { stage: String, message: String },

    #[error("reading {path:?}: {message}")]
    Read { path: PathBuf, message: String },

    #[error("writing {path:?}: {message}")]
    Write { path: PathBuf, message: String },

    #[error("removing {path:?}: {message}")]
    Remove { path: PathBuf, message: String },

    #[error("task aborted: {0}")]
    Aborted(String),
}

#[derive(Error, Debug)]
pub enum AssetdagError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("Failed to start file watcher: {0}")]
    WatchStart(String),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, AssetdagError>;
