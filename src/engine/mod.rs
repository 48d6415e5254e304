// src/engine/mod.rs

//! Orchestration engine.
//!
//! This module ties together:
//! - the phase scheduler
//! - the executor that runs scheduled tasks
//! - the notifier that receives every task outcome
//! - the per-run event loop that reacts to:
//!   - task completion events
//!   - cancel requests
//!
//! The pure core state machine lives in [`core`]; the async/IO shell is
//! implemented in [`runtime`]. [`runner`] is the entry point callers use.

use crate::types::RunOutcome;

/// Events flowing into a run's runtime from the executor and from callers.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    /// A task finished, successfully or not.
    TaskCompleted { outcome: RunOutcome },
    /// Stop at the next phase boundary.
    CancelRequested,
}

pub mod core;
pub mod event_handlers;
pub mod runner;
pub mod runtime;

pub use core::CoreRuntime;
pub use event_handlers::{CoreCommand, CoreStep};
pub use runner::{BuildRunner, CancelHandle, RunHandle};
pub use runtime::Runtime;
