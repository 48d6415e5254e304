// src/exec/mod.rs

//! Task execution layer.
//!
//! This module is responsible for actually running scheduled tasks (their
//! pipelines or cleanup actions) and reporting back to the run's runtime
//! via `RuntimeEvent`s.
//!
//! - [`executor_loop`] owns the background loop that spawns task runners
//!   and keeps one instance per task name in flight.
//! - [`task_runner`] runs one task and turns its result into a
//!   `RunOutcome`.
//! - [`backend`] provides the `ExecutorBackend` trait and the concrete
//!   `PipelineExecutor` used in production, which tests can replace with a
//!   fake implementation.

pub mod backend;
pub mod executor_loop;
pub mod task_runner;

pub use backend::{ExecutorBackend, PipelineExecutor};
pub use executor_loop::spawn_executor;
