// src/dag/mod.rs

//! Task graph representation and scheduling.
//!
//! - [`graph`] registers tasks and groups and resolves them into phases.
//! - [`scheduler`] contains the per-run state machine that walks those
//!   phases and decides when the next one may start.
//! - [`task_info`] provides task, group and scheduled task types.
//! - [`scheduler_step`] defines the result type for scheduler steps.

pub mod graph;
pub mod scheduler;
pub mod scheduler_step;
pub mod task_info;

pub use graph::{Expansion, TaskGraph};
pub use scheduler::Scheduler;
pub use scheduler_step::SchedulerStep;
pub use task_info::{Phase, ScheduledTask, Task, TaskAction, TaskGroup, TaskRunState};
