#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use assetdag::clean::CleanSpec;
use assetdag::dag::{Task, TaskGraph, TaskGroup};
use assetdag::errors::GraphError;
use assetdag::pipeline::{PipelineSpec, SourceSelector};

/// Builder for pipeline `Task`s that select nothing and write nothing
/// unless told otherwise. Handy for graph and scheduler tests, where only
/// names and destinations matter.
pub struct TaskBuilder {
    name: String,
    src: Vec<String>,
    dest: Option<PathBuf>,
}

impl TaskBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            src: Vec::new(),
            dest: None,
        }
    }

    pub fn src(mut self, pattern: &str) -> Self {
        self.src.push(pattern.to_string());
        self
    }

    pub fn dest(mut self, dest: &str) -> Self {
        self.dest = Some(PathBuf::from(dest));
        self
    }

    pub fn build(self) -> Task {
        let selector = SourceSelector::new(&self.src, &[]).expect("valid source patterns");
        let mut spec = PipelineSpec::new(selector).require_match(false);
        if let Some(dest) = self.dest {
            spec = spec.dest(dest);
        }
        Task::pipeline(self.name, spec)
    }
}

/// A cleanup task with the default protect list.
pub fn clean_task(name: &str, remove: &[&str]) -> Task {
    let remove: Vec<String> = remove.iter().map(|s| s.to_string()).collect();
    Task::clean(
        name,
        CleanSpec::with_default_protect(&remove).expect("valid clean patterns"),
    )
}

/// Builder for `TaskGraph`: tasks first, then groups, in call order.
#[derive(Default)]
pub struct GraphBuilder {
    tasks: Vec<Task>,
    groups: Vec<TaskGroup>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// A no-op task without destination.
    pub fn task(self, name: &str) -> Self {
        self.with_task(TaskBuilder::new(name).build())
    }

    /// A no-op task declaring `dest` as its destination.
    pub fn task_with_dest(self, name: &str, dest: &str) -> Self {
        self.with_task(TaskBuilder::new(name).dest(dest).build())
    }

    pub fn with_task(mut self, task: Task) -> Self {
        self.tasks.push(task);
        self
    }

    pub fn group(mut self, name: &str, after: &[&str], members: &[&str]) -> Self {
        self.groups.push(
            TaskGroup::new(name)
                .after(after.iter().copied())
                .members(members.iter().copied()),
        );
        self
    }

    pub fn try_build(self) -> Result<TaskGraph, GraphError> {
        let mut graph = TaskGraph::new();
        for task in self.tasks {
            graph.register(task)?;
        }
        for group in self.groups {
            graph.register_group(group)?;
        }
        Ok(graph)
    }

    pub fn build(self) -> Arc<TaskGraph> {
        Arc::new(self.try_build().expect("Failed to build valid graph from builder"))
    }
}
