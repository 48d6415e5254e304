// src/dag/graph.rs

//! The task graph: named tasks and groups, resolved into ordered phases.
//!
//! Every registered name (task or group) has an *expansion*: the set of
//! tasks it stands for plus the ordering edges between them. A task expands
//! to itself. A group expands to the union of the expansions it refers to,
//! with edges from every task of each `after` element to every task of the
//! next one, and from every task of the last `after` element to every task
//! of each member. Edges are local to an expansion, so a sequence declared
//! in one group never constrains another group that happens to share tasks.
//!
//! Registration is atomic: all checks run on a staged copy and nothing is
//! stored unless they pass.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

use petgraph::Direction;
use petgraph::algo::has_path_connecting;
use petgraph::graphmap::DiGraphMap;
use tracing::debug;

use crate::dag::task_info::{Phase, Task, TaskGroup};
use crate::errors::GraphError;
use crate::types::TaskName;

/// Tasks a name stands for, and the ordering edges between them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Expansion {
    pub tasks: BTreeSet<TaskName>,
    pub edges: BTreeSet<(TaskName, TaskName)>,
}

impl Expansion {
    fn single(name: &str) -> Self {
        Self {
            tasks: BTreeSet::from([name.to_string()]),
            edges: BTreeSet::new(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TaskGraph {
    tasks: HashMap<TaskName, Arc<Task>>,
    groups: BTreeMap<TaskName, TaskGroup>,
    expansions: HashMap<TaskName, Expansion>,
    /// Registration order of tasks, for listing.
    task_order: Vec<TaskName>,
}

impl TaskGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, task: Task) -> Result<(), GraphError> {
        self.ensure_free(&task.name)?;
        debug!(task = %task.name, kind = task.kind(), "registered task");
        self.expansions
            .insert(task.name.clone(), Expansion::single(&task.name));
        self.task_order.push(task.name.clone());
        self.tasks.insert(task.name.clone(), Arc::new(task));
        Ok(())
    }

    /// Register a group. Every name it refers to must already be
    /// registered.
    pub fn register_group(&mut self, group: TaskGroup) -> Result<(), GraphError> {
        self.ensure_free(&group.name)?;

        let expansion = self.compose(&group.name, &group.after, &group.members)?;
        let phases = phases_of(&expansion);
        self.check_destinations(&group.name, &phases)?;

        debug!(
            group = %group.name,
            tasks = expansion.tasks.len(),
            phases = phases.len(),
            "registered group"
        );
        self.expansions.insert(group.name.clone(), expansion);
        self.groups.insert(group.name.clone(), group);
        Ok(())
    }

    /// Ordered phases of everything reachable from `entry`.
    pub fn resolve_order(&self, entry: &str) -> Result<Vec<Phase>, GraphError> {
        let expansion = self
            .expansions
            .get(entry)
            .ok_or_else(|| GraphError::UnknownNode {
                referenced_by: "<entry>".to_string(),
                name: entry.to_string(),
            })?;
        Ok(phases_of(expansion))
    }

    /// Ordered phases for running `names` one after another, as if they
    /// were the `after` sequence of an anonymous group.
    pub fn resolve_sequence(&self, names: &[TaskName]) -> Result<Vec<Phase>, GraphError> {
        let label = sequence_label(names);
        let expansion = self.compose(&label, names, &[])?;
        let phases = phases_of(&expansion);
        self.check_destinations(&label, &phases)?;
        Ok(phases)
    }

    pub fn task(&self, name: &str) -> Option<Arc<Task>> {
        self.tasks.get(name).cloned()
    }

    pub fn group(&self, name: &str) -> Option<&TaskGroup> {
        self.groups.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.expansions.contains_key(name)
    }

    pub fn is_group(&self, name: &str) -> bool {
        self.groups.contains_key(name)
    }

    /// Task names in registration order.
    pub fn task_names(&self) -> impl Iterator<Item = &str> {
        self.task_order.iter().map(String::as_str)
    }

    /// Groups sorted by name.
    pub fn groups(&self) -> impl Iterator<Item = &TaskGroup> {
        self.groups.values()
    }

    pub fn expansion(&self, name: &str) -> Option<&Expansion> {
        self.expansions.get(name)
    }

    fn ensure_free(&self, name: &str) -> Result<(), GraphError> {
        if self.contains(name) {
            return Err(GraphError::DuplicateNode(name.to_string()));
        }
        Ok(())
    }

    fn lookup(&self, owner: &str, name: &str) -> Result<&Expansion, GraphError> {
        self.expansions
            .get(name)
            .ok_or_else(|| GraphError::UnknownNode {
                referenced_by: owner.to_string(),
                name: name.to_string(),
            })
    }

    /// Build the expansion for `after` followed by concurrent `members`,
    /// rejecting any edge that would close a cycle.
    fn compose(
        &self,
        owner: &str,
        after: &[TaskName],
        members: &[TaskName],
    ) -> Result<Expansion, GraphError> {
        let after_parts = after
            .iter()
            .map(|n| self.lookup(owner, n))
            .collect::<Result<Vec<_>, _>>()?;
        let member_parts = members
            .iter()
            .map(|n| self.lookup(owner, n))
            .collect::<Result<Vec<_>, _>>()?;

        let mut staged = Staged::new(owner);
        for part in after_parts.iter().chain(member_parts.iter()) {
            staged.absorb(part)?;
        }

        for pair in after_parts.windows(2) {
            staged.sequence(pair[0], pair[1])?;
        }
        if let Some(last) = after_parts.last() {
            for member in &member_parts {
                staged.sequence(last, member)?;
            }
        }

        Ok(staged.into_expansion())
    }

    fn check_destinations(&self, owner: &str, phases: &[Phase]) -> Result<(), GraphError> {
        for phase in phases {
            let dests: Vec<(&str, Vec<PathBuf>)> = phase
                .tasks
                .iter()
                .filter_map(|name| self.tasks.get(name))
                .map(|task| (task.name.as_str(), task.destinations()))
                .collect();

            for (i, (first, first_dests)) in dests.iter().enumerate() {
                for (second, second_dests) in &dests[i + 1..] {
                    if let Some(path) = overlap(first_dests, second_dests) {
                        return Err(GraphError::DestinationConflict {
                            node: owner.to_string(),
                            first: first.to_string(),
                            second: second.to_string(),
                            path,
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

/// Graph under construction for one expansion.
struct Staged<'a> {
    owner: &'a str,
    graph: DiGraphMap<&'a str, ()>,
}

impl<'a> Staged<'a> {
    fn new(owner: &'a str) -> Self {
        Self {
            owner,
            graph: DiGraphMap::new(),
        }
    }

    fn absorb(&mut self, part: &'a Expansion) -> Result<(), GraphError> {
        for task in &part.tasks {
            self.graph.add_node(task.as_str());
        }
        for (from, to) in &part.edges {
            self.add_edge(from, to)?;
        }
        Ok(())
    }

    fn sequence(&mut self, before: &'a Expansion, after: &'a Expansion) -> Result<(), GraphError> {
        for from in &before.tasks {
            for to in &after.tasks {
                self.add_edge(from, to)?;
            }
        }
        Ok(())
    }

    fn add_edge(&mut self, from: &'a str, to: &'a str) -> Result<(), GraphError> {
        if self.graph.contains_edge(from, to) {
            return Ok(());
        }
        if from == to || has_path_connecting(&self.graph, to, from, None) {
            return Err(GraphError::Cycle {
                node: self.owner.to_string(),
                from: from.to_string(),
                to: to.to_string(),
            });
        }
        self.graph.add_edge(from, to, ());
        Ok(())
    }

    fn into_expansion(self) -> Expansion {
        Expansion {
            tasks: self.graph.nodes().map(str::to_string).collect(),
            edges: self
                .graph
                .all_edges()
                .map(|(a, b, _)| (a.to_string(), b.to_string()))
                .collect(),
        }
    }
}

/// Layered topological order: a task lands in the phase after the latest
/// phase of any of its predecessors.
fn phases_of(expansion: &Expansion) -> Vec<Phase> {
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
    for task in &expansion.tasks {
        graph.add_node(task.as_str());
    }
    for (from, to) in &expansion.edges {
        graph.add_edge(from.as_str(), to.as_str(), ());
    }

    let mut indegree: BTreeMap<&str, usize> = graph
        .nodes()
        .map(|n| (n, graph.neighbors_directed(n, Direction::Incoming).count()))
        .collect();

    let mut phases = Vec::new();
    let mut ready: Vec<&str> = indegree
        .iter()
        .filter(|(_, d)| **d == 0)
        .map(|(n, _)| *n)
        .collect();

    while !ready.is_empty() {
        ready.sort_unstable();
        let mut next = Vec::new();
        for node in &ready {
            indegree.remove(node);
            for succ in graph.neighbors_directed(*node, Direction::Outgoing) {
                if let Some(d) = indegree.get_mut(&succ) {
                    *d -= 1;
                    if *d == 0 {
                        next.push(succ);
                    }
                }
            }
        }
        phases.push(Phase {
            index: phases.len(),
            tasks: ready.iter().map(|s| s.to_string()).collect(),
        });
        ready = next;
    }

    phases
}

/// First destination of `a` that overlaps (equals, contains or is contained
/// by) a destination of `b`.
fn overlap(a: &[PathBuf], b: &[PathBuf]) -> Option<PathBuf> {
    for pa in a {
        for pb in b {
            if pa.starts_with(pb) {
                return Some(pb.clone());
            }
            if pb.starts_with(pa) {
                return Some(pa.clone());
            }
        }
    }
    None
}

fn sequence_label(names: &[TaskName]) -> String {
    names.join("+")
}
