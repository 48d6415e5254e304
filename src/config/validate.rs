// src/config/validate.rs

use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use std::path::{Component, Path};

use crate::clean::CleanSpec;
use crate::config::model::{ConfigFile, GroupConfig, RawConfigFile, TaskConfig};
use crate::dag::{Task, TaskGraph, TaskGroup};
use crate::errors::{AssetdagError, GraphError, Result};
use crate::pipeline::{PipelineSpec, SourceSelector, StageSpec};
use crate::watch::{WatchBinding, build_profiles};

pub const DEBOUNCE_RANGE_MS: RangeInclusive<u64> = 10..=5000;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::AssetdagError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;

        let mut graph = TaskGraph::new();
        for (name, task) in &raw.task {
            graph.register(build_task(name, task)?)?;
        }
        register_groups(&mut graph, &raw.group)?;

        let bindings = build_bindings(&graph, &raw)?;

        Ok(ConfigFile::new_unchecked(
            raw.config,
            raw.reload,
            graph,
            bindings,
        ))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_tasks(cfg)?;
    validate_global_config(cfg)?;
    Ok(())
}

fn ensure_has_tasks(cfg: &RawConfigFile) -> Result<()> {
    if cfg.task.is_empty() {
        return Err(AssetdagError::Config(
            "config must contain at least one [task.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &RawConfigFile) -> Result<()> {
    let debounce = cfg.config.debounce_ms;
    if !DEBOUNCE_RANGE_MS.contains(&debounce) {
        return Err(AssetdagError::Config(format!(
            "[config].debounce_ms must be between {} and {} (got {debounce})",
            DEBOUNCE_RANGE_MS.start(),
            DEBOUNCE_RANGE_MS.end(),
        )));
    }
    if cfg.config.build_entry.trim().is_empty() || cfg.config.watch_entry.trim().is_empty() {
        return Err(AssetdagError::Config(
            "[config].build_entry and [config].watch_entry must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn build_task(name: &str, cfg: &TaskConfig) -> Result<Task> {
    if let Some(clean) = &cfg.clean {
        if !cfg.src.is_empty() || !cfg.stages.is_empty() || cfg.dest.is_some() {
            return Err(AssetdagError::Config(format!(
                "task '{name}': `clean` cannot be combined with `src`, `stages` or `dest`"
            )));
        }
        if clean.remove.is_empty() {
            return Err(AssetdagError::Config(format!(
                "task '{name}': `clean.remove` must list at least one path or pattern"
            )));
        }
        if let Some(entry) = clean
            .remove
            .iter()
            .find(|e| Path::new(e).components().any(|c| matches!(c, Component::ParentDir)))
        {
            return Err(AssetdagError::Config(format!(
                "task '{name}': `clean.remove` entries must stay inside the project root (got {entry:?})"
            )));
        }
        let spec = match &clean.protect {
            Some(protect) => CleanSpec::new(&clean.remove, protect),
            None => CleanSpec::with_default_protect(&clean.remove),
        }
        .map_err(|e| AssetdagError::Config(format!("task '{name}': {e:#}")))?;
        return Ok(Task::clean(name, spec));
    }

    if cfg.src.is_empty() {
        return Err(AssetdagError::Config(format!(
            "task '{name}' needs either `src` or `clean`"
        )));
    }

    let selector = SourceSelector::new(&cfg.src, &cfg.exclude)
        .map_err(|e| AssetdagError::Config(format!("task '{name}': {e:#}")))?;

    let mut spec = PipelineSpec::new(selector).require_match(cfg.require_match);
    for stage in &cfg.stages {
        if *stage == StageSpec::Emit && cfg.dest.is_none() {
            return Err(AssetdagError::Config(format!(
                "task '{name}': an `emit` stage needs `dest`"
            )));
        }
        let step = stage
            .build()
            .map_err(|e| AssetdagError::Config(format!("task '{name}': {e}")))?;
        spec = spec.step(step);
    }
    if let Some(dest) = &cfg.dest {
        if dest.is_absolute() {
            return Err(AssetdagError::Config(format!(
                "task '{name}': `dest` must be relative to the project root (got {dest:?})"
            )));
        }
        if dest.components().any(|c| matches!(c, Component::ParentDir)) {
            return Err(AssetdagError::Config(format!(
                "task '{name}': `dest` must stay inside the project root (got {dest:?})"
            )));
        }
        if !dest.components().any(|c| matches!(c, Component::Normal(_))) {
            return Err(AssetdagError::Config(format!(
                "task '{name}': `dest` must name a directory below the project root (got {dest:?})"
            )));
        }
        spec = spec.dest(dest.clone());
    }

    Ok(Task::pipeline(name, spec))
}

/// Register groups so that every group is registered after the groups it
/// refers to, whatever their order in the file.
fn register_groups(graph: &mut TaskGraph, groups: &BTreeMap<String, GroupConfig>) -> Result<()> {
    let mut stack = Vec::new();
    for name in groups.keys() {
        register_group_rec(graph, groups, name, &mut stack)?;
    }
    Ok(())
}

fn register_group_rec(
    graph: &mut TaskGraph,
    groups: &BTreeMap<String, GroupConfig>,
    name: &str,
    stack: &mut Vec<String>,
) -> Result<()> {
    if graph.is_group(name) {
        return Ok(());
    }
    let Some(cfg) = groups.get(name) else {
        return Ok(());
    };

    stack.push(name.to_string());
    for reference in cfg.after.iter().chain(cfg.members.iter()) {
        if !groups.contains_key(reference) || graph.is_group(reference) {
            continue;
        }
        if stack.iter().any(|s| s == reference) {
            return Err(GraphError::Cycle {
                node: reference.clone(),
                from: name.to_string(),
                to: reference.clone(),
            }
            .into());
        }
        register_group_rec(graph, groups, reference, stack)?;
    }
    stack.pop();

    let group = TaskGroup::new(name)
        .after(cfg.after.iter().cloned())
        .members(cfg.members.iter().cloned());
    graph.register_group(group)?;
    Ok(())
}

fn build_bindings(graph: &TaskGraph, raw: &RawConfigFile) -> Result<Vec<WatchBinding>> {
    let bindings: Vec<WatchBinding> = raw.watch.iter().map(WatchBinding::from).collect();

    // Compiles every pattern; rejects empty `patterns` / `run`.
    build_profiles(&bindings).map_err(|e| AssetdagError::Config(format!("[[watch]]: {e:#}")))?;

    for binding in &bindings {
        graph.resolve_sequence(&binding.run)?;
    }
    Ok(bindings)
}
