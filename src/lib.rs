// src/lib.rs

pub mod clean;
pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod notifier;
pub mod pipeline;
pub mod types;
pub mod watch;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, error, info, warn};

use crate::cli::{CliArgs, Command};
use crate::config::model::ConfigFile;
use crate::config::{load_and_validate, project_root};
use crate::engine::BuildRunner;
use crate::errors::AssetdagError;
use crate::fs::RealFileSystem;
use crate::notifier::livereload::LiveReloadServer;
use crate::notifier::{FanoutNotifier, LogNotifier, Notifier};
use crate::pipeline::ExecContext;
use crate::types::RunReport;

/// Every task of the run succeeded.
pub const EXIT_OK: u8 = 0;
/// At least one task failed.
pub const EXIT_TASK_FAILED: u8 = 1;
/// Invalid configuration, unknown entry, or the watcher could not start.
pub const EXIT_CONFIG: u8 = 2;
/// Watch mode stopped by Ctrl-C.
pub const EXIT_INTERRUPTED: u8 = 130;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and task registration
/// - the build runner and its executor
/// - (watch mode) the live-reload server, file watcher and Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<ExitCode> {
    let config_path = PathBuf::from(&args.config);
    let cfg = match load_and_validate(&config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(config = %config_path.display(), error = %e, "invalid configuration");
            eprintln!("assetdag: {e}");
            return Ok(ExitCode::from(EXIT_CONFIG));
        }
    };
    let root = project_root(&config_path, &cfg);
    let command = args.command();

    if args.dry_run {
        return Ok(print_dry_run(&cfg, &command));
    }

    let code = match command {
        Command::Build => run_entry(&cfg, root, &cfg.config.build_entry).await,
        Command::Run { target } => run_entry(&cfg, root, &target).await,
        Command::Watch => watch_mode(&cfg, root).await,
    };
    Ok(ExitCode::from(code))
}

fn exec_context(root: PathBuf) -> ExecContext {
    ExecContext::new(root, Arc::new(RealFileSystem))
}

/// Run one task or group to completion and map the result to an exit
/// code.
async fn run_entry(cfg: &ConfigFile, root: PathBuf, entry: &str) -> u8 {
    info!(entry, root = %root.display(), "running");
    let runner = BuildRunner::new(Arc::clone(&cfg.graph), exec_context(root));

    match runner.run_once(entry).await {
        Ok(report) => {
            log_report(&report);
            if report.is_success() {
                EXIT_OK
            } else {
                EXIT_TASK_FAILED
            }
        }
        Err(e) => exit_code_for(&e),
    }
}

async fn watch_mode(cfg: &ConfigFile, root: PathBuf) -> u8 {
    let notifier = build_notifier(cfg);
    let runner = Arc::new(
        BuildRunner::new(Arc::clone(&cfg.graph), exec_context(root.clone()))
            .with_notifier(notifier),
    );

    // Initial build; task failures don't stop watch mode.
    match runner.run_once(&cfg.config.watch_entry).await {
        Ok(report) => log_report(&report),
        Err(e) => return exit_code_for(&e),
    }

    let session = match watch::start_watch(
        root,
        &cfg.bindings,
        Arc::clone(&runner),
        cfg.config.debounce(),
    ) {
        Ok(session) => session,
        Err(e) => return exit_code_for(&e),
    };

    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for Ctrl+C; stopping");
    }
    info!("Ctrl+C received; waiting for in-flight runs");
    session.shutdown().await;
    EXIT_INTERRUPTED
}

fn build_notifier(cfg: &ConfigFile) -> Arc<dyn Notifier> {
    let mut fanout = FanoutNotifier::new().with(Arc::new(LogNotifier));
    if cfg.reload.enabled {
        match LiveReloadServer::start(&cfg.reload.addr.to_string()) {
            Ok(server) => fanout = fanout.with(Arc::new(server)),
            Err(e) => warn!(error = %e, "live reload disabled"),
        }
    }
    Arc::new(fanout)
}

fn exit_code_for(err: &AssetdagError) -> u8 {
    error!(error = %err, "aborting");
    eprintln!("assetdag: {err}");
    match err {
        AssetdagError::Config(_)
        | AssetdagError::Graph(_)
        | AssetdagError::Toml(_)
        | AssetdagError::WatchStart(_) => EXIT_CONFIG,
        AssetdagError::Io(_) | AssetdagError::Other(_) => EXIT_TASK_FAILED,
    }
}

fn log_report(report: &RunReport) {
    for outcome in &report.outcomes {
        match &outcome.error {
            None => debug!(task = %outcome.task, outputs = outcome.outputs.len(), "ok"),
            Some(e) => error!(task = %outcome.task, error = %e, "task failed"),
        }
    }
    info!(
        entry = %report.entry,
        status = %report.status,
        phases_completed = report.phases_completed,
        phases_total = report.phases_total,
        tasks = report.outcomes.len(),
        "run finished"
    );
}

/// Print the resolved phases of the entry the command would run.
fn print_dry_run(cfg: &ConfigFile, command: &Command) -> ExitCode {
    let entry = match command {
        Command::Build => cfg.config.build_entry.as_str(),
        Command::Watch => cfg.config.watch_entry.as_str(),
        Command::Run { target } => target.as_str(),
    };

    println!("assetdag dry-run");
    println!("  entry = {entry:?}");
    println!("  debounce_ms = {}", cfg.config.debounce_ms);
    println!();

    let phases = match cfg.graph.resolve_order(entry) {
        Ok(phases) => phases,
        Err(e) => {
            eprintln!("assetdag: {e}");
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    println!("phases ({}):", phases.len());
    for phase in &phases {
        println!("  {}:", phase.index);
        for name in &phase.tasks {
            let Some(task) = cfg.graph.task(name) else {
                continue;
            };
            let dests: Vec<String> = task
                .destinations()
                .iter()
                .map(|p| p.display().to_string())
                .collect();
            if dests.is_empty() {
                println!("    - {name} ({})", task.kind());
            } else {
                println!("    - {name} ({}) -> {}", task.kind(), dests.join(", "));
            }
        }
    }

    if matches!(command, Command::Watch) && !cfg.bindings.is_empty() {
        println!();
        println!("watch ({}):", cfg.bindings.len());
        for binding in &cfg.bindings {
            println!("  - {:?} -> {}", binding.patterns, binding.label());
        }
    }

    debug!("dry-run complete (no execution)");
    ExitCode::from(EXIT_OK)
}
