use clap::Parser;

use assetdag::cli::{CliArgs, Command, LogLevel};
use assetdag::logging::resolve_level;

#[test]
fn test_defaults_to_watch_with_default_config() {
    let args = CliArgs::try_parse_from(["assetdag"]).unwrap();

    assert_eq!(args.config, "Assetdag.toml");
    assert!(!args.dry_run);
    assert_eq!(args.command(), Command::Watch);
}

#[test]
fn test_global_flags_after_subcommand() {
    let args = CliArgs::try_parse_from([
        "assetdag",
        "run",
        "styles",
        "--config",
        "site/Assetdag.toml",
        "--dry-run",
        "--log-level",
        "debug",
    ])
    .unwrap();

    assert_eq!(
        args.command(),
        Command::Run {
            target: "styles".to_string()
        }
    );
    assert_eq!(args.config, "site/Assetdag.toml");
    assert!(args.dry_run);
    assert!(matches!(args.log_level, Some(LogLevel::Debug)));
}

#[test]
fn test_run_requires_a_target() {
    assert!(CliArgs::try_parse_from(["assetdag", "run"]).is_err());
    assert!(CliArgs::try_parse_from(["assetdag", "deploy"]).is_err());
}

#[test]
fn test_log_level_flag_wins_over_environment() {
    assert_eq!(resolve_level(Some(LogLevel::Warn), Some("trace")), tracing::Level::WARN);
    assert_eq!(resolve_level(None, Some(" DEBUG ")), tracing::Level::DEBUG);
    assert_eq!(resolve_level(None, Some("loud")), tracing::Level::INFO);
    assert_eq!(resolve_level(None, None), tracing::Level::INFO);
}
