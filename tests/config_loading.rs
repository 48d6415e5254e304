use std::path::{Path, PathBuf};
use std::time::Duration;

use tempfile::TempDir;

use assetdag::config::{load_and_validate, load_from_str, project_root};
use assetdag::dag::TaskAction;
use assetdag::errors::{AssetdagError, GraphError};
use assetdag_test_utils::write_file;

const PROJECT: &str = r#"
[config]
debounce_ms = 300

[reload]
enabled = false

[task.styles]
src = ["assets/sass/**/*.scss"]
dest = "assets/css"
stages = [
    { kind = "sass", style = "expanded" },
    { kind = "autoprefix" },
    { kind = "emit" },
    { kind = "rename", suffix = "-min" },
    { kind = "minify_css" },
]

[task.js]
src = ["assets/js/vendor/**/*.js", "assets/js/app/**/*.js"]
dest = "assets/js/dist"
stages = [{ kind = "concat", file = "app.js" }, { kind = "minify_js" }]

[task.jsHint]
src = ["assets/js/app/**/*.js"]
stages = [{ kind = "lint", cmd = "jshint" }]

[task.cleanup]
clean = { remove = ["build", "assets/css", "assets/js/dist"] }

[task.package]
src = ["**/*", "!build/**"]
exclude = ["node_modules/**"]
dest = "build"

[group.build]
after = ["cleanup", "styles", "js", "package"]

[group.default]
members = ["styles", "js", "jsHint"]

[[watch]]
patterns = ["assets/sass/**/*.scss"]
run = ["styles"]

[[watch]]
patterns = ["assets/js/app/**/*.js"]
run = ["jsHint", "js"]
use_hash = true
"#;

fn config_error(result: Result<impl std::fmt::Debug, AssetdagError>) -> String {
    match result {
        Err(AssetdagError::Config(msg)) => msg,
        other => panic!("expected a config error, got {other:?}"),
    }
}

#[test]
fn test_full_project_loads() {
    let cfg = load_from_str(PROJECT).unwrap();

    assert_eq!(cfg.config.debounce(), Duration::from_millis(300));
    assert_eq!(cfg.config.build_entry, "build");
    assert_eq!(cfg.config.watch_entry, "default");
    assert!(!cfg.reload.enabled);

    let phases = cfg.graph.resolve_order("build").unwrap();
    let names: Vec<Vec<String>> = phases.into_iter().map(|p| p.tasks).collect();
    assert_eq!(
        names,
        vec![
            vec!["cleanup".to_string()],
            vec!["styles".to_string()],
            vec!["js".to_string()],
            vec!["package".to_string()],
        ]
    );

    assert_eq!(cfg.bindings.len(), 2);
    assert!(cfg.bindings[1].use_hash);
    assert_eq!(cfg.bindings[1].run, vec!["jsHint".to_string(), "js".to_string()]);
}

#[test]
fn test_clean_task_gets_default_protect() {
    let cfg = load_from_str(PROJECT).unwrap();

    let task = cfg.graph.task("cleanup").unwrap();
    let TaskAction::Clean(spec) = &task.action else {
        panic!("cleanup should be a clean task");
    };
    assert_eq!(spec.protect_patterns(), ["node_modules".to_string(), ".git".to_string()]);
    assert_eq!(
        task.destinations(),
        vec![
            PathBuf::from("build"),
            PathBuf::from("assets/css"),
            PathBuf::from("assets/js/dist"),
        ]
    );
}

#[test]
fn test_pipeline_without_dest_is_a_check() {
    let cfg = load_from_str(PROJECT).unwrap();

    let task = cfg.graph.task("jsHint").unwrap();
    assert_eq!(task.kind(), "pipeline");
    assert!(task.destinations().is_empty());
}

#[test]
fn test_defaults_apply_when_sections_are_missing() {
    let cfg = load_from_str(
        r#"
        [task.copy]
        src = ["static/**/*"]
        dest = "public"
        "#,
    )
    .unwrap();

    assert_eq!(cfg.config.debounce(), Duration::from_millis(200));
    assert_eq!(cfg.config.root, PathBuf::from("."));
    assert!(cfg.reload.enabled);
    assert_eq!(cfg.reload.addr.port(), 35729);
    assert!(cfg.bindings.is_empty());
}

#[test]
fn test_empty_config_is_rejected() {
    let msg = config_error(load_from_str(""));
    assert!(msg.contains("at least one"), "{msg}");
}

#[test]
fn test_debounce_outside_range_is_rejected() {
    for value in [0, 9, 5001] {
        let toml = format!(
            "[config]\ndebounce_ms = {value}\n[task.a]\nsrc = [\"a/*\"]\n"
        );
        let msg = config_error(load_from_str(&toml));
        assert!(msg.contains("debounce_ms"), "{msg}");
    }

    let toml = "[config]\ndebounce_ms = 10\n[task.a]\nsrc = [\"a/*\"]\n";
    assert!(load_from_str(toml).is_ok());
}

#[test]
fn test_unknown_fields_are_rejected() {
    let result = load_from_str("[task.a]\nsrc = [\"a/*\"]\ndestination = \"out\"\n");
    assert!(matches!(result, Err(AssetdagError::Toml(_))), "{result:?}");
}

#[test]
fn test_unknown_stage_kind_is_rejected() {
    let result = load_from_str("[task.a]\nsrc = [\"a/*\"]\nstages = [{ kind = \"uglify\" }]\n");
    assert!(matches!(result, Err(AssetdagError::Toml(_))), "{result:?}");
}

#[test]
fn test_emit_requires_dest() {
    let msg = config_error(load_from_str(
        "[task.a]\nsrc = [\"a/*\"]\nstages = [{ kind = \"emit\" }]\n",
    ));
    assert!(msg.contains("emit"), "{msg}");
}

#[test]
fn test_absolute_dest_is_rejected() {
    let msg = config_error(load_from_str("[task.a]\nsrc = [\"a/*\"]\ndest = \"/tmp/out\"\n"));
    assert!(msg.contains("relative"), "{msg}");
}

#[test]
fn test_dest_must_stay_below_the_root() {
    for dest in ["", ".", "./", "../site", "public/../../out"] {
        let toml = format!("[task.a]\nsrc = [\"a/*\"]\ndest = \"{dest}\"\n");
        let msg = config_error(load_from_str(&toml));
        assert!(msg.contains("`dest`"), "{dest:?}: {msg}");
    }

    assert!(load_from_str("[task.a]\nsrc = [\"a/*\"]\ndest = \"./public\"\n").is_ok());
}

#[test]
fn test_clean_entries_must_stay_below_the_root() {
    let msg = config_error(load_from_str("[task.a]\nclean = { remove = [\"../other\"] }\n"));
    assert!(msg.contains("clean.remove"), "{msg}");
}

#[test]
fn test_clean_cannot_be_mixed_with_a_pipeline() {
    let msg = config_error(load_from_str(
        "[task.a]\nsrc = [\"a/*\"]\nclean = { remove = [\"build\"] }\n",
    ));
    assert!(msg.contains("clean"), "{msg}");

    let msg = config_error(load_from_str("[task.a]\nclean = { remove = [] }\n"));
    assert!(msg.contains("clean.remove"), "{msg}");
}

#[test]
fn test_task_needs_src_or_clean() {
    let msg = config_error(load_from_str("[task.a]\ndest = \"out\"\n"));
    assert!(msg.contains("'a'"), "{msg}");
}

#[test]
fn test_invalid_glob_is_a_config_error() {
    let msg = config_error(load_from_str("[task.a]\nsrc = [\"a/[b\"]\n"));
    assert!(msg.contains("invalid glob"), "{msg}");
}

#[test]
fn test_unknown_group_reference_is_a_graph_error() {
    let result = load_from_str("[task.a]\nsrc = [\"a/*\"]\n[group.all]\nmembers = [\"a\", \"b\"]\n");

    match result {
        Err(AssetdagError::Graph(GraphError::UnknownNode { referenced_by, name })) => {
            assert_eq!(referenced_by, "all");
            assert_eq!(name, "b");
        }
        other => panic!("expected an unknown reference, got {other:?}"),
    }
}

#[test]
fn test_groups_may_refer_to_groups_declared_later() {
    let cfg = load_from_str(
        r#"
        [task.a]
        src = ["a/*"]
        [task.b]
        src = ["b/*"]
        [group.all]
        after = ["zeta"]
        members = ["b"]
        [group.zeta]
        members = ["a"]
        "#,
    )
    .unwrap();

    let phases = cfg.graph.resolve_order("all").unwrap();
    assert_eq!(phases.len(), 2);
    assert_eq!(phases[0].tasks, vec!["a".to_string()]);
}

#[test]
fn test_group_loop_is_a_cycle() {
    let result = load_from_str(
        r#"
        [task.a]
        src = ["a/*"]
        [group.one]
        after = ["two"]
        [group.two]
        members = ["a", "one"]
        "#,
    );

    assert!(
        matches!(result, Err(AssetdagError::Graph(GraphError::Cycle { .. }))),
        "{result:?}"
    );
}

#[test]
fn test_overlapping_destinations_in_a_group_are_rejected() {
    let result = load_from_str(
        r#"
        [task.css]
        src = ["a/*"]
        dest = "public"
        [task.fonts]
        src = ["b/*"]
        dest = "public/fonts"
        [group.all]
        members = ["css", "fonts"]
        "#,
    );

    assert!(
        matches!(
            result,
            Err(AssetdagError::Graph(GraphError::DestinationConflict { .. }))
        ),
        "{result:?}"
    );
}

#[test]
fn test_watch_binding_must_name_known_tasks() {
    let result = load_from_str(
        "[task.a]\nsrc = [\"a/*\"]\n[[watch]]\npatterns = [\"a/*\"]\nrun = [\"missing\"]\n",
    );
    assert!(
        matches!(result, Err(AssetdagError::Graph(GraphError::UnknownNode { .. }))),
        "{result:?}"
    );

    let msg = config_error(load_from_str(
        "[task.a]\nsrc = [\"a/*\"]\n[[watch]]\npatterns = []\nrun = [\"a\"]\n",
    ));
    assert!(msg.contains("[[watch]]"), "{msg}");
}

#[test]
fn test_load_from_disk_resolves_root_against_config_dir() {
    let dir = TempDir::new().unwrap();
    write_file(
        dir.path(),
        "site/Assetdag.toml",
        "[config]\nroot = \"..\"\n[task.a]\nsrc = [\"a/*\"]\n",
    );
    let path = dir.path().join("site/Assetdag.toml");

    let cfg = load_and_validate(&path).unwrap();

    assert_eq!(
        project_root(&path, &cfg),
        dir.path().canonicalize().unwrap()
    );
}

#[test]
fn test_missing_config_file_is_an_error() {
    assert!(load_and_validate(Path::new("/nonexistent/Assetdag.toml")).is_err());
}

#[test]
fn test_bundled_project_config_is_valid() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("Assetdag.toml");
    let cfg = load_and_validate(&path).unwrap();

    let build = cfg.graph.resolve_order(&cfg.config.build_entry).unwrap();
    let last = build.last().unwrap();
    assert_eq!(last.tasks, vec!["cleanup-final".to_string()]);
    assert_eq!(build.len(), 5);

    let watch = cfg.graph.resolve_order(&cfg.config.watch_entry).unwrap();
    assert_eq!(watch.len(), 1);
    assert_eq!(cfg.bindings.len(), 3);

    let TaskAction::Pipeline(package) = &cfg.graph.task("package").unwrap().action else {
        panic!("package should be a pipeline task");
    };
    let allowed = package.selector.patterns();
    for file in ["**/*.php", "style.css", "package.json", "screenshot.png", ".gitignore"] {
        assert!(allowed.contains(&file.to_string()), "{file} missing from {allowed:?}");
    }
    assert!(!allowed.iter().any(|p| p == "**/*" || p.starts_with("assets/")));
    for excluded in ["build/index.php", "node_modules/pkg/a.php", "bower_components/x/b.php"] {
        assert!(!package.selector.matches(excluded), "{excluded} should not be packaged");
    }
    assert!(package.selector.matches("templates/page.php"));

    let TaskAction::Clean(cleanup) = &cfg.graph.task("cleanup").unwrap().action else {
        panic!("cleanup should be a clean task");
    };
    assert_eq!(
        cleanup.literal_targets(),
        &[PathBuf::from("bower_components"), PathBuf::from("library/vendors/composer")]
    );
    for pattern in ["**/build", "**/.sass-cache", "**/.codekit-cache", "**/.DS_Store"] {
        assert!(cleanup.glob_patterns().contains(&pattern.to_string()), "{pattern}");
    }
    assert!(!cleanup.glob_patterns().iter().any(|p| p.contains("assets/css")));
    assert!(cleanup.is_protected(Path::new("node_modules/pkg")));
}
