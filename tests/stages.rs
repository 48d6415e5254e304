use std::path::{Path, PathBuf};

use tempfile::TempDir;

use assetdag::pipeline::stages::{Autoprefix, Concat, Lint, MinifyCss, MinifyJs, Rename, StageSpec};
use assetdag::pipeline::{FileSet, SourceFile, Stage, StageContext, Step};

fn set(files: &[(&str, &str)]) -> FileSet {
    FileSet::from(
        files
            .iter()
            .map(|(path, contents)| SourceFile::new(*path, *contents).with_origin(*path))
            .collect::<Vec<_>>(),
    )
}

fn stage_ctx(root: &Path) -> StageContext {
    StageContext {
        root: root.to_path_buf(),
    }
}

#[test]
fn test_autoprefix_adds_vendor_copies_before_the_declaration() {
    let css = ".a {\n  transform: rotate(45deg);\n  color: red;\n}\n";

    let out = Autoprefix::new().unwrap().prefix_css(css);

    assert_eq!(
        out,
        ".a {\n  -webkit-transform: rotate(45deg);\n  -ms-transform: rotate(45deg);\n  transform: rotate(45deg);\n  color: red;\n}\n"
    );
}

#[test]
fn test_autoprefix_leaves_prefixed_and_unrelated_properties_alone() {
    let css = ".a {\n  -webkit-transition: none;\n  transform-origin: 0 0;\n  margin: 0;\n}\n";

    assert_eq!(Autoprefix::new().unwrap().prefix_css(css), css);
}

#[test]
fn test_minify_js_strips_comments_outside_strings() {
    let src = "/*! keep me */\n// line comment\nvar url = \"http://example.com\"; // trailing stays\n/* block\n spanning */\n\n    if (a) {\n        b();\n    }\n";

    let out = MinifyJs::minify(src);

    assert_eq!(
        out,
        "/*! keep me */\nvar url = \"http://example.com\"; // trailing stays\nif (a) {\nb();\n}\n"
    );
}

#[test]
fn test_minify_js_keeps_escaped_quotes_in_strings() {
    let src = "var s = 'it\\'s /* not a comment */';\n";

    assert_eq!(MinifyJs::minify(src), src);
}

#[test]
fn test_minify_js_quote_in_trailing_comment_opens_no_string() {
    let src = "a(); // don't\nvar s = 'x/*y';\nb();\n/* c */\n";

    assert_eq!(MinifyJs::minify(src), "a(); // don't\nvar s = 'x/*y';\nb();\n");
}

#[test]
fn test_minify_css_compresses_and_drops_comments() {
    let out = MinifyCss::minify("/* header */\n.a {\n  color: red;\n}\n").unwrap();

    assert!(!out.contains("header"), "{out}");
    assert_eq!(out.trim(), ".a{color:red}");
}

#[test]
fn test_minify_css_rejects_malformed_input() {
    assert!(MinifyCss::minify(".a { color: red;").is_err());
}

#[test]
fn test_rename_rewrites_file_names_only() {
    let suffix = Rename::suffix("-min");
    assert_eq!(
        suffix.rename_path(Path::new("pages/home.css")),
        PathBuf::from("pages/home-min.css")
    );

    let full = Rename {
        prefix: Some("x.".to_string()),
        suffix: None,
        extname: Some(".scss".to_string()),
        basename: Some("main".to_string()),
    };
    assert_eq!(full.rename_path(Path::new("app.css")), PathBuf::from("x.main.scss"));
}

#[test]
fn test_concat_of_empty_set_is_empty() {
    assert!(Concat::new("app.js", "\n").join(FileSet::new()).is_empty());
}

#[test]
fn test_stage_spec_parses_from_toml() {
    #[derive(serde::Deserialize)]
    struct Wrapper {
        stages: Vec<StageSpec>,
    }

    let parsed: Wrapper = toml::from_str(
        r#"stages = [
            { kind = "sass", style = "compressed" },
            { kind = "rename", suffix = "-min" },
            { kind = "concat", file = "app.js" },
            { kind = "lint", cmd = "jshint" },
            { kind = "emit" },
        ]"#,
    )
    .unwrap();

    assert_eq!(parsed.stages.len(), 5);
    assert!(matches!(
        &parsed.stages[2],
        StageSpec::Concat { file, separator } if file == "app.js" && separator == "\n"
    ));
    assert!(matches!(parsed.stages[4].build().unwrap(), Step::Emit));
    assert_eq!(parsed.stages[1].build().unwrap().label(), "rename");
}

#[test]
fn test_stage_spec_rejects_unknown_kind() {
    #[derive(Debug, serde::Deserialize)]
    #[allow(dead_code)]
    struct Wrapper {
        stages: Vec<StageSpec>,
    }

    assert!(toml::from_str::<Wrapper>(r#"stages = [{ kind = "uglify" }]"#).is_err());
}

#[cfg(unix)]
#[tokio::test]
async fn test_lint_passes_set_through_on_success() {
    let dir = TempDir::new().unwrap();
    let files = set(&[("a.js", "var a;"), ("b.js", "var b;")]);

    let out = Lint::new("true")
        .apply(&stage_ctx(dir.path()), files.clone())
        .await
        .unwrap();

    assert_eq!(out, files);
}

#[cfg(unix)]
#[tokio::test]
async fn test_lint_failure_carries_tool_output() {
    let dir = TempDir::new().unwrap();
    let files = set(&[("assets/js/app.js", "var a")]);

    let err = Lint::new("echo \"missing semicolon in\"; exit 3; :")
        .apply(&stage_ctx(dir.path()), files)
        .await
        .unwrap_err();

    assert!(err.message.contains("missing semicolon in"), "{}", err.message);
}

#[cfg(unix)]
#[tokio::test]
async fn test_lint_receives_source_paths_as_arguments() {
    let dir = TempDir::new().unwrap();
    let files = set(&[("assets/js/one.js", ""), ("assets/js/two.js", "")]);

    let ok = Lint::new("test \"$#\" -eq 2 && test \"$1\" = assets/js/one.js && printf '%s\\n'")
        .apply(&stage_ctx(dir.path()), files.clone())
        .await;
    assert!(ok.is_ok(), "{ok:?}");

    let wrong_count = Lint::new("test \"$#\" -eq 3 && printf '%s\\n'")
        .apply(&stage_ctx(dir.path()), files)
        .await;
    assert!(wrong_count.is_err());
}
