use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;

use assetdag::clean::CleanSpec;
use assetdag::fs::mock::MockFileSystem;
use assetdag::fs::{FileSystem, RealFileSystem};
use assetdag::pipeline::ExecContext;
use assetdag_test_utils::{read_file, write_file};

fn strings(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn project() -> MockFileSystem {
    let fs = MockFileSystem::new();
    fs.add_file("./build/index.html", b"<html></html>".to_vec());
    fs.add_file("./build/assets/app.css", b".a{}".to_vec());
    fs.add_file("./assets/css/app.css", b".a { }".to_vec());
    fs.add_file("./assets/css/app-min.css", b".a{}".to_vec());
    fs.add_file("./assets/js/dist/app.js", b"app();".to_vec());
    fs.add_file("./assets/js/app/main.js", b"main();".to_vec());
    fs.add_file("./node_modules/pkg/dist/index.js", b"module.exports = 1;".to_vec());
    fs.add_file("./.git/HEAD", b"ref: refs/heads/main".to_vec());
    fs
}

fn ctx(fs: &MockFileSystem) -> ExecContext {
    ExecContext::new(".", Arc::new(fs.clone()))
}

#[test]
fn test_targets_cover_literal_and_glob_entries() {
    let fs = project();
    let spec =
        CleanSpec::with_default_protect(&strings(&["build", "assets/**/dist", "**/*-min.css"]))
            .unwrap();

    let targets = spec.targets(&ctx(&fs)).unwrap();

    assert_eq!(
        targets,
        vec![
            PathBuf::from("assets/css/app-min.css"),
            PathBuf::from("assets/js/dist"),
            PathBuf::from("build"),
        ]
    );
    assert_eq!(spec.literal_targets(), &[PathBuf::from("build")]);
}

#[test]
fn test_default_protect_keeps_dependencies_and_vcs() {
    let fs = project();
    let spec = CleanSpec::with_default_protect(&strings(&["node_modules", ".git", "**/dist"])).unwrap();

    let targets = spec.targets(&ctx(&fs)).unwrap();

    assert_eq!(targets, vec![PathBuf::from("assets/js/dist")]);
    assert!(spec.is_protected(Path::new("node_modules/pkg/dist")));
    assert!(spec.is_protected(Path::new(".git")));
}

#[test]
fn test_ancestor_of_a_protected_path_is_not_removed() {
    let fs = project();
    let spec = CleanSpec::new(&strings(&["assets"]), &strings(&["assets/js/app"])).unwrap();

    assert!(spec.is_protected(Path::new("assets")));
    assert!(spec.targets(&ctx(&fs)).unwrap().is_empty());
}

#[test]
fn test_negated_remove_entry_protects() {
    let fs = project();
    let spec = CleanSpec::new(&strings(&["assets/css/*.css", "!assets/css/app.css"]), &[]).unwrap();

    let targets = spec.targets(&ctx(&fs)).unwrap();

    assert_eq!(targets, vec![PathBuf::from("assets/css/app-min.css")]);
    assert_eq!(spec.protect_patterns(), strings(&["assets/css/app.css"]).as_slice());
}

#[test]
fn test_project_root_is_never_a_target() {
    let fs = project();
    let spec = CleanSpec::new(&strings(&["."]), &[]).unwrap();

    assert!(spec.is_protected(Path::new("")));
    assert!(spec.is_protected(Path::new(".")));
    assert!(spec.targets(&ctx(&fs)).unwrap().is_empty());
}

#[test]
fn test_execute_removes_targets_from_the_tree() {
    let fs = project();
    let spec = CleanSpec::with_default_protect(&strings(&["build", "**/*-min.css"])).unwrap();

    let removed = spec.execute(&ctx(&fs)).unwrap();

    assert_eq!(
        removed,
        vec![PathBuf::from("assets/css/app-min.css"), PathBuf::from("build")]
    );
    let remaining = fs.file_paths();
    assert!(remaining.iter().all(|p| !p.starts_with("./build")));
    assert!(remaining.contains(&PathBuf::from("./assets/css/app.css")));
    assert!(remaining.contains(&PathBuf::from("./node_modules/pkg/dist/index.js")));
}

#[test]
fn test_missing_targets_are_not_an_error() {
    let fs = MockFileSystem::new();
    let spec = CleanSpec::with_default_protect(&strings(&["build", "**/*.map"])).unwrap();

    assert!(spec.execute(&ctx(&fs)).unwrap().is_empty());
}

#[test]
fn test_execute_on_disk() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "build/index.html", "<html></html>");
    write_file(dir.path(), "build/assets/app.css", ".a{}");
    write_file(dir.path(), "assets/css/app.css", ".a { }");
    write_file(dir.path(), "node_modules/pkg/build/x.js", "x");

    let spec = CleanSpec::with_default_protect(&strings(&["build", "**/build"])).unwrap();
    let ctx = ExecContext::new(dir.path(), Arc::new(RealFileSystem));

    let removed = spec.execute(&ctx).unwrap();

    assert_eq!(removed, vec![PathBuf::from("build")]);
    assert!(!dir.path().join("build").exists());
    assert_eq!(read_file(dir.path(), "assets/css/app.css").as_deref(), Some(".a { }"));
    assert!(dir.path().join("node_modules/pkg/build/x.js").exists());
}

#[test]
fn test_symlinked_directories_are_not_walked() {
    let fs = project();
    fs.add_file("./assets/.DS_Store", b"".to_vec());
    fs.add_file("./node_modules/pkg/.DS_Store", b"".to_vec());
    fs.add_symlink("./linked", "./node_modules");
    let spec = CleanSpec::with_default_protect(&strings(&["**/.DS_Store"])).unwrap();

    let removed = spec.execute(&ctx(&fs)).unwrap();

    assert_eq!(removed, vec![PathBuf::from("assets/.DS_Store")]);
    assert!(fs.file_paths().contains(&PathBuf::from("./node_modules/pkg/.DS_Store")));
}

#[test]
fn test_symlink_target_is_removed_as_a_link() {
    let fs = project();
    fs.add_symlink("./linked", "./node_modules");
    let spec = CleanSpec::with_default_protect(&strings(&["linked"])).unwrap();

    let removed = spec.execute(&ctx(&fs)).unwrap();

    assert_eq!(removed, vec![PathBuf::from("linked")]);
    assert!(!fs.is_symlink(Path::new("./linked")));
    assert!(fs.file_paths().contains(&PathBuf::from("./node_modules/pkg/dist/index.js")));
}

#[cfg(unix)]
#[test]
fn test_execute_on_disk_never_reaches_through_symlinks() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "assets/.DS_Store", "");
    write_file(dir.path(), "node_modules/pkg/.DS_Store", "");
    write_file(dir.path(), "node_modules/pkg/index.js", "x");
    std::os::unix::fs::symlink(dir.path().join("node_modules"), dir.path().join("linked")).unwrap();

    let spec = CleanSpec::with_default_protect(&strings(&["**/.DS_Store", "linked/pkg"])).unwrap();
    let ctx = ExecContext::new(dir.path(), Arc::new(RealFileSystem));

    let removed = spec.execute(&ctx).unwrap();

    assert_eq!(removed, vec![PathBuf::from("assets/.DS_Store")]);
    assert!(dir.path().join("node_modules/pkg/.DS_Store").exists());
    assert!(dir.path().join("node_modules/pkg/index.js").exists());

    let spec = CleanSpec::with_default_protect(&strings(&["linked"])).unwrap();
    assert_eq!(spec.execute(&ctx).unwrap(), vec![PathBuf::from("linked")]);
    assert!(!dir.path().join("linked").is_symlink());
    assert!(dir.path().join("node_modules/pkg/index.js").exists());
}
