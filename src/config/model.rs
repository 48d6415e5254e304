// src/config/model.rs

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::dag::TaskGraph;
use crate::pipeline::StageSpec;
use crate::watch::WatchBinding;

/// Raw configuration as read from a TOML file, before validation.
///
/// ```toml
/// [config]
/// build_entry = "build"
///
/// [task.styles]
/// src = ["assets/sass/**/*.scss"]
/// dest = "assets/css"
/// stages = [{ kind = "sass" }, { kind = "minify_css" }]
///
/// [group.build]
/// after = ["cleanup", "styles"]
///
/// [[watch]]
/// patterns = ["assets/sass/**/*.scss"]
/// run = ["styles"]
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    #[serde(default)]
    pub config: ConfigSection,

    #[serde(default)]
    pub reload: ReloadSection,

    /// All tasks from `[task.<name>]`.
    #[serde(default)]
    pub task: BTreeMap<String, TaskConfig>,

    /// All groups from `[group.<name>]`.
    #[serde(default)]
    pub group: BTreeMap<String, GroupConfig>,

    /// Watch bindings from `[[watch]]`, in declaration order.
    #[serde(default)]
    pub watch: Vec<WatchConfig>,
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigSection {
    /// Project root, relative to the directory holding the config file.
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Entry run by `assetdag build`.
    #[serde(default = "default_build_entry")]
    pub build_entry: String,

    /// Entry run once by `assetdag watch` before watching starts.
    #[serde(default = "default_watch_entry")]
    pub watch_entry: String,

    /// Quiet period before a triggered binding runs.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_build_entry() -> String {
    "build".to_string()
}

fn default_watch_entry() -> String {
    "default".to_string()
}

fn default_debounce_ms() -> u64 {
    200
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            root: default_root(),
            build_entry: default_build_entry(),
            watch_entry: default_watch_entry(),
            debounce_ms: default_debounce_ms(),
        }
    }
}

impl ConfigSection {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

/// `[reload]` section: the live-reload websocket listener used in watch
/// mode.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReloadSection {
    #[serde(default = "default_reload_enabled")]
    pub enabled: bool,

    #[serde(default = "default_reload_addr")]
    pub addr: SocketAddr,
}

fn default_reload_enabled() -> bool {
    true
}

fn default_reload_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 35729))
}

impl Default for ReloadSection {
    fn default() -> Self {
        Self {
            enabled: default_reload_enabled(),
            addr: default_reload_addr(),
        }
    }
}

/// `[task.<name>]` section.
///
/// A task is either a pipeline (`src` + `stages` + `dest`) or a cleanup
/// (`clean`), never both.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct TaskConfig {
    /// Ordered include patterns; `"!pattern"` entries deny.
    #[serde(default)]
    pub src: Vec<String>,

    #[serde(default)]
    pub exclude: Vec<String>,

    /// Destination directory, relative to the project root.
    #[serde(default)]
    pub dest: Option<PathBuf>,

    /// Fail with "no match" when `src` selects nothing.
    #[serde(default = "default_require_match")]
    pub require_match: bool,

    #[serde(default)]
    pub stages: Vec<StageSpec>,

    #[serde(default)]
    pub clean: Option<CleanConfig>,
}

fn default_require_match() -> bool {
    true
}

/// `clean = { remove = [...], protect = [...] }`.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct CleanConfig {
    #[serde(default)]
    pub remove: Vec<String>,

    /// When omitted, `node_modules` and `.git` are protected.
    #[serde(default)]
    pub protect: Option<Vec<String>>,
}

/// `[group.<name>]` section.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct GroupConfig {
    /// Strict sequence, each element completing before the next starts.
    #[serde(default)]
    pub after: Vec<String>,

    /// Run concurrently after the whole sequence.
    #[serde(default)]
    pub members: Vec<String>,
}

/// `[[watch]]` entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WatchConfig {
    pub patterns: Vec<String>,

    #[serde(default)]
    pub exclude: Vec<String>,

    /// Tasks/groups run one after another when a matching file changes.
    pub run: Vec<String>,

    #[serde(default)]
    pub use_hash: bool,
}

impl From<&WatchConfig> for WatchBinding {
    fn from(cfg: &WatchConfig) -> Self {
        WatchBinding::new(cfg.patterns.clone(), cfg.run.clone())
            .exclude(cfg.exclude.clone())
            .use_hash(cfg.use_hash)
    }
}

/// Validated configuration: every task and group registered into a
/// [`TaskGraph`], every watch binding checked against it.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub config: ConfigSection,
    pub reload: ReloadSection,
    pub graph: Arc<TaskGraph>,
    pub bindings: Vec<WatchBinding>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        config: ConfigSection,
        reload: ReloadSection,
        graph: TaskGraph,
        bindings: Vec<WatchBinding>,
    ) -> Self {
        Self {
            config,
            reload,
            graph: Arc::new(graph),
            bindings,
        }
    }
}
