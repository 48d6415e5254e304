// src/pipeline/stages/mod.rs

//! Built-in stages and their declarative form.
//!
//! ```toml
//! stages = [
//!   { kind = "sass", style = "expanded" },
//!   { kind = "autoprefix" },
//!   { kind = "emit" },
//!   { kind = "rename", suffix = "-min" },
//!   { kind = "minify_css" },
//! ]
//! ```

pub mod autoprefix;
pub mod concat;
pub mod lint;
pub mod minify;
pub mod rename;
pub mod sass;

use std::path::PathBuf;

use serde::Deserialize;

use crate::pipeline::stage::{StageError, Step};

pub use autoprefix::Autoprefix;
pub use concat::Concat;
pub use lint::Lint;
pub use minify::{MinifyCss, MinifyJs};
pub use rename::Rename;
pub use sass::{Sass, SassStyle};

fn default_separator() -> String {
    "\n".to_string()
}

/// Declarative stage, as written in a task's `stages = [...]`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum StageSpec {
    Sass {
        #[serde(default)]
        style: SassStyle,
        #[serde(default)]
        load_paths: Vec<PathBuf>,
    },
    Autoprefix,
    Concat {
        file: String,
        #[serde(default = "default_separator")]
        separator: String,
    },
    Rename {
        #[serde(default)]
        prefix: Option<String>,
        #[serde(default)]
        suffix: Option<String>,
        #[serde(default)]
        extname: Option<String>,
        #[serde(default)]
        basename: Option<String>,
    },
    MinifyCss,
    MinifyJs,
    Lint {
        cmd: String,
    },
    Emit,
}

impl StageSpec {
    pub fn build(&self) -> Result<Step, StageError> {
        let step = match self {
            StageSpec::Sass { style, load_paths } => {
                Step::transform(Sass::new(*style, load_paths.clone()))
            }
            StageSpec::Autoprefix => Step::transform(Autoprefix::new()?),
            StageSpec::Concat { file, separator } => {
                Step::transform(Concat::new(file.clone(), separator.clone()))
            }
            StageSpec::Rename {
                prefix,
                suffix,
                extname,
                basename,
            } => Step::transform(Rename {
                prefix: prefix.clone(),
                suffix: suffix.clone(),
                extname: extname.clone(),
                basename: basename.clone(),
            }),
            StageSpec::MinifyCss => Step::transform(MinifyCss),
            StageSpec::MinifyJs => Step::transform(MinifyJs),
            StageSpec::Lint { cmd } => Step::transform(Lint::new(cmd.clone())),
            StageSpec::Emit => Step::Emit,
        };
        Ok(step)
    }
}
