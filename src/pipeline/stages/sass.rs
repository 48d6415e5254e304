use std::path::PathBuf;

use serde::Deserialize;
use tracing::debug;

use crate::pipeline::fileset::FileSet;
use crate::pipeline::stage::{Stage, StageContext, StageError, StageFuture};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SassStyle {
    #[default]
    Expanded,
    Compressed,
}

impl From<SassStyle> for grass::OutputStyle {
    fn from(style: SassStyle) -> Self {
        match style {
            SassStyle::Expanded => grass::OutputStyle::Expanded,
            SassStyle::Compressed => grass::OutputStyle::Compressed,
        }
    }
}

/// Compiles SCSS to CSS. Partials (`_name.scss`) are only reachable through
/// imports and are dropped from the set.
#[derive(Debug, Clone)]
pub struct Sass {
    style: SassStyle,
    load_paths: Vec<PathBuf>,
}

impl Sass {
    pub fn new(style: SassStyle, load_paths: Vec<PathBuf>) -> Self {
        Self { style, load_paths }
    }

    fn compile(&self, ctx: &StageContext, files: FileSet) -> Result<FileSet, StageError> {
        files.try_filter_map(|mut file| {
            let is_partial = file
                .relative
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with('_'));
            if is_partial {
                debug!(file = ?file.relative, "skipping sass partial");
                return Ok(None);
            }

            let mut options = grass::Options::default().style(self.style.into());
            if let Some(dir) = file.origin.as_ref().and_then(|o| o.parent()) {
                options = options.load_path(ctx.root.join(dir));
            }
            for path in &self.load_paths {
                options = options.load_path(ctx.root.join(path));
            }

            let css = grass::from_string(file.text(), &options).map_err(|e| {
                StageError::new(format!("{}: {}", file.display_path().display(), e))
            })?;

            file.relative.set_extension("css");
            file.contents = css.into_bytes();
            Ok(Some(file))
        })
    }
}

impl Stage for Sass {
    fn name(&self) -> &str {
        "sass"
    }

    fn apply<'a>(&'a self, ctx: &'a StageContext, files: FileSet) -> StageFuture<'a> {
        Box::pin(async move { self.compile(ctx, files) })
    }
}
