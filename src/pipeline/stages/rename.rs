use std::path::{Path, PathBuf};

use crate::pipeline::fileset::FileSet;
use crate::pipeline::stage::{Stage, StageContext, StageFuture};

/// Rewrites the relative path of every file: `style.css` with
/// `suffix = "-min"` becomes `style-min.css`.
#[derive(Debug, Clone, Default)]
pub struct Rename {
    pub prefix: Option<String>,
    pub suffix: Option<String>,
    /// Replacement extension including the dot, e.g. `".css"`.
    pub extname: Option<String>,
    /// Replacement file stem.
    pub basename: Option<String>,
}

impl Rename {
    pub fn suffix(suffix: impl Into<String>) -> Self {
        Self {
            suffix: Some(suffix.into()),
            ..Self::default()
        }
    }

    pub fn rename_path(&self, path: &Path) -> PathBuf {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let ext = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();

        let stem = self.basename.clone().unwrap_or(stem);
        let ext = self.extname.clone().unwrap_or(ext);
        let name = format!(
            "{}{}{}{}",
            self.prefix.as_deref().unwrap_or(""),
            stem,
            self.suffix.as_deref().unwrap_or(""),
            ext
        );

        match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.join(name),
            _ => PathBuf::from(name),
        }
    }
}

impl Stage for Rename {
    fn name(&self) -> &str {
        "rename"
    }

    fn apply<'a>(&'a self, _ctx: &'a StageContext, files: FileSet) -> StageFuture<'a> {
        let renamed = files
            .into_iter()
            .map(|mut file| {
                file.relative = self.rename_path(&file.relative);
                file
            })
            .collect::<FileSet>();
        Box::pin(async move { Ok(renamed) })
    }
}
