// src/pipeline/fileset.rs

use std::path::{Path, PathBuf};

/// One file flowing through a pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Path relative to the glob base it was matched from; this is where the
    /// file lands under the task's destination.
    pub relative: PathBuf,
    /// Root-relative path of the file on disk it was read from. `None` for
    /// files synthesised by a stage (e.g. concatenation output).
    pub origin: Option<PathBuf>,
    pub contents: Vec<u8>,
}

impl SourceFile {
    pub fn new(relative: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) -> Self {
        Self {
            relative: relative.into(),
            origin: None,
            contents: contents.into(),
        }
    }

    pub fn with_origin(mut self, origin: impl Into<PathBuf>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Contents as UTF-8, lossily.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.contents).into_owned()
    }

    /// Path a tool should be pointed at: the origin when known, otherwise
    /// the relative path.
    pub fn display_path(&self) -> &Path {
        self.origin.as_deref().unwrap_or(&self.relative)
    }
}

/// Ordered sequence of files. Order is glob match order and is preserved by
/// every stage that does not explicitly merge or reorder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileSet {
    files: Vec<SourceFile>,
}

impl FileSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, file: SourceFile) {
        self.files.push(file);
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SourceFile> {
        self.files.iter()
    }

    pub fn get(&self, relative: impl AsRef<Path>) -> Option<&SourceFile> {
        let relative = relative.as_ref();
        self.files.iter().find(|f| f.relative == relative)
    }

    pub fn relative_paths(&self) -> Vec<PathBuf> {
        self.files.iter().map(|f| f.relative.clone()).collect()
    }

    /// Apply a fallible per-file mapping, preserving order. `Ok(None)` drops
    /// the file from the set.
    pub fn try_filter_map<E>(
        self,
        mut f: impl FnMut(SourceFile) -> Result<Option<SourceFile>, E>,
    ) -> Result<FileSet, E> {
        let mut out = Vec::with_capacity(self.files.len());
        for file in self.files {
            if let Some(mapped) = f(file)? {
                out.push(mapped);
            }
        }
        Ok(FileSet { files: out })
    }
}

impl From<Vec<SourceFile>> for FileSet {
    fn from(files: Vec<SourceFile>) -> Self {
        Self { files }
    }
}

impl FromIterator<SourceFile> for FileSet {
    fn from_iter<I: IntoIterator<Item = SourceFile>>(iter: I) -> Self {
        Self {
            files: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for FileSet {
    type Item = SourceFile;
    type IntoIter = std::vec::IntoIter<SourceFile>;

    fn into_iter(self) -> Self::IntoIter {
        self.files.into_iter()
    }
}

impl<'a> IntoIterator for &'a FileSet {
    type Item = &'a SourceFile;
    type IntoIter = std::slice::Iter<'a, SourceFile>;

    fn into_iter(self) -> Self::IntoIter {
        self.files.iter()
    }
}
