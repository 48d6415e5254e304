use crate::pipeline::fileset::{FileSet, SourceFile};
use crate::pipeline::stage::{Stage, StageContext, StageFuture};

/// Joins the whole set, in order, into a single file.
#[derive(Debug, Clone)]
pub struct Concat {
    file: String,
    separator: String,
}

impl Concat {
    pub fn new(file: impl Into<String>, separator: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            separator: separator.into(),
        }
    }

    pub fn join(&self, files: FileSet) -> FileSet {
        if files.is_empty() {
            return FileSet::new();
        }

        let mut contents = Vec::new();
        for (i, file) in files.into_iter().enumerate() {
            if i > 0 {
                contents.extend_from_slice(self.separator.as_bytes());
            }
            contents.extend_from_slice(&file.contents);
        }

        FileSet::from(vec![SourceFile::new(self.file.as_str(), contents)])
    }
}

impl Stage for Concat {
    fn name(&self) -> &str {
        "concat"
    }

    fn apply<'a>(&'a self, _ctx: &'a StageContext, files: FileSet) -> StageFuture<'a> {
        let joined = self.join(files);
        Box::pin(async move { Ok(joined) })
    }
}
