// src/pipeline/stages/lint.rs

use std::process::Stdio;

use tokio::process::Command;
use tracing::debug;

use crate::pipeline::fileset::FileSet;
use crate::pipeline::stage::{Stage, StageContext, StageError, StageFuture};

/// Runs an external checker over the files of the set.
///
/// The command is handed the on-disk paths as trailing arguments and runs
/// from the project root. A non-zero exit fails the stage with the tool's
/// output; otherwise the set passes through unchanged.
#[derive(Debug, Clone)]
pub struct Lint {
    cmd: String,
}

impl Lint {
    pub fn new(cmd: impl Into<String>) -> Self {
        Self { cmd: cmd.into() }
    }

    fn command(&self, files: &FileSet) -> Command {
        let paths = files.iter().map(|f| f.display_path().to_path_buf());

        #[cfg(windows)]
        let mut cmd = {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(&self.cmd);
            c.args(paths);
            c
        };

        #[cfg(not(windows))]
        let mut cmd = {
            let mut c = Command::new("sh");
            c.arg("-c")
                .arg(format!("{} \"$@\"", self.cmd))
                .arg("assetdag");
            c.args(paths);
            c
        };

        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }

    async fn check(&self, ctx: &StageContext, files: FileSet) -> Result<FileSet, StageError> {
        if files.is_empty() {
            return Ok(files);
        }

        let mut cmd = self.command(&files);
        cmd.current_dir(&ctx.root);
        debug!(cmd = %self.cmd, files = files.len(), "running lint command");

        let output = cmd
            .output()
            .await
            .map_err(|e| StageError::new(format!("failed to spawn `{}`: {}", self.cmd, e)))?;

        if output.status.success() {
            return Ok(files);
        }

        let mut report = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            if !report.is_empty() {
                report.push('\n');
            }
            report.push_str(stderr.trim());
        }

        Err(StageError::new(format!(
            "`{}` exited with {}{}{}",
            self.cmd,
            output.status,
            if report.is_empty() { "" } else { ":\n" },
            report
        )))
    }
}

impl Stage for Lint {
    fn name(&self) -> &str {
        "lint"
    }

    fn apply<'a>(&'a self, ctx: &'a StageContext, files: FileSet) -> StageFuture<'a> {
        Box::pin(self.check(ctx, files))
    }
}
