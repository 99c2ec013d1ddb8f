//! External tool invocation.

use std::ffi::OsStr;
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};

use loopvol_shared::errors::{LoopvolError, LoopvolResult};

/// Captured result of a finished tool.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    pub fn code(&self) -> Option<i32> {
        self.status.code()
    }

    /// stdout followed by stderr, trimmed, for diagnostics.
    pub fn combined(&self) -> String {
        let mut out = String::with_capacity(self.stdout.len() + self.stderr.len() + 1);
        out.push_str(self.stdout.trim_end());
        let stderr = self.stderr.trim_end();
        if !out.is_empty() && !stderr.is_empty() {
            out.push('\n');
        }
        out.push_str(stderr);
        out
    }
}

/// Run `program` with `args` to completion and capture its output.
///
/// A non-zero exit is not an error here; callers decide what it means.
/// Failing to spawn the program at all is an `Environment` error.
pub fn run_tool<I, S>(program: &Path, args: I) -> LoopvolResult<ToolOutput>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    tracing::debug!(command = ?cmd, "Running tool");

    let output = cmd.output().map_err(|e| {
        LoopvolError::Environment(format!("Failed to run {}: {}", program.display(), e))
    })?;

    let result = ToolOutput {
        status: output.status,
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    };

    tracing::trace!(
        program = %program.display(),
        code = ?result.code(),
        "Tool finished"
    );

    Ok(result)
}
