use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Runs one external program to completion and reports its exit code.
///
/// The installer only ever talks to the host through this trait, so tests can
/// swap in a recorder instead of touching real certificate stores.
pub trait CommandExecutor {
    fn execute(&mut self, program: &str, args: &[String]) -> Result<i32>;
}

/// Spawns real processes, blocking until each one exits.
pub struct SystemExecutor {
    dir: PathBuf,
}

impl SystemExecutor {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
        }
    }
}

impl CommandExecutor for SystemExecutor {
    fn execute(&mut self, program: &str, args: &[String]) -> Result<i32> {
        tracing::debug!(program, ?args, dir = %self.dir.display(), "spawning");

        // No console is shown for the tools; their output only reaches debug logs.
        let output = Command::new(program)
            .args(args)
            .current_dir(&self.dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .with_context(|| format!("failed to run {} {:?} in {}", program, args, self.dir.display()))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            tracing::debug!(program, stdout = %stdout.trim_end(), "tool output");
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            tracing::debug!(program, stderr = %stderr.trim_end(), "tool output");
        }

        match output.status.code() {
            Some(code) => Ok(code),
            None => bail!("{} {} terminated without an exit code", program, args.join(" ")),
        }
    }
}
