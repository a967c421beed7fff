//! Async `git` subprocess runner with a timeout

use std::io::ErrorKind;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, instrument, warn};

use crate::error::{GitError, Result};

/// Default command timeout
pub const DEFAULT_GIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Output of a finished git command
#[derive(Debug, Clone)]
pub struct GitOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

/// Runs `git` in a working directory
#[derive(Debug, Clone)]
pub struct GitRunner {
    timeout: Duration,
}

impl Default for GitRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl GitRunner {
    pub fn new() -> Self {
        Self {
            timeout: DEFAULT_GIT_TIMEOUT,
        }
    }

    /// Set the command timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run git and return its output whatever the exit status
    ///
    /// Only a missing binary, a spawn failure or a timeout is an error.
    #[instrument(skip_all, fields(dir = %dir.display(), args = ?args))]
    pub async fn run(&self, dir: &Path, args: &[&str]) -> Result<GitOutput> {
        let mut cmd = Command::new("git");
        cmd.current_dir(dir)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        match timeout(self.timeout, cmd.output()).await {
            Ok(Ok(output)) => {
                let out = GitOutput {
                    success: output.status.success(),
                    stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                    stderr: String::from_utf8_lossy(&output.stderr).to_string(),
                };
                if !out.success {
                    debug!("git {} exited with {}", args.join(" "), output.status);
                }
                Ok(out)
            }
            Ok(Err(e)) if e.kind() == ErrorKind::NotFound => Err(GitError::NotInstalled.into()),
            Ok(Err(e)) => {
                warn!("git command failed: {}", e);
                Err(GitError::CommandFailed {
                    command: format!("git {}", args.join(" ")),
                    stderr: e.to_string(),
                }
                .into())
            }
            Err(_) => Err(GitError::Timeout(self.timeout).into()),
        }
    }
}
