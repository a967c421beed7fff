//! Git backend
//!
//! gitoxide handles repository discovery and HEAD inspection; working tree
//! status and commit messages come from the `git` CLI, whose porcelain output
//! already accounts for ignore rules and upstream tracking.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use gix::Repository;
use tracing::{debug, instrument};

use super::command::GitRunner;
use super::gateway::{GitGateway, GitStatus, parse_porcelain};
use crate::error::{GitError, Result};

/// Repository handle opened through gitoxide
pub struct GitBackend {
    /// The gitoxide repository handle
    repo: Repository,
    /// Path to the working tree root
    path: PathBuf,
}

impl GitBackend {
    /// Discover repository from a path (searches parent directories)
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn discover(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let repo = gix::discover(path).map_err(|e| {
            debug!("No repository at {:?}: {}", path, e);
            GitError::NotARepository(path.to_path_buf())
        })?;

        let repo_path = repo
            .path()
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| path.to_path_buf());

        debug!("Discovered repository at {:?}", repo_path);

        Ok(Self {
            repo,
            path: repo_path,
        })
    }

    /// Get the current branch name
    pub fn current_branch(&self) -> Result<String> {
        let head = self.repo.head().map_err(|e| GitError::Gix(e.to_string()))?;

        match head.kind {
            gix::head::Kind::Symbolic(reference) => Ok(reference.name.shorten().to_string()),
            gix::head::Kind::Detached { .. } => match head.id() {
                Some(id) => {
                    let id_str = id.to_string();
                    let short = if id_str.len() > 8 { &id_str[..8] } else { &id_str };
                    Ok(format!("HEAD detached at {}", short))
                }
                None => Ok("HEAD (no commits)".to_string()),
            },
            // Unborn branch: the full name is the reference the first commit will create
            gix::head::Kind::Unborn(full_name) => Ok(full_name.shorten().to_string()),
        }
    }

    /// Get the repository name (directory name)
    pub fn repo_name(&self) -> String {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string()
    }
}

/// [`GitGateway`] backed by gitoxide and the `git` CLI
#[derive(Debug, Clone, Default)]
pub struct GitCliGateway {
    runner: GitRunner,
}

impl GitCliGateway {
    pub fn new(runner: GitRunner) -> Self {
        Self { runner }
    }

    fn open(path: &Path) -> Option<GitBackend> {
        if !path.exists() {
            return None;
        }
        GitBackend::discover(path).ok()
    }
}

#[async_trait]
impl GitGateway for GitCliGateway {
    #[instrument(skip(self))]
    async fn get_status(&self, path: &Path) -> Result<Option<GitStatus>> {
        // The gitoxide handle is not Send, so read HEAD before awaiting
        let branch = match Self::open(path) {
            Some(backend) => backend.current_branch()?,
            None => return Ok(None),
        };

        let output = self
            .runner
            .run(path, &["status", "--porcelain=v1", "--branch"])
            .await?;
        if !output.success {
            // e.g. a bare repository: no working tree to report on
            debug!("git status failed: {}", output.stderr.trim());
            return Ok(None);
        }

        let parsed = parse_porcelain(&output.stdout);

        Ok(Some(GitStatus {
            branch,
            dirty: !parsed.files.is_empty(),
            uncommitted_files: parsed.files,
            ahead: parsed.ahead,
            behind: parsed.behind,
        }))
    }

    async fn is_git_repository(&self, path: &Path) -> Result<bool> {
        Ok(Self::open(path).is_some())
    }

    #[instrument(skip(self))]
    async fn get_last_commit_message(&self, path: &Path) -> Result<Option<String>> {
        if Self::open(path).is_none() {
            return Ok(None);
        }

        let output = self.runner.run(path, &["log", "-1", "--format=%B"]).await?;
        if !output.success {
            // Unborn HEAD
            return Ok(None);
        }

        let message = output.stdout.trim();
        Ok((!message.is_empty()).then(|| message.to_string()))
    }
}
