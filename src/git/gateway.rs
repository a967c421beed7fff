//! Git status gateway contract
//!
//! The session layer asks a [`GitGateway`] for facts about a working tree.
//! Paths that do not exist or are not inside a git working tree produce
//! `None` / `false`; only environment failures (git missing, timeouts) are
//! errors.

use std::path::Path;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde::Serialize;

use crate::error::Result;

/// Snapshot of a working tree's status
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GitStatus {
    /// Current branch (or a detached-HEAD description)
    pub branch: String,
    /// Whether any tracked or untracked file differs from HEAD
    pub dirty: bool,
    /// Paths reported by `git status`
    pub uncommitted_files: Vec<String>,
    /// Commits ahead of the upstream
    pub ahead: u32,
    /// Commits behind the upstream
    pub behind: u32,
}

impl GitStatus {
    /// One-line summary, e.g. `main* +1 -2`
    pub fn summary(&self) -> String {
        let mut out = self.branch.clone();
        if self.dirty {
            out.push('*');
        }
        if self.ahead > 0 {
            out.push_str(&format!(" +{}", self.ahead));
        }
        if self.behind > 0 {
            out.push_str(&format!(" -{}", self.behind));
        }
        out
    }
}

/// Source of git facts for session status reports
#[async_trait]
pub trait GitGateway: Send + Sync {
    /// Status of the working tree containing `path`, or `None` if there is none.
    async fn get_status(&self, path: &Path) -> Result<Option<GitStatus>>;

    /// Whether `path` lies inside a git working tree.
    async fn is_git_repository(&self, path: &Path) -> Result<bool>;

    /// Message of the HEAD commit, or `None` without a repository or commits.
    async fn get_last_commit_message(&self, path: &Path) -> Result<Option<String>>;
}

static AHEAD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bahead (\d+)").expect("valid ahead regex"));
static BEHIND_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bbehind (\d+)").expect("valid behind regex"));

/// Fields parsed from `git status --porcelain=v1 --branch`
#[derive(Debug, Default, PartialEq, Eq)]
pub struct PorcelainStatus {
    pub files: Vec<String>,
    pub ahead: u32,
    pub behind: u32,
}

/// Parse `git status --porcelain=v1 --branch` output
///
/// The `## ` header carries ahead/behind counts; every other line is
/// `XY path`, with renames written as `old -> new` (the new path is kept).
pub fn parse_porcelain(output: &str) -> PorcelainStatus {
    let mut status = PorcelainStatus::default();

    for line in output.lines() {
        if let Some(header) = line.strip_prefix("## ") {
            let count = |re: &Regex| {
                re.captures(header)
                    .and_then(|c| c.get(1))
                    .and_then(|m| m.as_str().parse().ok())
                    .unwrap_or(0)
            };
            status.ahead = count(&AHEAD_RE);
            status.behind = count(&BEHIND_RE);
            continue;
        }

        let Some(path) = line.get(3..) else {
            continue;
        };
        let path = match path.split_once(" -> ") {
            Some((_, new)) => new,
            None => path,
        };
        let path = path.trim().trim_matches('"');
        if !path.is_empty() {
            status.files.push(path.to_string());
        }
    }

    status
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_clean_tracking_branch() {
        let parsed = parse_porcelain("## main...origin/main\n");
        assert_eq!(parsed, PorcelainStatus::default());
    }

    #[test]
    fn test_parse_ahead_behind_and_files() {
        let output = "## feature...origin/feature [ahead 3, behind 12]\n M src/lib.rs\nA  new.rs\n?? notes.txt\nR  old.rs -> renamed.rs\n";
        let parsed = parse_porcelain(output);

        assert_eq!(parsed.ahead, 3);
        assert_eq!(parsed.behind, 12);
        assert_eq!(
            parsed.files,
            vec!["src/lib.rs", "new.rs", "notes.txt", "renamed.rs"]
        );
    }

    #[test]
    fn test_parse_behind_only_and_gone() {
        assert_eq!(parse_porcelain("## main...origin/main [behind 2]").behind, 2);
        assert_eq!(parse_porcelain("## main...origin/main [gone]").ahead, 0);
    }

    #[test]
    fn test_parse_quoted_path() {
        let parsed = parse_porcelain("## No commits yet on main\n?? \"with space.txt\"\n");
        assert_eq!(parsed.files, vec!["with space.txt"]);
    }

    #[test]
    fn test_summary() {
        let status = GitStatus {
            branch: "main".to_string(),
            dirty: true,
            uncommitted_files: vec!["a".to_string()],
            ahead: 1,
            behind: 2,
        };
        assert_eq!(status.summary(), "main* +1 -2");
    }
}
