//! Git command runner for tfgate.
//!
//! Provides a wrapper around git commands with captured stdout/stderr and
//! structured error handling. Used to locate the repository and to list the
//! files a pull request changes.

use crate::error::{GateError, Result};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

/// Result of a successful git command execution.
#[derive(Debug, Clone)]
pub struct GitOutput {
    /// Standard output from the command (trimmed).
    pub stdout: String,
    /// Standard error from the command (trimmed).
    pub stderr: String,
}

impl GitOutput {
    fn from_output(output: &Output) -> Self {
        Self {
            stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        }
    }

    /// Returns stdout lines as a vector.
    pub fn lines(&self) -> Vec<&str> {
        if self.stdout.is_empty() {
            Vec::new()
        } else {
            self.stdout.lines().collect()
        }
    }
}

/// Run a git command with the specified working directory.
///
/// # Returns
///
/// * `Ok(GitOutput)` - On successful execution (exit code 0)
/// * `Err(GateError::GitError)` - On non-zero exit code (mapped to exit code 3)
pub fn run_git<P: AsRef<Path>>(cwd: P, args: &[&str]) -> Result<GitOutput> {
    let cwd = cwd.as_ref();

    let output = Command::new("git")
        .current_dir(cwd)
        .args(args)
        .output()
        .map_err(|e| {
            GateError::GitError(format!(
                "failed to execute git {}: {}",
                args.first().unwrap_or(&""),
                e
            ))
        })?;

    let git_output = GitOutput::from_output(&output);

    if output.status.success() {
        Ok(git_output)
    } else {
        let exit_code = output.status.code().unwrap_or(-1);
        let error_msg = if git_output.stderr.is_empty() {
            git_output.stdout.clone()
        } else {
            git_output.stderr.clone()
        };

        Err(GateError::GitError(format!(
            "git {} failed (exit code {}): {}",
            args.first().unwrap_or(&""),
            exit_code,
            error_msg
        )))
    }
}

/// Get the repository root directory using `git rev-parse --show-toplevel`.
///
/// "Not a git repository" is reported as a user error (exit 1), not a git
/// failure (exit 3).
pub fn get_repo_root<P: AsRef<Path>>(cwd: P) -> Result<PathBuf> {
    let cwd = cwd.as_ref();

    let output = Command::new("git")
        .current_dir(cwd)
        .args(["rev-parse", "--show-toplevel"])
        .output()
        .map_err(|e| {
            GateError::UserError(format!("failed to execute git: {} (is git installed?)", e))
        })?;

    let git_output = GitOutput::from_output(&output);
    if output.status.success() {
        Ok(PathBuf::from(git_output.stdout))
    } else {
        Err(GateError::UserError(format!(
            "not inside a git repository ({}). Run tfgate from within the repository or pass --repo-dir.",
            cwd.display()
        )))
    }
}

/// Files changed between the merge base of `base` and `head`, relative to the repo root.
pub fn changed_files<P: AsRef<Path>>(repo_root: P, base: &str, head: &str) -> Result<Vec<String>> {
    let range = format!("{}...{}", base, head);
    let output = run_git(repo_root, &["diff", "--name-only", &range])?;
    Ok(output.lines().into_iter().map(str::to_string).collect())
}

/// `owner/name` of the `origin` remote, if it looks like a hosted repository URL.
pub fn origin_repository_name<P: AsRef<Path>>(repo_root: P) -> Option<String> {
    let output = run_git(repo_root, &["remote", "get-url", "origin"]).ok()?;
    parse_repository_name(&output.stdout)
}

/// Extract `owner/name` from `git@host:owner/name.git` or `https://host/owner/name(.git)`.
fn parse_repository_name(url: &str) -> Option<String> {
    let path = match url.split_once("://") {
        Some((_, rest)) => rest.split_once('/')?.1,
        None => url.split_once(':')?.1,
    };
    let path = path.trim_end_matches('/').trim_end_matches(".git");
    let mut parts = path.rsplitn(3, '/');
    let name = parts.next().filter(|s| !s.is_empty())?;
    let owner = parts.next().filter(|s| !s.is_empty())?;
    Some(format!("{}/{}", owner, name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{commit_file, create_test_repo, git};
    use tempfile::TempDir;

    #[test]
    fn test_run_git_captures_stdout() {
        let temp_dir = create_test_repo();
        let output = run_git(temp_dir.path(), &["rev-parse", "--show-toplevel"]).unwrap();
        assert!(!output.stdout.is_empty());
    }

    #[test]
    fn test_run_git_failure_returns_git_error() {
        let temp_dir = create_test_repo();
        let err = run_git(temp_dir.path(), &["checkout", "nonexistent-branch"]).unwrap_err();
        assert!(matches!(err, GateError::GitError(_)));
    }

    #[test]
    fn test_get_repo_root_from_subdirectory() {
        let temp_dir = create_test_repo();
        let subdir = temp_dir.path().join("terraform").join("infra");
        std::fs::create_dir_all(&subdir).unwrap();

        let root = get_repo_root(&subdir).unwrap();
        assert_eq!(
            root.canonicalize().unwrap(),
            temp_dir.path().canonicalize().unwrap()
        );
    }

    #[test]
    fn test_get_repo_root_outside_repo_returns_user_error() {
        let temp_dir = TempDir::new().unwrap();
        let err = get_repo_root(temp_dir.path()).unwrap_err();
        assert!(matches!(err, GateError::UserError(_)));
    }

    #[test]
    fn test_changed_files_against_base_branch() {
        let temp_dir = create_test_repo();
        let path = temp_dir.path();
        git(path, &["checkout", "-b", "feature"]);
        commit_file(path, "terraform/infra/main.tf", "resource {}\n");
        commit_file(path, "docs/notes.md", "notes\n");

        let mut files = changed_files(path, "main", "HEAD").unwrap();
        files.sort();
        assert_eq!(files, vec!["docs/notes.md", "terraform/infra/main.tf"]);
    }

    #[test]
    fn test_changed_files_unknown_ref_is_git_error() {
        let temp_dir = create_test_repo();
        let err = changed_files(temp_dir.path(), "no-such-ref", "HEAD").unwrap_err();
        assert!(matches!(err, GateError::GitError(_)));
    }

    #[test]
    fn test_origin_repository_name() {
        let temp_dir = create_test_repo();
        assert_eq!(origin_repository_name(temp_dir.path()), None);

        git(
            temp_dir.path(),
            &["remote", "add", "origin", "git@github.com:org/infra-live.git"],
        );
        assert_eq!(
            origin_repository_name(temp_dir.path()).as_deref(),
            Some("org/infra-live")
        );
    }

    #[test]
    fn test_parse_repository_name() {
        assert_eq!(
            parse_repository_name("https://github.com/org/repo.git").as_deref(),
            Some("org/repo")
        );
        assert_eq!(
            parse_repository_name("https://gitlab.example.com/group/sub/repo/").as_deref(),
            Some("sub/repo")
        );
        assert_eq!(
            parse_repository_name("git@github.com:org/repo").as_deref(),
            Some("org/repo")
        );
        assert_eq!(parse_repository_name("/local/path"), None);
    }
}
