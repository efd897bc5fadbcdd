//! Pull-request collaborator.
//!
//! The coordinator publishes status comments and the commands read changed
//! files through [`PullRequestService`]. [`GitPullRequest`] reads the diff from
//! the local checkout and emits comments to stdout, optionally mirroring them
//! into a file that a later CI step posts to the hosting provider.

use crate::error::{GateError, Result};
use crate::git;
use crate::locks::TransactionId;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

pub trait PullRequestService {
    /// Publish `body` as a comment on pull request `pr`.
    fn publish_comment(&self, pr: TransactionId, body: &str) -> Result<()>;

    /// Paths (relative to the repo root) changed by the pull request.
    fn changed_files(&self) -> Result<Vec<String>>;
}

const COMMENT_SEPARATOR: &str = "---- tfgate comment ----";

/// Pull request backed by the local git checkout.
#[derive(Debug, Clone)]
pub struct GitPullRequest {
    repo_root: PathBuf,
    base: String,
    head: String,
    comments_file: Option<PathBuf>,
}

impl GitPullRequest {
    pub fn new(
        repo_root: impl Into<PathBuf>,
        base: impl Into<String>,
        head: impl Into<String>,
        comments_file: Option<PathBuf>,
    ) -> Self {
        Self {
            repo_root: repo_root.into(),
            base: base.into(),
            head: head.into(),
            comments_file,
        }
    }
}

impl PullRequestService for GitPullRequest {
    fn publish_comment(&self, pr: TransactionId, body: &str) -> Result<()> {
        println!("{} PR {}\n{}", COMMENT_SEPARATOR, pr, body);

        if let Some(path) = &self.comments_file {
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| {
                    GateError::UserError(format!(
                        "failed to open comments file '{}': {}",
                        path.display(),
                        e
                    ))
                })?;
            writeln!(file, "{} PR {}\n{}", COMMENT_SEPARATOR, pr, body).map_err(|e| {
                GateError::UserError(format!(
                    "failed to write comments file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    fn changed_files(&self) -> Result<Vec<String>> {
        git::changed_files(&self.repo_root, &self.base, &self.head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{commit_file, create_test_repo, git};

    #[test]
    fn test_comments_are_appended_to_file() {
        let temp_dir = create_test_repo();
        let comments = temp_dir.path().join("comments.txt");
        let pr = GitPullRequest::new(temp_dir.path(), "main", "HEAD", Some(comments.clone()));

        pr.publish_comment(TransactionId(7), "first").unwrap();
        pr.publish_comment(TransactionId(7), "second").unwrap();

        let content = std::fs::read_to_string(&comments).unwrap();
        assert_eq!(content.matches(COMMENT_SEPARATOR).count(), 2);
        assert!(content.contains("PR #7\nfirst"));
        assert!(content.find("first").unwrap() < content.find("second").unwrap());
    }

    #[test]
    fn test_changed_files_come_from_git_diff() {
        let temp_dir = create_test_repo();
        git(temp_dir.path(), &["checkout", "-b", "pr-7"]);
        commit_file(temp_dir.path(), "app/main.tf", "x\n");

        let pr = GitPullRequest::new(temp_dir.path(), "main", "pr-7", None);
        assert_eq!(pr.changed_files().unwrap(), vec!["app/main.tf"]);
    }
}
