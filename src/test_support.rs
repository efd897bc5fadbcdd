use crate::error::{GateError, Result};
use crate::locks::TransactionId;
use crate::pull_request::PullRequestService;
use crate::terraform::{RunOutput, TerraformExecutor};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

pub(crate) fn create_test_repo() -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path();

    git(path, &["init"]);
    // Deterministic default branch name across environments.
    git(path, &["symbolic-ref", "HEAD", "refs/heads/main"]);

    git(path, &["config", "user.email", "test@example.com"]);
    git(path, &["config", "user.name", "Test User"]);

    std::fs::write(path.join("README.md"), "# Test\n").unwrap();
    git(path, &["add", "."]);
    git(path, &["commit", "-m", "Initial commit"]);

    temp_dir
}

/// Write `rel` under `repo_dir` and commit it.
pub(crate) fn commit_file(repo_dir: &Path, rel: &str, content: &str) {
    let path = repo_dir.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
    git(repo_dir, &["add", rel]);
    git(repo_dir, &["commit", "-m", &format!("Update {}", rel)]);
}

pub(crate) fn git(repo_dir: &Path, args: &[&str]) {
    let output = Command::new("git")
        .current_dir(repo_dir)
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("failed to execute git {}: {}", args.join(" "), e));

    if !output.status.success() {
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        panic!(
            "git {} failed (exit code {:?})\nstdout:\n{}\nstderr:\n{}",
            args.join(" "),
            output.status.code(),
            stdout,
            stderr
        );
    }
}

/// Pull request that records every published comment.
#[derive(Default)]
pub(crate) struct RecordingPullRequest {
    pub comments: RefCell<Vec<(TransactionId, String)>>,
    pub changed: Vec<String>,
    pub fail_publish: bool,
}

impl RecordingPullRequest {
    pub(crate) fn with_changed_files(files: &[&str]) -> Self {
        Self {
            changed: files.iter().map(|f| f.to_string()).collect(),
            ..Self::default()
        }
    }

    pub(crate) fn comment_bodies(&self) -> Vec<String> {
        self.comments
            .borrow()
            .iter()
            .map(|(_, body)| body.clone())
            .collect()
    }
}

impl PullRequestService for RecordingPullRequest {
    fn publish_comment(&self, pr: TransactionId, body: &str) -> Result<()> {
        self.comments.borrow_mut().push((pr, body.to_string()));
        if self.fail_publish {
            return Err(GateError::UserError("comment endpoint unavailable".to_string()));
        }
        Ok(())
    }

    fn changed_files(&self) -> Result<Vec<String>> {
        Ok(self.changed.clone())
    }
}

/// Terraform stand-in with per-directory exit codes. Unscripted directories
/// plan and apply with exit code `0`; missing ones fail to start.
#[derive(Default)]
pub(crate) struct ScriptedTerraform {
    plan_codes: HashMap<String, i32>,
    apply_codes: HashMap<String, i32>,
    missing_dirs: HashSet<String>,
    pub calls: RefCell<Vec<String>>,
}

impl ScriptedTerraform {
    pub(crate) fn plan_exits(mut self, directory: &str, exit_code: i32) -> Self {
        self.plan_codes.insert(directory.to_string(), exit_code);
        self
    }

    pub(crate) fn apply_exits(mut self, directory: &str, exit_code: i32) -> Self {
        self.apply_codes.insert(directory.to_string(), exit_code);
        self
    }

    pub(crate) fn missing_dir(mut self, directory: &str) -> Self {
        self.missing_dirs.insert(directory.to_string());
        self
    }

    fn check_dir(&self, directory: &str) -> Result<()> {
        if self.missing_dirs.contains(directory) {
            return Err(GateError::UserError(format!(
                "project directory '{}' does not exist",
                directory
            )));
        }
        Ok(())
    }

    fn output(exit_code: i32, stdout: &str) -> RunOutput {
        RunOutput {
            exit_code,
            stdout: stdout.to_string(),
            stderr: if exit_code == 0 || exit_code == 2 {
                String::new()
            } else {
                "Error: scripted failure".to_string()
            },
        }
    }
}

impl TerraformExecutor for ScriptedTerraform {
    fn run_plan(&self, directory: &str) -> Result<RunOutput> {
        self.calls.borrow_mut().push(format!("plan {}", directory));
        self.check_dir(directory)?;
        let code = self.plan_codes.get(directory).copied().unwrap_or(0);
        Ok(Self::output(code, "Plan: 1 to add, 0 to change, 0 to destroy."))
    }

    fn run_apply(&self, directory: &str) -> Result<RunOutput> {
        self.calls.borrow_mut().push(format!("apply {}", directory));
        self.check_dir(directory)?;
        let code = self.apply_codes.get(directory).copied().unwrap_or(0);
        Ok(Self::output(
            code,
            "Apply complete! Resources: 1 added, 0 changed, 0 destroyed.",
        ))
    }
}
