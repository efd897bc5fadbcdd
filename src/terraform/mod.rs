//! Terraform execution.
//!
//! The coordinator only sees [`TerraformExecutor`]; [`TerraformCli`] is the
//! implementation that shells out to the configured binary.

mod cli;
mod output;

pub use cli::TerraformCli;
pub use output::{cleanup_apply_output, cleanup_plan_output};

use crate::error::{GateError, Result};

/// Captured result of one plan or apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutput {
    /// `0` no changes, `2` changes present/applied, anything else failure.
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

/// How a run ended, as far as lock release is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    NoChanges,
    Changes,
    Failed,
}

impl RunOutput {
    pub fn outcome(&self) -> RunOutcome {
        match self.exit_code {
            0 => RunOutcome::NoChanges,
            2 => RunOutcome::Changes,
            _ => RunOutcome::Failed,
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome() != RunOutcome::Failed
    }
}

/// Runs Terraform in a project directory.
pub trait TerraformExecutor {
    fn run_plan(&self, directory: &str) -> Result<RunOutput>;
    fn run_apply(&self, directory: &str) -> Result<RunOutput>;
}

/// Executor for pull request events, which only take and release locks.
pub struct NoTerraform;

impl NoTerraform {
    fn refuse(directory: &str) -> GateError {
        GateError::UserError(format!(
            "terraform is not run for pull request events (project dir '{}')",
            directory
        ))
    }
}

impl TerraformExecutor for NoTerraform {
    fn run_plan(&self, directory: &str) -> Result<RunOutput> {
        Err(Self::refuse(directory))
    }

    fn run_apply(&self, directory: &str) -> Result<RunOutput> {
        Err(Self::refuse(directory))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(exit_code: i32) -> RunOutput {
        RunOutput {
            exit_code,
            stdout: String::new(),
            stderr: String::new(),
        }
    }

    #[test]
    fn test_exit_codes_map_to_outcomes() {
        assert_eq!(output(0).outcome(), RunOutcome::NoChanges);
        assert_eq!(output(2).outcome(), RunOutcome::Changes);
        assert_eq!(output(1).outcome(), RunOutcome::Failed);
        assert_eq!(output(-1).outcome(), RunOutcome::Failed);
        assert!(output(0).is_success());
        assert!(output(2).is_success());
        assert!(!output(3).is_success());
    }

    #[test]
    fn test_no_terraform_refuses_to_run() {
        let err = NoTerraform.run_plan("terraform/infra").unwrap_err();
        assert!(matches!(err, GateError::UserError(_)));
        assert!(NoTerraform.run_apply("terraform/infra").is_err());
    }
}
