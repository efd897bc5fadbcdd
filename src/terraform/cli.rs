//! Terraform subprocess runner.

use super::output::apply_changed_resources;
use super::{RunOutput, TerraformExecutor};
use crate::config::Config;
use crate::error::{GateError, Result};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Runs `<command> init` followed by `plan` or `apply` in a project directory.
#[derive(Debug, Clone)]
pub struct TerraformCli {
    program: String,
    base_args: Vec<String>,
    plan_args: Vec<String>,
    apply_args: Vec<String>,
    repo_root: PathBuf,
}

impl TerraformCli {
    /// Build from the `terraform` config section; project dirs resolve against `repo_root`.
    pub fn from_config(config: &Config, repo_root: &Path) -> Result<Self> {
        let mut command = config.terraform_command()?;
        let program = command.remove(0);
        Ok(Self {
            program,
            base_args: command,
            plan_args: split_args("terraform.plan_args", &config.terraform.plan_args)?,
            apply_args: split_args("terraform.apply_args", &config.terraform.apply_args)?,
            repo_root: repo_root.to_path_buf(),
        })
    }

    fn run(&self, directory: &str, args: &[&str], extra: &[String]) -> Result<RunOutput> {
        let cwd = self.repo_root.join(directory);
        if !cwd.is_dir() {
            return Err(GateError::UserError(format!(
                "project directory '{}' does not exist",
                cwd.display()
            )));
        }

        tracing::debug!(program = %self.program, ?args, directory, "running terraform");
        let output = Command::new(&self.program)
            .current_dir(&cwd)
            .args(&self.base_args)
            .args(args)
            .args(extra)
            .output()
            .map_err(|e| {
                GateError::UserError(format!(
                    "failed to execute {} {}: {} (is it installed?)",
                    self.program,
                    args.first().unwrap_or(&""),
                    e
                ))
            })?;

        Ok(RunOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }

    /// `init`, returning its output as a failed run when it does not succeed.
    fn init(&self, directory: &str) -> Result<Option<RunOutput>> {
        let init = self.run(directory, &["init", "-input=false"], &[])?;
        if init.exit_code == 0 {
            return Ok(None);
        }
        // 2 would read as "changes"; an init failure must read as a failure.
        let exit_code = if init.exit_code == 2 { 1 } else { init.exit_code };
        Ok(Some(RunOutput { exit_code, ..init }))
    }
}

impl TerraformExecutor for TerraformCli {
    fn run_plan(&self, directory: &str) -> Result<RunOutput> {
        if let Some(failed) = self.init(directory)? {
            return Ok(failed);
        }
        self.run(
            directory,
            &["plan", "-input=false", "-detailed-exitcode"],
            &self.plan_args,
        )
    }

    fn run_apply(&self, directory: &str) -> Result<RunOutput> {
        if let Some(failed) = self.init(directory)? {
            return Ok(failed);
        }
        let mut output = self.run(
            directory,
            &["apply", "-input=false", "-auto-approve"],
            &self.apply_args,
        )?;
        if output.exit_code == 0 && apply_changed_resources(&output.stdout) {
            output.exit_code = 2;
        }
        Ok(output)
    }
}

fn split_args(field: &str, raw: &str) -> Result<Vec<String>> {
    shell_words::split(raw).map_err(|e| {
        GateError::UserError(format!("failed to parse {} '{}': {}", field, raw, e))
    })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    /// A stand-in terraform that reacts to its first argument. Run through
    /// `sh` so the freshly written script is never exec'd directly.
    fn fake_terraform(temp_dir: &TempDir, body: &str) -> TerraformCli {
        let script = temp_dir.path().join("fake-terraform.sh");
        std::fs::write(&script, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::create_dir_all(temp_dir.path().join("infra")).unwrap();

        let yaml = format!(
            "projects:\n  - {{name: infra, dir: infra}}\nterraform:\n  command: \"sh '{}'\"\n  plan_args: \"-lock=false\"\n",
            script.display()
        );
        let config = Config::from_yaml(&yaml).unwrap();
        TerraformCli::from_config(&config, temp_dir.path()).unwrap()
    }

    const HAPPY: &str = r#"case "$1" in
  init) echo "initialized"; exit 0 ;;
  plan) echo "args: $*"; echo "Plan: 1 to add, 0 to change, 0 to destroy."; exit 2 ;;
  apply) echo "Apply complete! Resources: 1 added, 0 changed, 0 destroyed."; exit 0 ;;
esac"#;

    #[test]
    fn test_plan_passes_detailed_exitcode_and_extra_args() {
        let temp_dir = TempDir::new().unwrap();
        let tf = fake_terraform(&temp_dir, HAPPY);

        let output = tf.run_plan("infra").unwrap();

        assert_eq!(output.exit_code, 2);
        assert!(output.stdout.contains("-detailed-exitcode"));
        assert!(output.stdout.contains("-lock=false"));
    }

    #[test]
    fn test_apply_with_changes_reports_exit_code_two() {
        let temp_dir = TempDir::new().unwrap();
        let tf = fake_terraform(&temp_dir, HAPPY);

        let output = tf.run_apply("infra").unwrap();
        assert_eq!(output.exit_code, 2);
    }

    #[test]
    fn test_failed_init_is_a_failed_run() {
        let temp_dir = TempDir::new().unwrap();
        let tf = fake_terraform(&temp_dir, r#"echo "Error: backend" >&2; exit 2"#);

        let output = tf.run_apply("infra").unwrap();

        assert_eq!(output.exit_code, 1);
        assert!(!output.is_success());
        assert!(output.stderr.contains("Error: backend"));
    }

    #[test]
    fn test_missing_directory_is_user_error() {
        let temp_dir = TempDir::new().unwrap();
        let tf = fake_terraform(&temp_dir, HAPPY);

        let err = tf.run_plan("nope").unwrap_err();
        assert!(matches!(err, GateError::UserError(_)));
    }

    #[test]
    fn test_missing_binary_is_user_error() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::create_dir_all(temp_dir.path().join("infra")).unwrap();
        let config = Config::from_yaml(
            "projects:\n  - {name: infra, dir: infra}\nterraform:\n  command: tfgate-no-such-binary\n",
        )
        .unwrap();
        let tf = TerraformCli::from_config(&config, temp_dir.path()).unwrap();

        let err = tf.run_plan("infra").unwrap_err();
        assert!(err.to_string().contains("tfgate-no-such-binary"));
    }
}
