//! Command implementations for tfgate.
//!
//! This module provides the dispatcher that routes CLI commands to their
//! implementations, and turns coordinator reports into process outcomes.

mod comment;
mod lock;
mod pr;


use crate::cli::{Command, GlobalArgs, LockAction, PrEvent};
use crate::context::{ContextOverrides, RunContext};
use crate::coordinator::RunReport;
use crate::error::{GateError, Result};
use crate::pull_request::GitPullRequest;
use crate::terraform::TerraformCli;

/// Dispatch a command to its implementation.
pub fn dispatch(global: GlobalArgs, command: Command) -> Result<()> {
    let ctx = RunContext::resolve(&ContextOverrides {
        repo_dir: global.repo_dir,
        repository: global.repository,
        ttl_minutes: global.ttl_minutes,
        store_dir: global.store_dir,
    })?;
    let comments_file = global.comments_file;

    match command {
        Command::Pr(args) => match args.event {
            PrEvent::Opened(args) => {
                let pull_request = GitPullRequest::new(
                    &ctx.repo_root,
                    args.refs.base,
                    args.refs.head,
                    comments_file,
                );
                let report = pr::cmd_pr_opened(&ctx, &pull_request, args.pr)?;
                finish(&report)
            }
            PrEvent::Closed(args) => {
                // Closing releases every configured project, so no diff is taken.
                let pull_request = GitPullRequest::new(&ctx.repo_root, "HEAD", "HEAD", comments_file);
                let report = pr::cmd_pr_closed(&ctx, &pull_request, args.pr)?;
                finish(&report)
            }
        },
        Command::Comment(args) => {
            let pull_request =
                GitPullRequest::new(&ctx.repo_root, args.refs.base, args.refs.head, comments_file);
            // Only comments run Terraform, so only they need its settings to parse.
            let terraform = TerraformCli::from_config(&ctx.config, &ctx.repo_root)?;
            match comment::cmd_comment(&ctx, &pull_request, &terraform, args.pr, &args.body)? {
                Some(report) => finish(&report),
                None => Ok(()),
            }
        }
        Command::Lock(lock_cmd) => match lock_cmd.action {
            LockAction::List => lock::cmd_lock_list(&ctx),
            LockAction::Show(args) => lock::cmd_lock_show(&ctx, &args.project),
            LockAction::Clear(args) => lock::cmd_lock_clear(&ctx, &args.project),
        },
    }
}

/// Print the report and fail the command if any project was denied or failed.
///
/// Denial wins over run failure so that "another PR holds the lock" is what
/// the exit code reports when both happen.
fn finish(report: &RunReport) -> Result<()> {
    println!("{}", report);
    report_outcome(report)
}

fn report_outcome(report: &RunReport) -> Result<()> {
    let denied = report.denied();
    if !denied.is_empty() {
        let held: Vec<String> = denied
            .iter()
            .map(|p| format!("{} ({})", p.project, p.status))
            .collect();
        return Err(GateError::LockDenied(format!(
            "{} project(s) locked by another pull request: {}",
            denied.len(),
            held.join(", ")
        )));
    }

    let failed = report.failed_runs();
    if !failed.is_empty() {
        let names: Vec<&str> = failed.iter().map(|p| p.project.as_str()).collect();
        return Err(GateError::RunFailed(format!(
            "{} project(s) failed: {}",
            failed.len(),
            names.join(", ")
        )));
    }

    Ok(())
}
