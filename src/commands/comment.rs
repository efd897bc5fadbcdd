//! `tfgate comment`: run a `digger` command posted on a pull request.

use crate::context::RunContext;
use crate::coordinator::{Coordinator, RunReport};
use crate::error::Result;
use crate::locks::TransactionId;
use crate::pr_command::PrCommand;
use crate::pull_request::PullRequestService;
use crate::terraform::TerraformExecutor;

/// Returns `None` when the comment is not a command.
pub(super) fn cmd_comment(
    ctx: &RunContext,
    pull_request: &dyn PullRequestService,
    terraform: &dyn TerraformExecutor,
    pr: u64,
    body: &str,
) -> Result<Option<RunReport>> {
    let Some(command) = PrCommand::parse(body) else {
        tracing::info!(pr, "comment is not a command; ignoring");
        return Ok(None);
    };

    // Only an unscoped command needs the diff.
    let changed = match command.project {
        Some(_) => Vec::new(),
        None => pull_request.changed_files()?,
    };
    let projects = ctx
        .config
        .select_projects(command.project.as_deref(), &changed)?;

    let locks = ctx.lock_manager();
    let report = Coordinator::new(
        &locks,
        pull_request,
        terraform,
        &ctx.repository,
        ctx.ttl(),
        TransactionId(pr),
    )
    .with_events_file(ctx.events_file())
    .run_command(&command, &projects)?;

    Ok(Some(report))
}
