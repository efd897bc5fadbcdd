//! `tfgate pr opened|closed`.

use crate::context::RunContext;
use crate::coordinator::{Coordinator, RunReport};
use crate::error::Result;
use crate::locks::TransactionId;
use crate::pull_request::PullRequestService;
use crate::terraform::NoTerraform;

/// Lock every project the pull request modifies.
pub(super) fn cmd_pr_opened(
    ctx: &RunContext,
    pull_request: &dyn PullRequestService,
    pr: u64,
) -> Result<RunReport> {
    let changed = pull_request.changed_files()?;
    let projects = ctx.config.get_modified_projects(&changed)?;
    tracing::info!(
        pr,
        changed_files = changed.len(),
        projects = projects.len(),
        "pull request opened"
    );

    let locks = ctx.lock_manager();
    Coordinator::new(
        &locks,
        pull_request,
        &NoTerraform,
        &ctx.repository,
        ctx.ttl(),
        TransactionId(pr),
    )
    .with_events_file(ctx.events_file())
    .pull_request_opened(&projects)
}

/// Release every configured project still held by the pull request.
pub(super) fn cmd_pr_closed(
    ctx: &RunContext,
    pull_request: &dyn PullRequestService,
    pr: u64,
) -> Result<RunReport> {
    tracing::info!(pr, "pull request closed");

    let locks = ctx.lock_manager();
    Coordinator::new(
        &locks,
        pull_request,
        &NoTerraform,
        &ctx.repository,
        ctx.ttl(),
        TransactionId(pr),
    )
    .with_events_file(ctx.events_file())
    .pull_request_closed(ctx.config.get_projects())
}
