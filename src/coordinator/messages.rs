//! Pull request comment text.

use crate::error::GateError;
use crate::events::EventAction;
use crate::locks::{AcquireOutcome, LockRecord, ReleaseOutcome, ResourceKey, TransactionId};
use crate::terraform::{RunOutput, cleanup_apply_output, cleanup_plan_output};

pub(super) fn acquire(key: &ResourceKey, pr: TransactionId, outcome: &AcquireOutcome) -> String {
    let project = key.project();
    match outcome {
        AcquireOutcome::Acquired => format!("Project `{}` has been locked by PR {}", project, pr),
        AcquireOutcome::Reaffirmed => {
            format!("Project `{}` is already locked by this PR ({})", project, pr)
        }
        AcquireOutcome::Preempted { previous } => format!(
            "Project `{}` has been locked by PR {} (stale lock from PR {} expired at {})",
            project,
            pr,
            previous.transaction_id,
            previous.expires_at.to_rfc3339()
        ),
        AcquireOutcome::Denied { holder } => format!(
            "Project `{}` is locked by another PR {} (lock expires in {}). \
The locking plan must be applied or the lock released before this PR can run. \
To release it, comment `digger unlock -p {}`.",
            project,
            holder.transaction_id,
            holder.remaining_string(),
            project
        ),
    }
}

pub(super) fn released(key: &ResourceKey, pr: TransactionId, outcome: &ReleaseOutcome) -> String {
    let project = key.project();
    match outcome {
        ReleaseOutcome::Released => format!("Project `{}` has been unlocked by PR {}", project, pr),
        ReleaseOutcome::AlreadyReleased => {
            format!("Project `{}` had no lock held by PR {}", project, pr)
        }
        ReleaseOutcome::NotOwner { holder } => format!(
            "Project `{}` is locked by PR {}, not by PR {}; the lock was not released",
            project, holder.transaction_id, pr
        ),
    }
}

/// One comment for every project released when a pull request closes.
pub(super) fn closed(pr: TransactionId, lines: &[String]) -> String {
    let mut body = format!("PR {} was closed:", pr);
    for line in lines {
        body.push_str("\n- ");
        body.push_str(line);
    }
    body
}

pub(super) fn force_released(
    key: &ResourceKey,
    pr: TransactionId,
    previous: Option<&LockRecord>,
) -> String {
    match previous {
        Some(previous) => format!(
            "Project `{}` was force-unlocked from PR {}. It was held by PR {}.",
            key.project(),
            pr,
            previous.transaction_id
        ),
        None => format!("Project `{}` had no lock to remove.", key.project()),
    }
}

pub(super) fn plan(key: &ResourceKey, output: &RunOutput) -> String {
    let heading = if output.is_success() {
        format!("Plan for `{}`:", key.project())
    } else {
        format!(
            "Plan for `{}` failed (exit code {}):",
            key.project(),
            output.exit_code
        )
    };
    format!("{}\n{}", heading, cleanup_plan_output(output))
}

pub(super) fn apply(key: &ResourceKey, output: &RunOutput) -> String {
    let heading = if output.is_success() {
        format!("Apply for `{}`:", key.project())
    } else {
        format!(
            "Apply for `{}` failed (exit code {}). The lock is kept until a successful apply or `digger unlock -p {}`:",
            key.project(),
            output.exit_code,
            key.project()
        )
    };
    format!("{}\n{}", heading, cleanup_apply_output(output))
}

pub(super) fn run_error(key: &ResourceKey, action: EventAction, error: &GateError) -> String {
    format!(
        "Terraform {} for `{}` could not run: {}. The lock is kept; fix the problem and comment again, or release it with `digger unlock -p {}`.",
        action,
        key.project(),
        error,
        key.project()
    )
}
