//! Run coordinator.
//!
//! Maps pull request events and comment commands onto lock operations and
//! Terraform runs, one project at a time. Per `(project, pull request)` the
//! states are implicit in lock ownership:
//!
//! ```text
//! UNLOCKED --acquire ok--> LOCKED_BY_THIS_PR --apply exit 0/2--> UNLOCKED
//!     |                        |      \--PR closed (release)--> UNLOCKED
//!     \--acquire denied--> LOCKED_BY_OTHER (attempt ends)
//! any --unlock (force release)--> UNLOCKED
//! ```
//!
//! Projects are independent: a denied project never rolls back a lock already
//! granted to another project in the same call. A Terraform executor error is
//! reported for its project like a failed run. A store failure aborts the
//! whole call.

mod messages;
mod report;


pub use report::{ProjectReport, ProjectStatus, RunReport};

use crate::config::Project;
use crate::error::{GateError, Result};
use crate::events::{Event, EventAction, append_event};
use crate::locks::{AcquireOutcome, LockManager, ReleaseOutcome, ResourceKey, TransactionId};
use crate::pr_command::{CommandKind, PrCommand};
use crate::pull_request::PullRequestService;
use crate::terraform::{RunOutput, TerraformExecutor};
use serde_json::json;
use std::path::PathBuf;
use std::time::Duration;

pub struct Coordinator<'a> {
    locks: &'a LockManager,
    pull_request: &'a dyn PullRequestService,
    terraform: &'a dyn TerraformExecutor,
    repository: String,
    ttl: Duration,
    pr: TransactionId,
    events_file: Option<PathBuf>,
}

impl<'a> Coordinator<'a> {
    pub fn new(
        locks: &'a LockManager,
        pull_request: &'a dyn PullRequestService,
        terraform: &'a dyn TerraformExecutor,
        repository: impl Into<String>,
        ttl: Duration,
        pr: TransactionId,
    ) -> Self {
        Self {
            locks,
            pull_request,
            terraform,
            repository: repository.into(),
            ttl,
            pr,
            events_file: None,
        }
    }

    /// Also append lock and run transitions to the audit log at `path`.
    pub fn with_events_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.events_file = Some(path.into());
        self
    }

    /// A pull request was opened or updated: lock every impacted project.
    pub fn pull_request_opened(&self, projects: &[Project]) -> Result<RunReport> {
        let mut report = RunReport::default();
        for project in projects {
            let key = self.key(project)?;
            let status = match self.lock(&key)? {
                AcquireOutcome::Denied { holder } => ProjectStatus::LockDenied {
                    holder: holder.transaction_id,
                },
                AcquireOutcome::Reaffirmed => ProjectStatus::AlreadyLocked,
                AcquireOutcome::Acquired | AcquireOutcome::Preempted { .. } => {
                    ProjectStatus::Locked
                }
            };
            report.push(key, status);
        }
        Ok(report)
    }

    /// A pull request was merged or abandoned: release whatever it still holds.
    ///
    /// Publishes one summary comment covering every project instead of one
    /// comment per project.
    pub fn pull_request_closed(&self, projects: &[Project]) -> Result<RunReport> {
        let mut report = RunReport::default();
        let mut lines = Vec::with_capacity(projects.len());
        for project in projects {
            let key = self.key(project)?;
            let outcome = self.release(&key)?;
            lines.push(messages::released(&key, self.pr, &outcome));
            let status = match outcome {
                ReleaseOutcome::Released => ProjectStatus::Released,
                ReleaseOutcome::AlreadyReleased | ReleaseOutcome::NotOwner { .. } => {
                    ProjectStatus::NotHeld
                }
            };
            report.push(key, status);
        }
        if !lines.is_empty() {
            self.comment(&messages::closed(self.pr, &lines));
        }
        Ok(report)
    }

    /// Execute a `digger plan|apply|unlock` comment against `projects`.
    pub fn run_command(&self, command: &PrCommand, projects: &[Project]) -> Result<RunReport> {
        tracing::info!(
            command = %command,
            transaction_id = %self.pr,
            projects = projects.len(),
            "running pull request command"
        );

        let mut report = RunReport::default();
        for project in projects {
            let key = self.key(project)?;
            let status = match command.kind {
                CommandKind::Plan => self.plan(&key, project)?,
                CommandKind::Apply => self.apply(&key, project)?,
                CommandKind::Unlock => self.force_unlock(&key)?,
            };
            report.push(key, status);
        }
        Ok(report)
    }

    fn key(&self, project: &Project) -> Result<ResourceKey> {
        ResourceKey::new(&self.repository, &project.name)
    }

    fn plan(&self, key: &ResourceKey, project: &Project) -> Result<ProjectStatus> {
        if let AcquireOutcome::Denied { holder } = self.lock(key)? {
            return Ok(ProjectStatus::LockDenied {
                holder: holder.transaction_id,
            });
        }

        let output = match self.terraform.run_plan(&project.dir) {
            Ok(output) => output,
            Err(e) => return self.run_error(EventAction::Plan, key, e),
        };
        self.record_run(EventAction::Plan, key, &output);
        self.comment(&messages::plan(key, &output));

        if output.is_success() {
            Ok(ProjectStatus::Planned {
                exit_code: output.exit_code,
            })
        } else {
            tracing::warn!(resource_key = %key, exit_code = output.exit_code, "plan failed");
            Ok(ProjectStatus::RunFailed {
                exit_code: output.exit_code,
            })
        }
    }

    fn apply(&self, key: &ResourceKey, project: &Project) -> Result<ProjectStatus> {
        if let AcquireOutcome::Denied { holder } = self.lock(key)? {
            return Ok(ProjectStatus::LockDenied {
                holder: holder.transaction_id,
            });
        }

        let output = match self.terraform.run_apply(&project.dir) {
            Ok(output) => output,
            Err(e) => return self.run_error(EventAction::Apply, key, e),
        };
        self.record_run(EventAction::Apply, key, &output);
        self.comment(&messages::apply(key, &output));

        if !output.is_success() {
            tracing::warn!(
                resource_key = %key,
                exit_code = output.exit_code,
                "apply failed; lock retained"
            );
            return Ok(ProjectStatus::RunFailed {
                exit_code: output.exit_code,
            });
        }

        let outcome = self.release(key)?;
        if let ReleaseOutcome::NotOwner { holder } = &outcome {
            tracing::warn!(
                resource_key = %key,
                holder = %holder.transaction_id,
                "lock changed hands during apply"
            );
        }
        self.comment(&messages::released(key, self.pr, &outcome));
        Ok(ProjectStatus::Applied {
            exit_code: output.exit_code,
        })
    }

    fn force_unlock(&self, key: &ResourceKey) -> Result<ProjectStatus> {
        let previous = self.locks.try_force_release(key)?;
        if let Some(previous) = &previous {
            self.record(
                EventAction::LockForceRelease,
                key,
                json!({
                    "previous_owner": previous.transaction_id.0,
                    "expires_at": previous.expires_at,
                }),
            );
        }
        self.comment(&messages::force_released(key, self.pr, previous.as_ref()));

        Ok(match previous {
            Some(previous) => ProjectStatus::ForceReleased { previous },
            None => ProjectStatus::NothingToUnlock,
        })
    }

    /// Acquire for this pull request, comment, and log the transition.
    fn lock(&self, key: &ResourceKey) -> Result<AcquireOutcome> {
        let outcome = self.locks.try_acquire(key, self.ttl, self.pr)?;

        let (action, details) = match &outcome {
            AcquireOutcome::Acquired => (EventAction::LockAcquire, json!({})),
            AcquireOutcome::Reaffirmed => (EventAction::LockReaffirm, json!({})),
            AcquireOutcome::Preempted { previous } => (
                EventAction::LockPreempt,
                json!({
                    "previous_owner": previous.transaction_id.0,
                    "expired_at": previous.expires_at,
                }),
            ),
            AcquireOutcome::Denied { holder } => (
                EventAction::LockDenied,
                json!({
                    "holder": holder.transaction_id.0,
                    "expires_at": holder.expires_at,
                }),
            ),
        };
        self.record(action, key, details);
        self.comment(&messages::acquire(key, self.pr, &outcome));

        Ok(outcome)
    }

    /// Release this pull request's lock and log the transition. Callers
    /// publish the comment.
    fn release(&self, key: &ResourceKey) -> Result<ReleaseOutcome> {
        let outcome = self.locks.try_release(key, self.pr)?;
        if outcome == ReleaseOutcome::Released {
            self.record(EventAction::LockRelease, key, json!({}));
        }
        Ok(outcome)
    }

    /// Terraform could not be run at all. The lock stays held, same as a
    /// failed run; only a store failure is fatal.
    fn run_error(
        &self,
        action: EventAction,
        key: &ResourceKey,
        error: GateError,
    ) -> Result<ProjectStatus> {
        if let GateError::StoreUnavailable(_) = error {
            return Err(error);
        }
        tracing::warn!(resource_key = %key, error = %error, "{} could not run; lock retained", action);
        self.record(action, key, json!({ "error": error.to_string() }));
        self.comment(&messages::run_error(key, action, &error));
        Ok(ProjectStatus::RunError {
            message: error.to_string(),
        })
    }

    fn comment(&self, body: &str) {
        if let Err(e) = self.pull_request.publish_comment(self.pr, body) {
            tracing::warn!(transaction_id = %self.pr, error = %e, "failed to publish comment");
        }
    }

    fn record_run(&self, action: EventAction, key: &ResourceKey, output: &RunOutput) {
        self.record(action, key, json!({ "exit_code": output.exit_code }));
    }

    fn record(&self, action: EventAction, key: &ResourceKey, details: serde_json::Value) {
        let Some(path) = &self.events_file else {
            return;
        };
        let mut details = details;
        if let Some(map) = details.as_object_mut() {
            map.insert("transaction_id".to_string(), json!(self.pr.0));
        }
        let event = Event::new(action).with_resource(key).with_details(details);
        if let Err(e) = append_event(path, &event) {
            tracing::warn!(resource_key = %key, error = %e, "failed to append audit event");
        }
    }
}
