//! Per-project outcomes of one coordinator call.

use crate::locks::{LockRecord, ResourceKey, TransactionId};
use std::fmt;

/// What happened to one project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectStatus {
    /// Lock newly taken (or taken over from an expired owner).
    Locked,
    /// This pull request already held the lock.
    AlreadyLocked,
    /// Another pull request holds the lock; nothing ran.
    LockDenied { holder: TransactionId },
    /// Plan finished with `0` or `2`. The lock stays held.
    Planned { exit_code: i32 },
    /// Apply finished with `0` or `2` and the lock was released.
    Applied { exit_code: i32 },
    /// Plan or apply failed. The lock stays held.
    RunFailed { exit_code: i32 },
    /// Terraform could not be started. The lock stays held.
    RunError { message: String },
    /// The pull request's lock was removed.
    Released,
    /// There was nothing of this pull request's to release.
    NotHeld,
    /// An operator removed the lock.
    ForceReleased { previous: LockRecord },
    /// Unlock requested but no lock existed.
    NothingToUnlock,
}

impl ProjectStatus {
    pub fn is_success(&self) -> bool {
        !matches!(
            self,
            ProjectStatus::LockDenied { .. }
                | ProjectStatus::RunFailed { .. }
                | ProjectStatus::RunError { .. }
        )
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProjectStatus::Locked => write!(f, "locked"),
            ProjectStatus::AlreadyLocked => write!(f, "already locked"),
            ProjectStatus::LockDenied { holder } => write!(f, "lock denied (held by {})", holder),
            ProjectStatus::Planned { exit_code } => write!(f, "planned (exit {})", exit_code),
            ProjectStatus::Applied { exit_code } => {
                write!(f, "applied (exit {}), lock released", exit_code)
            }
            ProjectStatus::RunFailed { exit_code } => {
                write!(f, "run failed (exit {}), lock retained", exit_code)
            }
            ProjectStatus::RunError { message } => {
                write!(f, "could not run ({}), lock retained", message)
            }
            ProjectStatus::Released => write!(f, "released"),
            ProjectStatus::NotHeld => write!(f, "not held"),
            ProjectStatus::ForceReleased { previous } => {
                write!(f, "force-released (was held by {})", previous.transaction_id)
            }
            ProjectStatus::NothingToUnlock => write!(f, "no lock to remove"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectReport {
    pub project: String,
    pub resource_key: ResourceKey,
    pub status: ProjectStatus,
}

/// Outcomes in the order the projects were processed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub projects: Vec<ProjectReport>,
}

impl RunReport {
    pub(super) fn push(&mut self, key: ResourceKey, status: ProjectStatus) {
        self.projects.push(ProjectReport {
            project: key.project().to_string(),
            resource_key: key,
            status,
        });
    }

    /// True when no project was denied its lock and no run failed.
    pub fn is_success(&self) -> bool {
        self.projects.iter().all(|p| p.status.is_success())
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }

    pub fn status_of(&self, project: &str) -> Option<&ProjectStatus> {
        self.projects
            .iter()
            .find(|p| p.project == project)
            .map(|p| &p.status)
    }

    /// Projects whose lock is held by another pull request.
    pub fn denied(&self) -> Vec<&ProjectReport> {
        self.projects
            .iter()
            .filter(|p| matches!(p.status, ProjectStatus::LockDenied { .. }))
            .collect()
    }

    /// Projects whose Terraform run failed or could not start.
    pub fn failed_runs(&self) -> Vec<&ProjectReport> {
        self.projects
            .iter()
            .filter(|p| {
                matches!(
                    p.status,
                    ProjectStatus::RunFailed { .. } | ProjectStatus::RunError { .. }
                )
            })
            .collect()
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.projects.is_empty() {
            return write!(f, "No projects affected.");
        }
        for (i, report) in self.projects.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "  {}: {}", report.resource_key, report.status)?;
        }
        Ok(())
    }
}
