//! Lock audit log.
//!
//! Every lock transition and Terraform run is appended as one JSON object per
//! line (NDJSON) to `events.ndjson` in the lock state directory, so operators
//! can reconstruct who held a project and why it was released.
//!
//! # Event Format
//!
//! - `ts`: RFC3339 timestamp
//! - `action`: what happened (`lock_acquire`, `lock_force_release`, `apply`, ...)
//! - `actor`: the machine identity that performed it (`user@HOST`)
//! - `resource`: the resource key (`repository#project`), when there is one
//! - `details`: freeform object with action-specific details

use crate::error::{GateError, Result};
use crate::locks::ResourceKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// File name of the audit log inside the state directory.
pub const EVENTS_FILE_NAME: &str = "events.ndjson";

/// Actions that can be logged as events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventAction {
    /// Lock created for a transaction
    LockAcquire,
    /// Owner acquired again; expiry extended
    LockReaffirm,
    /// Stale lock taken over by another transaction
    LockPreempt,
    /// Acquire refused because another transaction holds the lock
    LockDenied,
    /// Owner released its lock
    LockRelease,
    /// Lock removed regardless of owner
    LockForceRelease,
    /// Terraform plan finished
    Plan,
    /// Terraform apply finished
    Apply,
}

impl std::fmt::Display for EventAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventAction::LockAcquire => write!(f, "lock_acquire"),
            EventAction::LockReaffirm => write!(f, "lock_reaffirm"),
            EventAction::LockPreempt => write!(f, "lock_preempt"),
            EventAction::LockDenied => write!(f, "lock_denied"),
            EventAction::LockRelease => write!(f, "lock_release"),
            EventAction::LockForceRelease => write!(f, "lock_force_release"),
            EventAction::Plan => write!(f, "plan"),
            EventAction::Apply => write!(f, "apply"),
        }
    }
}

/// An event record for the audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub ts: DateTime<Utc>,

    pub action: EventAction,

    /// Who performed the action (e.g., `user@HOST`).
    pub actor: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,

    pub details: Value,
}

impl Event {
    /// Create an event stamped with the current time and actor.
    pub fn new(action: EventAction) -> Self {
        Self {
            ts: Utc::now(),
            action,
            actor: get_actor_string(),
            resource: None,
            details: Value::Object(serde_json::Map::new()),
        }
    }

    pub fn with_resource(mut self, key: &ResourceKey) -> Self {
        self.resource = Some(key.to_string());
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }

    /// Serialize the event to a single-line JSON string.
    pub fn to_ndjson_line(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| GateError::UserError(format!("failed to serialize event to JSON: {}", e)))
    }
}

fn get_actor_string() -> String {
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string());

    let host = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    format!("{}@{}", user, host)
}

/// Path of the audit log for a given state directory.
pub fn events_file_path(state_dir: &Path) -> PathBuf {
    state_dir.join(EVENTS_FILE_NAME)
}

/// Append an event to the log at `events_file`, creating the file and its
/// directory if needed.
pub fn append_event(events_file: &Path, event: &Event) -> Result<()> {
    let json_line = event.to_ndjson_line()?;

    if let Some(dir) = events_file.parent()
        && !dir.as_os_str().is_empty()
        && !dir.exists()
    {
        fs::create_dir_all(dir).map_err(|e| {
            GateError::UserError(format!(
                "failed to create events directory '{}': {}",
                dir.display(),
                e
            ))
        })?;
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(events_file)
        .map_err(|e| {
            GateError::UserError(format!(
                "failed to open events file '{}': {}",
                events_file.display(),
                e
            ))
        })?;

    writeln!(file, "{}", json_line).map_err(|e| {
        GateError::UserError(format!(
            "failed to write event to '{}': {}",
            events_file.display(),
            e
        ))
    })?;

    file.sync_all().map_err(|e| {
        GateError::UserError(format!(
            "failed to sync events file '{}': {}",
            events_file.display(),
            e
        ))
    })?;

    Ok(())
}

/// Read back every event in the log. A missing file is an empty log.
pub fn read_events(events_file: &Path) -> Result<Vec<Event>> {
    let content = match fs::read_to_string(events_file) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(GateError::UserError(format!(
                "failed to read events file '{}': {}",
                events_file.display(),
                e
            )));
        }
    };

    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            serde_json::from_str(line).map_err(|e| {
                GateError::UserError(format!(
                    "malformed event in '{}': {}",
                    events_file.display(),
                    e
                ))
            })
        })
        .collect()
}
