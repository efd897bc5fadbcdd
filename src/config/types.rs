//! Configuration sections and defaults.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A Terraform project: a named directory whose runs share one lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    /// Unique project name; the second half of the resource key.
    pub name: String,

    /// Directory relative to the repository root.
    #[serde(alias = "directory")]
    pub dir: String,

    /// Terraform workspace (informational).
    #[serde(default = "default_workspace")]
    pub workspace: String,

    /// Extra globs that also mark the project as modified (e.g. shared modules).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include_patterns: Vec<String>,
}

impl Project {
    pub fn new(name: impl Into<String>, dir: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dir: dir.into(),
            workspace: default_workspace(),
            include_patterns: Vec::new(),
        }
    }
}

/// Lock policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockSettings {
    /// Minutes before an unreleased lock becomes pre-emptable.
    pub ttl_minutes: u64,

    /// Lock store directory, relative to the repository root unless absolute.
    /// The default only serializes runs that share one checkout.
    pub store_dir: String,

    /// Seconds to wait for another process operating on the same key.
    pub guard_timeout_secs: u64,
}

impl LockSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_minutes.saturating_mul(60))
    }

    pub fn guard_timeout(&self) -> Duration {
        Duration::from_secs(self.guard_timeout_secs)
    }
}

impl Default for LockSettings {
    fn default() -> Self {
        Self {
            ttl_minutes: default_ttl_minutes(),
            store_dir: default_store_dir(),
            guard_timeout_secs: default_guard_timeout_secs(),
        }
    }
}

/// How Terraform is invoked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerraformSettings {
    /// Binary plus leading arguments, shell-words parsed (e.g. `tofu`).
    pub command: String,

    /// Extra arguments appended to `plan`.
    pub plan_args: String,

    /// Extra arguments appended to `apply`.
    pub apply_args: String,
}

impl Default for TerraformSettings {
    fn default() -> Self {
        Self {
            command: default_terraform_command(),
            plan_args: String::new(),
            apply_args: String::new(),
        }
    }
}

/// Config file names searched at the repository root, in precedence order.
pub const CONFIG_FILE_NAMES: &[&str] = &["tfgate.yml", "tfgate.yaml", "digger.yml", "digger.yaml"];

pub(crate) fn default_projects() -> Vec<Project> {
    vec![Project::new("default", ".")]
}
pub(crate) fn default_workspace() -> String {
    "default".to_string()
}
pub(crate) fn default_ttl_minutes() -> u64 {
    1440
}
pub(crate) fn default_store_dir() -> String {
    ".tfgate/locks".to_string()
}
pub(crate) fn default_guard_timeout_secs() -> u64 {
    10
}
pub(crate) fn default_terraform_command() -> String {
    "terraform".to_string()
}
