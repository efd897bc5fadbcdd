//! Config struct definition and default implementation.

use super::types::*;
use serde::{Deserialize, Serialize};

/// Configuration for tfgate.
///
/// Represents `tfgate.yml` (or a legacy `digger.yml`) at the repository root.
/// Unknown fields in the YAML are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Projects in declaration order.
    #[serde(default = "default_projects")]
    pub projects: Vec<Project>,

    #[serde(default)]
    pub lock: LockSettings,

    #[serde(default)]
    pub terraform: TerraformSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            projects: default_projects(),
            lock: LockSettings::default(),
            terraform: TerraformSettings::default(),
        }
    }
}
