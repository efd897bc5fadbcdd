//! Configuration model for tfgate.
//!
//! Defines the [`Config`] read from `tfgate.yml` (or `digger.yml`) at the
//! repository root: the project list that maps names to directories, lock
//! policy, and the Terraform invocation. Config is loaded explicitly and
//! passed down; nothing reads it from a global.

mod model;
mod operations;
pub mod types;


pub use model::Config;
pub use types::{CONFIG_FILE_NAMES, LockSettings, Project, TerraformSettings};
