//! Repository and run context resolution for tfgate.
//!
//! Finds the Git repository root from the working directory (or `--repo-dir`),
//! loads the project config from it, and applies command-line overrides. Every
//! command builds its lock manager and audit log path from a [`RunContext`] so
//! that all invocations against one repository share the same lock store.

use crate::config::Config;
use crate::error::{GateError, Result};
use crate::events;
use crate::git;
use crate::locks::{FileStore, LockManager};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Command-line overrides applied on top of the config file.
#[derive(Debug, Clone, Default)]
pub struct ContextOverrides {
    pub repo_dir: Option<PathBuf>,
    pub repository: Option<String>,
    pub ttl_minutes: Option<u64>,
    pub store_dir: Option<PathBuf>,
}

/// Resolved inputs for one tfgate invocation. All paths are absolute.
#[derive(Debug, Clone)]
pub struct RunContext {
    /// Top level of the Git checkout.
    pub repo_root: PathBuf,

    /// Repository name, the first half of every resource key.
    pub repository: String,

    pub config: Config,

    /// Directory holding lock records and the audit log.
    pub store_dir: PathBuf,
}

impl RunContext {
    /// Resolve from `overrides.repo_dir`, or the current working directory.
    pub fn resolve(overrides: &ContextOverrides) -> Result<Self> {
        let cwd = match &overrides.repo_dir {
            Some(dir) => dir.clone(),
            None => env::current_dir().map_err(|e| {
                GateError::UserError(format!("failed to get current working directory: {}", e))
            })?,
        };

        Self::resolve_from(&cwd, overrides)
    }

    pub fn resolve_from<P: AsRef<Path>>(cwd: P, overrides: &ContextOverrides) -> Result<Self> {
        let repo_root = git::get_repo_root(cwd)?;
        let mut config = Config::discover(&repo_root)?;

        if let Some(ttl_minutes) = overrides.ttl_minutes {
            config.lock.ttl_minutes = ttl_minutes;
        }
        config.validate()?;

        let store_dir = match &overrides.store_dir {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => repo_root.join(dir),
            None => config.store_dir(&repo_root),
        };

        let repository = match &overrides.repository {
            Some(name) if !name.trim().is_empty() => name.trim().to_string(),
            _ => default_repository_name(&repo_root)?,
        };

        tracing::debug!(
            repo_root = %repo_root.display(),
            repository = %repository,
            store_dir = %store_dir.display(),
            "resolved run context"
        );

        let ctx = Self {
            repo_root,
            repository,
            config,
            store_dir,
        };
        if ctx.store_in_checkout() {
            tracing::warn!(
                store_dir = %ctx.store_dir.display(),
                "lock store is inside the checkout; runs from other checkouts will not see these locks. \
Point --store-dir or lock.store_dir at storage shared by every run"
            );
        }
        Ok(ctx)
    }

    /// True when lock records live under the repository checkout, where a CI
    /// job's fresh clone cannot see locks taken by other jobs.
    pub fn store_in_checkout(&self) -> bool {
        self.store_dir.starts_with(&self.repo_root)
    }

    pub fn ttl(&self) -> Duration {
        self.config.lock.ttl()
    }

    /// Lock manager over the shared file store.
    pub fn lock_manager(&self) -> LockManager {
        LockManager::new(Box::new(FileStore::new(
            &self.store_dir,
            self.config.lock.guard_timeout(),
        )))
    }

    /// Path to the audit log.
    pub fn events_file(&self) -> PathBuf {
        events::events_file_path(&self.store_dir)
    }
}

/// `owner/name` of the origin remote, else the checkout directory name.
fn default_repository_name(repo_root: &Path) -> Result<String> {
    if let Some(name) = git::origin_repository_name(repo_root) {
        return Ok(name);
    }
    repo_root
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| {
            GateError::UserError(format!(
                "cannot derive a repository name from '{}'; pass --repo",
                repo_root.display()
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{commit_file, create_test_repo, git};
    use tempfile::TempDir;

    #[test]
    fn test_resolve_from_subdirectory_uses_defaults() {
        let temp_dir = create_test_repo();
        let subdir = temp_dir.path().join("terraform").join("infra");
        std::fs::create_dir_all(&subdir).unwrap();

        let ctx = RunContext::resolve_from(&subdir, &ContextOverrides::default()).unwrap();

        assert_eq!(
            ctx.repo_root.canonicalize().unwrap(),
            temp_dir.path().canonicalize().unwrap()
        );
        assert_eq!(ctx.config.get_projects()[0].name, "default");
        assert!(ctx.store_dir.ends_with(".tfgate/locks"));
        assert!(ctx.store_in_checkout());
        assert!(ctx.events_file().ends_with("locks/events.ndjson"));
        assert_eq!(ctx.ttl(), Duration::from_secs(1440 * 60));
    }

    #[test]
    fn test_resolve_outside_repo_fails() {
        let temp_dir = TempDir::new().unwrap();
        let err = RunContext::resolve_from(temp_dir.path(), &ContextOverrides::default())
            .unwrap_err();
        assert!(matches!(err, GateError::UserError(_)));
        assert!(err.to_string().contains("not inside a git repository"));
    }

    #[test]
    fn test_repository_name_falls_back_to_dir_name() {
        let temp_dir = create_test_repo();
        let ctx = RunContext::resolve_from(temp_dir.path(), &ContextOverrides::default()).unwrap();

        let dir_name = ctx.repo_root.file_name().unwrap().to_str().unwrap();
        assert_eq!(ctx.repository, dir_name);
    }

    #[test]
    fn test_repository_name_from_origin() {
        let temp_dir = create_test_repo();
        git(
            temp_dir.path(),
            &["remote", "add", "origin", "https://github.com/org/infra-live.git"],
        );

        let ctx = RunContext::resolve_from(temp_dir.path(), &ContextOverrides::default()).unwrap();
        assert_eq!(ctx.repository, "org/infra-live");
    }

    #[test]
    fn test_overrides_win_over_config() {
        let temp_dir = create_test_repo();
        commit_file(
            temp_dir.path(),
            "tfgate.yml",
            "projects:\n  - {name: infra, dir: infra}\nlock:\n  ttl_minutes: 30\n  store_dir: shared/locks\n",
        );

        let ctx = RunContext::resolve_from(temp_dir.path(), &ContextOverrides::default()).unwrap();
        assert_eq!(ctx.ttl(), Duration::from_secs(30 * 60));
        assert!(ctx.store_dir.ends_with("shared/locks"));

        let overrides = ContextOverrides {
            repository: Some("org/repo".to_string()),
            ttl_minutes: Some(5),
            store_dir: Some(PathBuf::from("elsewhere")),
            ..ContextOverrides::default()
        };
        let ctx = RunContext::resolve_from(temp_dir.path(), &overrides).unwrap();
        assert_eq!(ctx.repository, "org/repo");
        assert_eq!(ctx.ttl(), Duration::from_secs(5 * 60));
        assert!(ctx.store_dir.ends_with("elsewhere"));
        assert_eq!(ctx.config.get_projects()[0].name, "infra");
    }

    #[test]
    fn test_shared_store_dir_is_outside_checkout() {
        let temp_dir = create_test_repo();
        let shared = TempDir::new().unwrap();

        let relative = ContextOverrides {
            store_dir: Some(PathBuf::from("state/locks")),
            ..ContextOverrides::default()
        };
        let ctx = RunContext::resolve_from(temp_dir.path(), &relative).unwrap();
        assert!(ctx.store_in_checkout());

        let absolute = ContextOverrides {
            store_dir: Some(shared.path().join("locks")),
            ..ContextOverrides::default()
        };
        let ctx = RunContext::resolve_from(temp_dir.path(), &absolute).unwrap();
        assert!(!ctx.store_in_checkout());
        assert_eq!(ctx.store_dir, shared.path().join("locks"));
    }

    #[test]
    fn test_zero_ttl_override_is_rejected() {
        let temp_dir = create_test_repo();
        let overrides = ContextOverrides {
            ttl_minutes: Some(0),
            ..ContextOverrides::default()
        };
        let err = RunContext::resolve_from(temp_dir.path(), &overrides).unwrap_err();
        assert!(matches!(err, GateError::UserError(_)));
    }

    #[test]
    fn test_lock_manager_uses_store_dir() {
        let temp_dir = create_test_repo();
        let ctx = RunContext::resolve_from(temp_dir.path(), &ContextOverrides::default()).unwrap();

        let key = crate::locks::ResourceKey::new(&ctx.repository, "default").unwrap();
        let locks = ctx.lock_manager();
        assert!(
            locks
                .acquire(&key, ctx.ttl(), crate::locks::TransactionId(1))
                .unwrap()
        );
        assert!(std::fs::read_dir(&ctx.store_dir).unwrap().count() >= 1);
    }
}
