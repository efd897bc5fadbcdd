//! Config loading, validation, and project lookup.

use super::model::Config;
use super::types::{CONFIG_FILE_NAMES, Project};
use crate::error::{GateError, Result};
use crate::locks::ResourceKey;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

impl Config {
    /// Load config from a YAML file.
    ///
    /// Unknown fields in the YAML are silently ignored.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path).map_err(|e| {
            GateError::UserError(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        Self::from_yaml(&content).map_err(|e| {
            GateError::UserError(format!("{} (in '{}')", e, path.display()))
        })
    }

    /// Parse config from a YAML string and validate it.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)
            .map_err(|e| GateError::UserError(format!("failed to parse config YAML: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Find the config file at `repo_root`.
    ///
    /// Returns `Ok(None)` when no config file exists. More than one candidate
    /// is ambiguous and rejected.
    pub fn find_file(repo_root: &Path) -> Result<Option<PathBuf>> {
        let found: Vec<PathBuf> = CONFIG_FILE_NAMES
            .iter()
            .map(|name| repo_root.join(name))
            .filter(|path| path.is_file())
            .collect();

        match found.as_slice() {
            [] => Ok(None),
            [single] => Ok(Some(single.clone())),
            many => Err(GateError::UserError(format!(
                "more than one config file found ({}); keep exactly one",
                many.iter()
                    .filter_map(|p| p.file_name().and_then(|n| n.to_str()))
                    .collect::<Vec<_>>()
                    .join(", ")
            ))),
        }
    }

    /// Load the config file at `repo_root`, or the default single-project config.
    pub fn discover(repo_root: &Path) -> Result<Self> {
        match Self::find_file(repo_root)? {
            Some(path) => {
                tracing::debug!(path = %path.display(), "loading config");
                Self::load(path)
            }
            None => {
                tracing::debug!(root = %repo_root.display(), "no config file, using default project");
                Ok(Self::default())
            }
        }
    }

    /// Validate config values.
    ///
    /// Validation rules:
    /// - at least one project; names non-empty, unique, usable in a resource key
    /// - project dirs non-empty and relative
    /// - include patterns are valid globs
    /// - `lock.ttl_minutes` and `lock.guard_timeout_secs` positive
    /// - `terraform.command` parses to at least one word
    pub fn validate(&self) -> Result<()> {
        if self.projects.is_empty() {
            return Err(GateError::UserError(
                "config validation failed: at least one project is required".to_string(),
            ));
        }

        let mut seen = BTreeSet::new();
        for project in &self.projects {
            // Same rules as the key the project will be locked under.
            ResourceKey::new("validate", &project.name).map_err(|e| {
                GateError::UserError(format!("config validation failed: {}", e))
            })?;
            if !seen.insert(project.name.as_str()) {
                return Err(GateError::UserError(format!(
                    "config validation failed: duplicate project name '{}'",
                    project.name
                )));
            }
            if project.dir.trim().is_empty() {
                return Err(GateError::UserError(format!(
                    "config validation failed: project '{}' has an empty dir",
                    project.name
                )));
            }
            if Path::new(&project.dir).is_absolute() {
                return Err(GateError::UserError(format!(
                    "config validation failed: project '{}' dir must be relative to the repository root (found '{}')",
                    project.name, project.dir
                )));
            }
            build_globset(&project.include_patterns).map_err(|e| {
                GateError::UserError(format!(
                    "config validation failed: project '{}' has an invalid include pattern: {}",
                    project.name, e
                ))
            })?;
        }

        if self.lock.ttl_minutes == 0 {
            return Err(GateError::UserError(
                "config validation failed: lock.ttl_minutes must be greater than 0".to_string(),
            ));
        }
        if self.lock.guard_timeout_secs == 0 {
            return Err(GateError::UserError(
                "config validation failed: lock.guard_timeout_secs must be greater than 0"
                    .to_string(),
            ));
        }

        self.terraform_command()?;
        Ok(())
    }

    /// Projects in declaration order.
    pub fn get_projects(&self) -> &[Project] {
        &self.projects
    }

    pub fn get_project(&self, name: &str) -> Option<&Project> {
        self.projects.iter().find(|p| p.name == name)
    }

    pub fn get_directory(&self, name: &str) -> Option<&str> {
        self.get_project(name).map(|p| p.dir.as_str())
    }

    /// Projects touched by any of `changed_files`, in declaration order.
    ///
    /// A file touches a project when it lies in the project's directory (by
    /// path components, so `infra` does not match `infra-old/main.tf`) or
    /// matches one of its include patterns.
    pub fn get_modified_projects<S: AsRef<str>>(&self, changed_files: &[S]) -> Result<Vec<Project>> {
        let mut modified = Vec::new();
        for project in &self.projects {
            let globs = build_globset(&project.include_patterns).map_err(|e| {
                GateError::UserError(format!(
                    "invalid include pattern for project '{}': {}",
                    project.name, e
                ))
            })?;

            let touched = changed_files.iter().any(|file| {
                let file = normalize_path(file.as_ref());
                is_under_dir(&file, &project.dir) || globs.is_match(&file)
            });
            if touched {
                modified.push(project.clone());
            }
        }
        Ok(modified)
    }

    /// Resolve the projects a command targets: the named one, or the modified set.
    pub fn select_projects<S: AsRef<str>>(
        &self,
        requested: Option<&str>,
        changed_files: &[S],
    ) -> Result<Vec<Project>> {
        match requested {
            Some(name) => self
                .get_project(name)
                .cloned()
                .map(|p| vec![p])
                .ok_or_else(|| {
                    GateError::UserError(format!(
                        "unknown project '{}' (configured: {})",
                        name,
                        self.projects
                            .iter()
                            .map(|p| p.name.as_str())
                            .collect::<Vec<_>>()
                            .join(", ")
                    ))
                }),
            None => self.get_modified_projects(changed_files),
        }
    }

    /// `terraform.command` split into program and leading arguments.
    pub fn terraform_command(&self) -> Result<Vec<String>> {
        let words = shell_words::split(&self.terraform.command).map_err(|e| {
            GateError::UserError(format!(
                "config validation failed: cannot parse terraform.command '{}': {}",
                self.terraform.command, e
            ))
        })?;
        if words.is_empty() {
            return Err(GateError::UserError(
                "config validation failed: terraform.command must not be empty".to_string(),
            ));
        }
        Ok(words)
    }

    /// Lock store directory resolved against `repo_root`.
    pub fn store_dir(&self, repo_root: &Path) -> PathBuf {
        repo_root.join(&self.lock.store_dir)
    }

    /// Serialize config to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self)
            .map_err(|e| GateError::UserError(format!("failed to serialize config to YAML: {}", e)))
    }
}

fn build_globset(patterns: &[String]) -> std::result::Result<GlobSet, globset::Error> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    builder.build()
}

/// Strip `./` prefixes and trailing slashes; use `/` separators.
fn normalize_path(path: &str) -> String {
    let mut path = path.trim().replace('\\', "/");
    while let Some(rest) = path.strip_prefix("./") {
        path = rest.to_string();
    }
    path.trim_end_matches('/').to_string()
}

fn is_under_dir(file: &str, dir: &str) -> bool {
    let dir = normalize_path(dir);
    if dir.is_empty() || dir == "." {
        return true;
    }
    file == dir
        || file
            .strip_prefix(dir.as_str())
            .is_some_and(|rest| rest.starts_with('/'))
}
