//! Lock identity and record types.

use crate::error::{GateError, Result};
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Separator between repository and project in a resource key.
pub const KEY_SEPARATOR: char = '#';

/// Composite identity of a lockable project: `repository#project`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceKey(String);

impl ResourceKey {
    /// Build the key for `project` in `repository`.
    ///
    /// Both parts must be non-empty; the project name must not contain `#`.
    pub fn new(repository: &str, project: &str) -> Result<Self> {
        if repository.trim().is_empty() {
            return Err(GateError::UserError(
                "repository name must not be empty".to_string(),
            ));
        }
        if project.trim().is_empty() {
            return Err(GateError::UserError("project name must not be empty".to_string()));
        }
        if project.contains(KEY_SEPARATOR) {
            return Err(GateError::UserError(format!(
                "project name '{}' must not contain '{}'",
                project, KEY_SEPARATOR
            )));
        }
        Ok(Self(format!("{}{}{}", repository, KEY_SEPARATOR, project)))
    }

    /// Parse an already-composed key such as `org/repo#infra`.
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.rsplit_once(KEY_SEPARATOR) {
            Some((repository, project)) => Self::new(repository, project),
            None => Err(GateError::UserError(format!(
                "invalid resource key '{}': expected 'repository{}project'",
                raw, KEY_SEPARATOR
            ))),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The project part of the key.
    pub fn project(&self) -> &str {
        self.0
            .rsplit_once(KEY_SEPARATOR)
            .map(|(_, project)| project)
            .unwrap_or(&self.0)
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of the unit of work that owns a lock (a pull request number).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(pub u64);

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Persisted state of a held lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRecord {
    /// Owner of the lock.
    pub transaction_id: TransactionId,

    /// Instant after which the lock may be pre-empted (second precision).
    pub expires_at: DateTime<Utc>,
}

impl LockRecord {
    /// Create a record owned by `transaction_id` that expires `ttl` after `now`.
    pub fn new(transaction_id: TransactionId, now: DateTime<Utc>, ttl: Duration) -> Result<Self> {
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| GateError::UserError(format!("lock TTL out of range: {}", e)))?;
        let expires_at = now
            .checked_add_signed(ttl)
            .ok_or_else(|| GateError::UserError("lock TTL out of range".to_string()))?;
        Ok(Self {
            transaction_id,
            expires_at: expires_at.trunc_subsecs(0),
        })
    }

    /// A lock is stale once `now` has reached its expiry.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_owned_by(&self, transaction_id: TransactionId) -> bool {
        self.transaction_id == transaction_id
    }

    /// Human-readable remaining lifetime, e.g. `23h 59m` or `expired`.
    pub fn remaining_string(&self) -> String {
        let remaining = self.expires_at.signed_duration_since(Utc::now());
        if remaining <= chrono::Duration::zero() {
            return "expired".to_string();
        }
        let minutes = remaining.num_minutes();
        let hours = remaining.num_hours();
        let days = remaining.num_days();

        if days > 0 {
            format!("{}d {}h", days, hours % 24)
        } else if hours > 0 {
            format!("{}h {}m", hours, minutes % 60)
        } else {
            format!("{}m", minutes)
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| {
            GateError::StoreUnavailable(format!("failed to serialize lock record: {}", e))
        })
    }
}
