//! Acquire, release, and inspect project locks.
//!
//! Every state change is a single conditional operation on the store; the
//! manager never reads a record and then decides to write it. Reads happen
//! only in [`LockManager::inspect`] and [`LockManager::list`], which are
//! advisory.

use super::store::{DeleteOutcome, DeletePrecondition, LockStore, WriteOutcome, WritePrecondition};
use super::types::{LockRecord, ResourceKey, TransactionId};
use crate::error::{GateError, Result};
use chrono::Utc;
use std::time::Duration;

/// Result of an acquisition attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// No lock existed; the caller now owns it.
    Acquired,
    /// The caller already owned the lock; its expiry was extended.
    Reaffirmed,
    /// An expired lock owned by another transaction was taken over.
    Preempted { previous: LockRecord },
    /// A live lock is held by another transaction. Nothing was written.
    Denied { holder: LockRecord },
}

impl AcquireOutcome {
    pub fn is_granted(&self) -> bool {
        !matches!(self, AcquireOutcome::Denied { .. })
    }
}

/// Result of a scoped release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// The caller's lock was removed.
    Released,
    /// No lock existed (already released, or removed by an operator).
    AlreadyReleased,
    /// The lock belongs to another transaction and was left untouched.
    NotOwner { holder: LockRecord },
}

/// Lock operations over a [`LockStore`].
pub struct LockManager {
    store: Box<dyn LockStore>,
}

impl LockManager {
    pub fn new(store: Box<dyn LockStore>) -> Self {
        Self { store }
    }

    /// Acquire `key` for `transaction_id`, returning whether the caller holds it.
    pub fn acquire(
        &self,
        key: &ResourceKey,
        ttl: Duration,
        transaction_id: TransactionId,
    ) -> Result<bool> {
        Ok(self.try_acquire(key, ttl, transaction_id)?.is_granted())
    }

    /// Acquire `key` for `transaction_id` and report how the store resolved it.
    ///
    /// Succeeds when the key is free, stale, or already owned by the caller;
    /// in the last case the expiry moves to `now + ttl`.
    pub fn try_acquire(
        &self,
        key: &ResourceKey,
        ttl: Duration,
        transaction_id: TransactionId,
    ) -> Result<AcquireOutcome> {
        if ttl.is_zero() {
            return Err(GateError::UserError("lock TTL must be positive".to_string()));
        }

        let now = Utc::now();
        let record = LockRecord::new(transaction_id, now, ttl)?;
        let precondition = WritePrecondition::Claimable {
            now,
            transaction_id,
        };

        let outcome = match self.store.conditional_write(key, precondition, record)? {
            WriteOutcome::Applied { previous: None } => AcquireOutcome::Acquired,
            WriteOutcome::Applied {
                previous: Some(previous),
            } if previous.is_owned_by(transaction_id) => AcquireOutcome::Reaffirmed,
            WriteOutcome::Applied {
                previous: Some(previous),
            } => AcquireOutcome::Preempted { previous },
            WriteOutcome::Rejected { current } => AcquireOutcome::Denied { holder: current },
        };

        match &outcome {
            AcquireOutcome::Acquired => {
                tracing::info!(resource_key = %key, transaction_id = %transaction_id, "lock acquired");
            }
            AcquireOutcome::Reaffirmed => {
                tracing::info!(resource_key = %key, transaction_id = %transaction_id, "lock re-affirmed");
            }
            AcquireOutcome::Preempted { previous } => {
                tracing::warn!(
                    resource_key = %key,
                    transaction_id = %transaction_id,
                    previous_owner = %previous.transaction_id,
                    expired_at = %previous.expires_at,
                    "stale lock pre-empted"
                );
            }
            AcquireOutcome::Denied { holder } => {
                tracing::info!(
                    resource_key = %key,
                    transaction_id = %transaction_id,
                    holder = %holder.transaction_id,
                    "lock denied"
                );
            }
        }

        Ok(outcome)
    }

    /// Release `key` if it is held by `transaction_id`.
    ///
    /// Returns `false` only when another transaction owns the lock. A lock
    /// that is already gone counts as released.
    pub fn release(&self, key: &ResourceKey, transaction_id: TransactionId) -> Result<bool> {
        Ok(!matches!(
            self.try_release(key, transaction_id)?,
            ReleaseOutcome::NotOwner { .. }
        ))
    }

    pub fn try_release(
        &self,
        key: &ResourceKey,
        transaction_id: TransactionId,
    ) -> Result<ReleaseOutcome> {
        let outcome = match self
            .store
            .delete(key, DeletePrecondition::OwnedBy(transaction_id))?
        {
            DeleteOutcome::Deleted(_) => ReleaseOutcome::Released,
            DeleteOutcome::Absent => ReleaseOutcome::AlreadyReleased,
            DeleteOutcome::Rejected(holder) => ReleaseOutcome::NotOwner { holder },
        };

        match &outcome {
            ReleaseOutcome::Released => {
                tracing::info!(resource_key = %key, transaction_id = %transaction_id, "lock released");
            }
            ReleaseOutcome::AlreadyReleased => {
                tracing::debug!(resource_key = %key, transaction_id = %transaction_id, "no lock to release");
            }
            ReleaseOutcome::NotOwner { holder } => {
                tracing::warn!(
                    resource_key = %key,
                    transaction_id = %transaction_id,
                    holder = %holder.transaction_id,
                    "release skipped: lock not held by caller"
                );
            }
        }

        Ok(outcome)
    }

    /// Delete the lock regardless of owner. Returns `false` if none existed.
    pub fn force_release(&self, key: &ResourceKey) -> Result<bool> {
        Ok(self.try_force_release(key)?.is_some())
    }

    /// Delete the lock regardless of owner, returning the removed record.
    pub fn try_force_release(&self, key: &ResourceKey) -> Result<Option<LockRecord>> {
        match self.store.delete(key, DeletePrecondition::Any)? {
            DeleteOutcome::Deleted(previous) => {
                tracing::warn!(
                    resource_key = %key,
                    previous_owner = %previous.transaction_id,
                    "lock force-released by operator"
                );
                Ok(Some(previous))
            }
            DeleteOutcome::Absent => {
                tracing::info!(resource_key = %key, "force release: no lock present");
                Ok(None)
            }
            DeleteOutcome::Rejected(current) => Err(GateError::StoreUnavailable(format!(
                "store rejected an unconditional delete of '{}' (held by {})",
                key, current.transaction_id
            ))),
        }
    }

    /// Current lock for `key`, if any. Advisory; may be stale by the time it is used.
    pub fn inspect(&self, key: &ResourceKey) -> Result<Option<LockRecord>> {
        self.store.read(key)
    }

    pub fn list(&self) -> Result<Vec<(ResourceKey, LockRecord)>> {
        self.store.list()
    }
}
