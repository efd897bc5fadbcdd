//! Lock store adapter contract.
//!
//! A store holds at most one [`LockRecord`] per [`ResourceKey`] and must apply
//! each conditional write or delete atomically with respect to every other
//! caller touching the same key. Preconditions are evaluated inside the store,
//! so callers never perform a read-then-write pair themselves.

use super::types::{LockRecord, ResourceKey, TransactionId};
use crate::error::Result;
use chrono::{DateTime, Utc};

/// Condition that must hold on the current record for a write to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WritePrecondition {
    /// The key is absent, its record expired at or before `now`, or it is
    /// already owned by `transaction_id`.
    Claimable {
        now: DateTime<Utc>,
        transaction_id: TransactionId,
    },
}

impl WritePrecondition {
    /// Whether the precondition holds against `current`.
    pub fn holds(&self, current: Option<&LockRecord>) -> bool {
        match (self, current) {
            (_, None) => true,
            (
                WritePrecondition::Claimable {
                    now,
                    transaction_id,
                },
                Some(record),
            ) => record.is_expired_at(*now) || record.is_owned_by(*transaction_id),
        }
    }
}

/// Result of a conditional write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The new record was stored; `previous` is the record it replaced.
    Applied { previous: Option<LockRecord> },
    /// The precondition failed; `current` is the live record that blocked it.
    Rejected { current: LockRecord },
}

/// Condition that must hold on the current record for a delete to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletePrecondition {
    /// Delete whatever is there.
    Any,
    /// Delete only if the record is owned by this transaction.
    OwnedBy(TransactionId),
}

impl DeletePrecondition {
    pub fn holds(&self, current: &LockRecord) -> bool {
        match self {
            DeletePrecondition::Any => true,
            DeletePrecondition::OwnedBy(transaction_id) => current.is_owned_by(*transaction_id),
        }
    }
}

/// Result of a conditional delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The record was removed.
    Deleted(LockRecord),
    /// No record existed for the key.
    Absent,
    /// A record exists but the precondition did not hold.
    Rejected(LockRecord),
}

/// Key-value backend with single-key atomic conditional updates.
///
/// Every method fails only when the backend itself is unreachable or
/// misbehaving, reported as [`GateError::StoreUnavailable`](crate::error::GateError).
pub trait LockStore: Send + Sync {
    /// Read the record for `key`, if any.
    fn read(&self, key: &ResourceKey) -> Result<Option<LockRecord>>;

    /// Store `record` under `key` if `precondition` holds, atomically.
    fn conditional_write(
        &self,
        key: &ResourceKey,
        precondition: WritePrecondition,
        record: LockRecord,
    ) -> Result<WriteOutcome>;

    /// Remove the record for `key` if `precondition` holds, atomically.
    fn delete(&self, key: &ResourceKey, precondition: DeletePrecondition) -> Result<DeleteOutcome>;

    /// All records, sorted by key. Advisory only.
    fn list(&self) -> Result<Vec<(ResourceKey, LockRecord)>>;
}

/// Apply a conditional write to an in-hand current value.
///
/// Backends call this while holding whatever exclusion their storage
/// provides, then persist the returned value when the outcome is `Applied`.
pub(super) fn evaluate_write(
    current: Option<LockRecord>,
    precondition: WritePrecondition,
) -> WriteOutcome {
    match current {
        Some(record) if !precondition.holds(Some(&record)) => {
            WriteOutcome::Rejected { current: record }
        }
        previous => WriteOutcome::Applied { previous },
    }
}

/// Apply a conditional delete to an in-hand current value.
pub(super) fn evaluate_delete(
    current: Option<LockRecord>,
    precondition: DeletePrecondition,
) -> DeleteOutcome {
    match current {
        None => DeleteOutcome::Absent,
        Some(record) if precondition.holds(&record) => DeleteOutcome::Deleted(record),
        Some(record) => DeleteOutcome::Rejected(record),
    }
}
