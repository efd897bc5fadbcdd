//! Project locks.
//!
//! A lock guards one `(repository, project)` pair, identified by a
//! [`ResourceKey`] of the form `repository#project`, and is owned by one
//! pull request ([`TransactionId`]) until it is released or its TTL passes.
//!
//! # Layers
//!
//! - [`LockStore`]: single-key atomic conditional write/delete/read. Two
//!   backends: [`FileStore`] (a shared directory, used by the CLI) and
//!   [`MemoryStore`].
//! - [`LockManager`]: acquire/release/force-release/inspect semantics with
//!   TTL expiry and reentrancy for the owning transaction.
//!
//! # Expiry
//!
//! Nothing deletes a lock when its TTL passes. An expired record simply stops
//! blocking the next `acquire`, which replaces it.

mod file;
mod manager;
mod memory;
mod store;
mod types;


pub use file::FileStore;
pub use manager::{AcquireOutcome, LockManager, ReleaseOutcome};
pub use memory::MemoryStore;
pub use store::{DeleteOutcome, DeletePrecondition, LockStore, WriteOutcome, WritePrecondition};
pub use types::{LockRecord, ResourceKey, TransactionId};
