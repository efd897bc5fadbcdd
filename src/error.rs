//! Error types for the tfgate CLI.
//!
//! Uses thiserror for derive macros. Lock denial and run failure are normal
//! outcomes inside the coordinator; they only become errors here so that the
//! process exits non-zero.

use crate::exit_codes;
use thiserror::Error;

/// Main error type for tfgate operations.
#[derive(Error, Debug)]
pub enum GateError {
    /// User provided invalid arguments or configuration.
    #[error("{0}")]
    UserError(String),

    /// The lock store could not be reached or failed mid-operation.
    #[error("Lock store unavailable: {0}")]
    StoreUnavailable(String),

    /// One or more project locks are held by another pull request.
    #[error("Lock denied: {0}")]
    LockDenied(String),

    /// A Terraform run exited with a failure code.
    #[error("Terraform run failed: {0}")]
    RunFailed(String),

    /// Git operation failed.
    #[error("Git operation failed: {0}")]
    GitError(String),
}

impl GateError {
    /// Returns the appropriate exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            GateError::UserError(_) => exit_codes::USER_ERROR,
            GateError::StoreUnavailable(_) => exit_codes::STORE_UNAVAILABLE,
            GateError::LockDenied(_) => exit_codes::LOCK_DENIED,
            GateError::RunFailed(_) => exit_codes::RUN_FAILURE,
            GateError::GitError(_) => exit_codes::GIT_FAILURE,
        }
    }
}

/// Result type alias for tfgate operations.
pub type Result<T> = std::result::Result<T, GateError>;
