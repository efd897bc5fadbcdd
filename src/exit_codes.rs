//! Exit code constants for the tfgate CLI.
//!
//! - 0: Success
//! - 1: User error (bad args, invalid config)
//! - 2: Terraform run failure (lock retained)
//! - 3: Git operation failure
//! - 4: Lock denied for at least one project
//! - 5: Lock store unavailable

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// User error: bad arguments, invalid config, unknown project.
pub const USER_ERROR: i32 = 1;

/// A Terraform plan or apply exited with a failure code.
pub const RUN_FAILURE: i32 = 2;

/// Git operation failure: diff, repo detection.
pub const GIT_FAILURE: i32 = 3;

/// At least one project lock is held by another pull request.
pub const LOCK_DENIED: i32 = 4;

/// The lock store could not be reached or returned an I/O error.
pub const STORE_UNAVAILABLE: i32 = 5;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_distinct() {
        let codes = [
            SUCCESS,
            USER_ERROR,
            RUN_FAILURE,
            GIT_FAILURE,
            LOCK_DENIED,
            STORE_UNAVAILABLE,
        ];
        for (i, &a) in codes.iter().enumerate() {
            for (j, &b) in codes.iter().enumerate() {
                if i != j {
                    assert_ne!(a, b, "Exit codes must be distinct");
                }
            }
        }
    }

    #[test]
    fn test_success_is_zero() {
        assert_eq!(SUCCESS, 0);
    }
}
