//! Filesystem utilities for tfgate.

pub mod atomic;

pub use atomic::{atomic_write, remove_if_exists};
