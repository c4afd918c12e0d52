//! Shared utilities for kresolve
//!
//! Small helpers used by more than one crate in the workspace: logging
//! setup for the binary and crash-safe file writes for publishers.

pub mod atomic_file;
pub mod tracing;

pub use atomic_file::*;
