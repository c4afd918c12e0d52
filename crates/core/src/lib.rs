//! Core domain types, capabilities and errors for `kresolve`.
//!
//! Everything else in the workspace is expressed in terms of the items
//! defined here:
//!
//! - **`errors`**: the `Error` enum and `Result` alias covering every failure
//!   mode, from configuration problems to replayed cached build errors.
//! - **`types`**: newtypes such as `TargetKey`, `FileId` and `Artifact`.
//! - **`traits`**: the `Builder` and `Publisher` capabilities the resolution
//!   engine consumes.
//! - **`constants`**: shared names like the reference scheme and the
//!   environment variables read at startup.

pub mod constants;
pub mod errors;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod traits;
pub mod types;

pub use self::{
    constants::*,
    errors::{Error, Result, ResultExt, Stage},
    traits::{Builder, Publisher},
    types::*,
};
