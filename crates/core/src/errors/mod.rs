//! Error types and result extensions for kresolve operations

mod builders;
mod conversions;
mod display;
mod extensions;
mod types;

pub use builders::*;
pub use extensions::*;
pub use types::{Error, Result, Stage};
