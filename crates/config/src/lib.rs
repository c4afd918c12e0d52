//! Run configuration for kresolve
//!
//! A [`Config`] is assembled once at startup from command line flags and
//! the environment, validated, and then shared read-only via `Arc` by every
//! component of the run.

pub mod config;
pub mod loader;
pub mod repository;

pub use config::{
    BuildOptions, Config, ConfigBuilder, FilenameOptions, NamingStrategy, PublishOptions,
    SelectorOptions, StrictOptions, WatchOptions,
};
pub use loader::ConfigLoader;
pub use repository::validate_repository;
