//! Memoization layer for kresolve
//!
//! This crate provides the pieces that sit between the resolution pipeline
//! and the real build/publish capabilities:
//! - `MemoizingExecutor`: at-most-once-per-key concurrent cache
//! - `CachingBuilder` / `CachingPublisher`: memoizing capability decorators
//! - `Limiter`: caps physical invocations in flight
//! - `Recorder`: records which targets a single resolution built

pub mod caching;
pub mod concurrent;
pub mod recorder;

pub use caching::{CachingBuilder, CachingPublisher};
pub use concurrent::*;
pub use recorder::Recorder;
