//! Concurrency primitives for memoized capability calls

pub mod limiter;
pub mod memo;

pub use limiter::Limiter;
pub use memo::MemoizingExecutor;
