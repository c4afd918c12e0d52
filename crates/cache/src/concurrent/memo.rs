//! At-most-once-per-key memoization of slow operations
//!
//! Each key owns at most one entry. The first caller for a key spawns the
//! operation and every caller, current or future, awaits the same shared
//! outcome until the key is invalidated. Successes and failures are both
//! cached: a failed build is replayed to all callers of that generation.

use dashmap::mapref::entry::Entry as MapEntry;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use kresolve_core::{Error, Result};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

type Outcome<V> = std::result::Result<V, Arc<Error>>;

/// One generation of a key: created on first request, abandoned on invalidation
#[derive(Clone)]
struct Entry<V: Clone> {
    generation: u64,
    outcome: Shared<BoxFuture<'static, Outcome<V>>>,
}

/// Concurrent cache guaranteeing one physical invocation per key per generation
pub struct MemoizingExecutor<V: Clone> {
    /// Label used in log events ("build", "publish")
    name: &'static str,
    entries: DashMap<String, Entry<V>>,
    generations: AtomicU64,
}

impl<V> MemoizingExecutor<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            entries: DashMap::new(),
            generations: AtomicU64::new(0),
        }
    }

    /// Return the outcome for `key`, invoking `operation` only if no entry exists.
    ///
    /// The operation runs on its own task, so a caller that stops waiting does
    /// not interrupt it; later callers of the same generation still observe
    /// its outcome. Cached errors come back as [`Error::Shared`] wrapping the
    /// one original error.
    pub async fn execute<F, Fut>(&self, key: &str, operation: F) -> Result<V>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        let outcome = match self.entries.entry(key.to_string()) {
            MapEntry::Occupied(occupied) => {
                let entry = occupied.get();
                debug!(
                    cache = self.name,
                    key,
                    generation = entry.generation,
                    "cache_hit"
                );
                entry.outcome.clone()
            }
            MapEntry::Vacant(vacant) => {
                let generation = self.generations.fetch_add(1, Ordering::SeqCst) + 1;
                debug!(cache = self.name, key, generation, "cache_miss");

                let handle = tokio::spawn(operation(key.to_string()));
                let outcome = async move {
                    match handle.await {
                        Ok(Ok(value)) => Ok(value),
                        Ok(Err(error)) => Err(Arc::new(error)),
                        Err(join_error) => Err(Arc::new(Error::from(join_error))),
                    }
                }
                .boxed()
                .shared();

                vacant.insert(Entry {
                    generation,
                    outcome: outcome.clone(),
                });
                outcome
            }
        };

        outcome.await.map_err(Error::Shared)
    }

    /// Forget the entry for `key` so the next `execute` invokes the operation
    /// again. Callers already awaiting the old entry keep its outcome.
    pub fn invalidate(&self, key: &str) -> bool {
        match self.entries.remove(key) {
            Some((_, entry)) => {
                debug!(
                    cache = self.name,
                    key,
                    generation = entry.generation,
                    "cache_invalidate"
                );
                true
            }
            None => false,
        }
    }

    /// Generation number of the current entry for `key`, if any
    pub fn generation(&self, key: &str) -> Option<u64> {
        self.entries.get(key).map(|entry| entry.generation)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
