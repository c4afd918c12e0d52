//! Caps how many physical builds (or publishes) run at once

use async_trait::async_trait;
use kresolve_core::{Artifact, Builder, Error, ImageReference, Publisher, Result, TargetKey};
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Counting limiter in front of a capability.
///
/// Wrap the real builder with this *before* wrapping it in a cache, so cache
/// hits never consume a permit.
pub struct Limiter<T> {
    inner: T,
    semaphore: Arc<Semaphore>,
}

impl<T> Limiter<T> {
    pub fn new(inner: T, permits: usize) -> Self {
        Self {
            inner,
            semaphore: Arc::new(Semaphore::new(permits.max(1))),
        }
    }

    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }
}

#[async_trait]
impl<T: Builder> Builder for Limiter<T> {
    fn is_supported_reference(&self, reference: &str) -> bool {
        self.inner.is_supported_reference(reference)
    }

    async fn build(&self, key: &TargetKey) -> Result<Artifact> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| Error::cancelled(format!("build of '{key}'")))?;
        self.inner.build(key).await
    }
}

#[async_trait]
impl<T: Publisher> Publisher for Limiter<T> {
    async fn publish(&self, artifact: &Artifact) -> Result<ImageReference> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| Error::cancelled(format!("publish of '{}'", artifact.key)))?;
        self.inner.publish(artifact).await
    }
}
